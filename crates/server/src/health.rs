use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use pagoflow_db::DbPool;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub component: &'static str,
    pub status: HealthStatus,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub checks: Vec<ComponentHealth>,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

/// Readiness probe. Degraded when the flow store cannot answer a trivial
/// query, since every webhook and conversation path writes through it.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let overall = database.status;

    let payload = HealthResponse {
        status: overall,
        version: env!("CARGO_PKG_VERSION"),
        checks: vec![database],
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = match overall {
        HealthStatus::Ready => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> ComponentHealth {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => ComponentHealth {
            component: "database",
            status: HealthStatus::Ready,
            detail: "flow store reachable".to_string(),
        },
        Err(error) => ComponentHealth {
            component: "database",
            status: HealthStatus::Degraded,
            detail: format!("flow store query failed: {error}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use pagoflow_db::connect_with_settings;

    use crate::health::{health, HealthState, HealthStatus};

    #[tokio::test]
    async fn health_reports_ready_with_reachable_database() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool.clone() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, HealthStatus::Ready);
        assert_eq!(payload.checks.len(), 1);
        assert_eq!(payload.checks[0].component, "database");

        pool.close().await;
    }

    #[tokio::test]
    async fn health_reports_degraded_when_pool_is_closed() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, HealthStatus::Degraded);
        assert_eq!(payload.checks[0].status, HealthStatus::Degraded);
    }
}
