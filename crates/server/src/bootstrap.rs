use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use pagoflow_core::config::{AppConfig, ConfigError, LoadOptions};
use pagoflow_core::{GatewayError, MessagingError};
use pagoflow_db::stores::{SqlConversationStore, SqlPaymentFlowStore};
use pagoflow_db::{connect_with_settings, migrations, DbPool};
use pagoflow_mercadopago::MercadoPagoClient;
use pagoflow_orchestrator::{ConversationManager, PaymentOrchestrator};
use pagoflow_whatsapp::BirdClient;

/// Concrete orchestrator wiring used by the server binary: real vendor
/// clients over SQL-backed stores.
pub type Orchestrator = PaymentOrchestrator<
    MercadoPagoClient,
    BirdClient,
    SqlPaymentFlowStore,
    SqlConversationStore,
>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub gateway: Arc<MercadoPagoClient>,
    pub messaging: Arc<BirdClient>,
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("gateway client setup failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error("messaging client setup failed: {0}")]
    Messaging(#[from] MessagingError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let gateway = Arc::new(MercadoPagoClient::new(
        config.mercadopago.clone(),
        config.brand.clone(),
    )?);
    let messaging = Arc::new(BirdClient::new(config.bird.clone())?);
    let flows = Arc::new(SqlPaymentFlowStore::new(db_pool.clone()));
    let conversations = Arc::new(SqlConversationStore::new(db_pool.clone()));

    let orchestrator = Arc::new(PaymentOrchestrator::new(
        Arc::clone(&gateway),
        Arc::clone(&messaging),
        flows,
        ConversationManager::new(conversations),
        config.brand.clone(),
    ));

    Ok(Application { config, db_pool, gateway, messaging, orchestrator })
}

#[cfg(test)]
mod tests {
    use pagoflow_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                mercadopago_access_token: Some("TEST-token".to_string()),
                mercadopago_webhook_secret: Some("shh".to_string()),
                bird_api_key: Some("bird-key".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_gateway_credentials() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                mercadopago_webhook_secret: Some("shh".to_string()),
                bird_api_key: Some("bird-key".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("mercadopago.access_token"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_on_a_fresh_database() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('payment_flows', 'conversations')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query succeeds");
        assert_eq!(table_count, 2, "bootstrap should create both flow-path tables");

        app.db_pool.close().await;
    }
}
