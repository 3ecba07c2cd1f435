use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use crate::connect_with_settings;

    use super::run_pending;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "payment_flows",
        "conversations",
        "idx_payment_flows_payment_id",
        "idx_payment_flows_conversation_id",
        "idx_payment_flows_status",
        "idx_conversations_customer_phone",
        "idx_conversations_last_activity",
    ];

    #[tokio::test]
    async fn migrations_create_the_managed_schema() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        run_pending(&pool).await.expect("migrations should apply");

        for object in MANAGED_SCHEMA_OBJECTS {
            let found: Option<String> = sqlx::query_scalar(
                "SELECT name FROM sqlite_master WHERE name = ?1",
            )
            .bind(object)
            .fetch_optional(&pool)
            .await
            .expect("schema query should succeed");
            assert_eq!(found.as_deref(), Some(*object), "missing schema object {object}");
        }

        pool.close().await;
    }
}
