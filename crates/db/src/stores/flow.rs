use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use pagoflow_core::domain::flow::FlowStatus;
use pagoflow_core::{ConversationId, CustomerInfo, FlowId, PaymentFlow, PhoneNumber};

use super::{PaymentFlowStore, StoreError};
use crate::DbPool;

pub struct SqlPaymentFlowStore {
    pool: DbPool,
}

impl SqlPaymentFlowStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn upsert(&self, flow: &PaymentFlow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO payment_flows ( \
                 flow_id, conversation_id, customer_phone, items, customer, \
                 payment_id, transaction_id, checkout_url, status, payment_status, \
                 payment_data, created_at, updated_at, expires_at, metadata \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        )
        .bind(&flow.flow_id.0)
        .bind(&flow.conversation_id.0)
        .bind(flow.customer_phone.as_str())
        .bind(encode_json(&flow.items)?)
        .bind(encode_json(&flow.customer)?)
        .bind(flow.payment_id.as_deref())
        .bind(flow.transaction_id.as_deref())
        .bind(flow.checkout_url.as_deref())
        .bind(flow.status.as_str())
        .bind(flow.payment_status.as_deref())
        .bind(flow.payment_data.as_ref().map(|data| data.to_string()))
        .bind(flow.created_at)
        .bind(flow.updated_at)
        .bind(flow.expires_at)
        .bind(encode_json(&flow.metadata)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentFlowStore for SqlPaymentFlowStore {
    async fn put(&self, flow: &PaymentFlow) -> Result<(), StoreError> {
        self.upsert(flow).await
    }

    async fn update(&self, flow: &PaymentFlow) -> Result<(), StoreError> {
        self.upsert(flow).await
    }

    async fn get(&self, flow_id: &FlowId) -> Result<Option<PaymentFlow>, StoreError> {
        let row = sqlx::query("SELECT * FROM payment_flows WHERE flow_id = ?1")
            .bind(&flow_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode_flow).transpose()
    }

    async fn get_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<PaymentFlow>, StoreError> {
        let row = sqlx::query("SELECT * FROM payment_flows WHERE payment_id = ?1")
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode_flow).transpose()
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|error| StoreError::Decode(error.to_string()))
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: &str, column: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw)
        .map_err(|error| StoreError::Decode(format!("column {column}: {error}")))
}

fn decode_flow(row: SqliteRow) -> Result<PaymentFlow, StoreError> {
    let status_raw: String = row.try_get("status")?;
    let status = FlowStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown flow status {status_raw:?}")))?;

    let phone_raw: String = row.try_get("customer_phone")?;
    let customer_phone = PhoneNumber::parse(&phone_raw)
        .map_err(|error| StoreError::Decode(error.to_string()))?;

    let items_raw: String = row.try_get("items")?;
    let customer_raw: String = row.try_get("customer")?;
    let metadata_raw: String = row.try_get("metadata")?;
    let payment_data_raw: Option<String> = row.try_get("payment_data")?;

    let customer: CustomerInfo = decode_json(&customer_raw, "customer")?;
    let payment_data = payment_data_raw
        .as_deref()
        .map(|raw| decode_json(raw, "payment_data"))
        .transpose()?;

    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: Option<DateTime<Utc>> = row.try_get("updated_at")?;
    let expires_at: Option<DateTime<Utc>> = row.try_get("expires_at")?;

    Ok(PaymentFlow {
        flow_id: FlowId(row.try_get("flow_id")?),
        conversation_id: ConversationId(row.try_get("conversation_id")?),
        customer_phone,
        items: decode_json(&items_raw, "items")?,
        customer,
        payment_id: row.try_get("payment_id")?,
        transaction_id: row.try_get("transaction_id")?,
        checkout_url: row.try_get("checkout_url")?,
        status,
        payment_status: row.try_get("payment_status")?,
        payment_data,
        created_at,
        updated_at,
        expires_at,
        metadata: decode_json(&metadata_raw, "metadata")?,
    })
}

#[cfg(test)]
mod tests {
    use pagoflow_core::domain::flow::FlowStatus;
    use pagoflow_core::{
        CartItem, ConversationId, CustomerInfo, Money, PaymentFlow, PhoneNumber,
    };

    use crate::stores::PaymentFlowStore;
    use crate::{connect_with_settings, migrations};

    use super::SqlPaymentFlowStore;

    async fn store() -> SqlPaymentFlowStore {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations should apply");
        SqlPaymentFlowStore::new(pool)
    }

    fn flow(preference_id: &str) -> PaymentFlow {
        let mut flow = PaymentFlow::new(
            ConversationId("conv-sql".to_owned()),
            PhoneNumber::parse("3001234567").expect("valid phone"),
            vec![CartItem {
                id: "sku1".to_owned(),
                title: "Camisa".to_owned(),
                description: Some("Talla M".to_owned()),
                quantity: 2,
                unit_price: Money::from_minor_units(5_000_000),
            }],
            CustomerInfo { name: Some("Laura".to_owned()), email: None },
        );
        flow.attach_preference(
            preference_id.to_owned(),
            format!("txn-{preference_id}"),
            format!("https://mp.example/checkout/{preference_id}"),
            None,
        )
        .expect("fresh flow accepts preference");
        flow
    }

    #[tokio::test]
    async fn stored_flows_round_trip_with_their_items_and_metadata() {
        let store = store().await;
        let mut flow = flow("pref-sql-rt");
        flow.metadata.insert("retry_attempt".to_owned(), serde_json::Value::from(1));
        store.put(&flow).await.expect("put should succeed");

        let loaded = store
            .get(&flow.flow_id)
            .await
            .expect("get should succeed")
            .expect("flow should exist");
        assert_eq!(loaded.flow_id, flow.flow_id);
        assert_eq!(loaded.items, flow.items);
        assert_eq!(loaded.customer, flow.customer);
        assert_eq!(loaded.status, flow.status);
        assert_eq!(loaded.checkout_url, flow.checkout_url);
        assert_eq!(loaded.metadata, flow.metadata);
        assert_eq!(loaded.total_amount(), Money::from_minor_units(10_000_000));
    }

    #[tokio::test]
    async fn lookup_by_payment_id_uses_the_secondary_index() {
        let store = store().await;
        let flow = flow("pref-sql-idx");
        store.put(&flow).await.expect("put should succeed");

        let by_payment = store
            .get_by_payment_id("pref-sql-idx")
            .await
            .expect("lookup should succeed")
            .expect("flow should be indexed by payment id");
        assert_eq!(by_payment.flow_id, flow.flow_id);

        let missing = store
            .get_by_payment_id("pref-unknown")
            .await
            .expect("lookup should succeed");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn update_is_last_writer_wins() {
        let store = store().await;
        let mut flow = flow("pref-sql-upd");
        store.put(&flow).await.expect("put should succeed");

        flow.apply_status(FlowStatus::PaymentPending);
        flow.payment_status = Some("pending".to_owned());
        store.update(&flow).await.expect("update should succeed");

        let loaded = store
            .get(&flow.flow_id)
            .await
            .expect("get should succeed")
            .expect("flow should exist");
        assert_eq!(loaded.status, FlowStatus::PaymentPending);
        assert_eq!(loaded.payment_status.as_deref(), Some("pending"));
    }
}
