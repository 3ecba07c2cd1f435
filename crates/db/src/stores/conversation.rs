use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use pagoflow_core::domain::conversation::ConversationState;
use pagoflow_core::{ConversationContext, ConversationId, FlowId, PhoneNumber};

use super::{ConversationStore, StoreError};
use crate::DbPool;

pub struct SqlConversationStore {
    pool: DbPool,
}

impl SqlConversationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for SqlConversationStore {
    async fn get(&self, id: &ConversationId) -> Result<Option<ConversationContext>, StoreError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE conversation_id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode_context).transpose()
    }

    async fn put(&self, context: &ConversationContext) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO conversations ( \
                 conversation_id, customer_phone, current_state, previous_state, customer, \
                 cart_items, active_payment_flow, payment_history, created_at, last_activity, \
                 metadata \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&context.conversation_id.0)
        .bind(context.customer_phone.as_str())
        .bind(context.current_state.as_str())
        .bind(context.previous_state.map(|state| state.as_str()))
        .bind(encode_json(&context.customer)?)
        .bind(encode_json(&context.cart_items)?)
        .bind(context.active_payment_flow.as_ref().map(|flow| flow.0.as_str()))
        .bind(encode_json(&context.payment_history)?)
        .bind(context.created_at)
        .bind(context.last_activity)
        .bind(encode_json(&context.metadata)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|error| StoreError::Decode(error.to_string()))
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: &str, column: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw)
        .map_err(|error| StoreError::Decode(format!("column {column}: {error}")))
}

fn decode_state(raw: &str) -> Result<ConversationState, StoreError> {
    ConversationState::parse(raw)
        .ok_or_else(|| StoreError::Decode(format!("unknown conversation state {raw:?}")))
}

fn decode_context(row: SqliteRow) -> Result<ConversationContext, StoreError> {
    let phone_raw: String = row.try_get("customer_phone")?;
    let customer_phone = PhoneNumber::parse(&phone_raw)
        .map_err(|error| StoreError::Decode(error.to_string()))?;

    let current_raw: String = row.try_get("current_state")?;
    let previous_raw: Option<String> = row.try_get("previous_state")?;

    let customer_raw: String = row.try_get("customer")?;
    let cart_raw: String = row.try_get("cart_items")?;
    let history_raw: String = row.try_get("payment_history")?;
    let metadata_raw: String = row.try_get("metadata")?;
    let active_flow: Option<String> = row.try_get("active_payment_flow")?;

    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let last_activity: DateTime<Utc> = row.try_get("last_activity")?;

    Ok(ConversationContext {
        conversation_id: ConversationId(row.try_get("conversation_id")?),
        customer_phone,
        current_state: decode_state(&current_raw)?,
        previous_state: previous_raw.as_deref().map(decode_state).transpose()?,
        customer: decode_json(&customer_raw, "customer")?,
        cart_items: decode_json(&cart_raw, "cart_items")?,
        active_payment_flow: active_flow.map(FlowId),
        payment_history: decode_json(&history_raw, "payment_history")?,
        created_at,
        last_activity,
        metadata: decode_json(&metadata_raw, "metadata")?,
    })
}
