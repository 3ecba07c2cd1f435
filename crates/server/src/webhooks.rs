//! Inbound webhook endpoints. MercadoPago payment notifications are
//! signature-checked against the raw body before anything is parsed;
//! Bird conversation events are dispatched through the orchestrator and
//! any reply is sent back on the channel.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{extract::State, Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use pagoflow_core::{ConversationId, PhoneNumber};
use pagoflow_mercadopago::{
    verify_signature, MercadoPagoClient, PaymentGateway, WebhookNotification,
};
use pagoflow_orchestrator::{InboundMessage, MessageAction};
use pagoflow_whatsapp::{BirdClient, WhatsAppMessaging};

use crate::bootstrap::Orchestrator;

#[derive(Clone)]
pub struct WebhookState {
    pub orchestrator: Arc<Orchestrator>,
    pub gateway: Arc<MercadoPagoClient>,
    pub messaging: Arc<BirdClient>,
    pub webhook_secret: SecretString,
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhooks/mercadopago", post(mercadopago))
        .route("/webhooks/whatsapp", post(whatsapp))
        .with_state(state)
}

/// Status codes drive the vendor's redelivery: 401/400 are final, 500
/// asks for a retry. "Flow not found" is success on purpose, the vendor
/// must not retry forever for payments this system never tracked.
async fn mercadopago(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let signature = headers.get("x-signature").and_then(|value| value.to_str().ok());
    let valid = signature.is_some_and(|signature| {
        verify_signature(state.webhook_secret.expose_secret(), &body, signature)
    });
    if !valid {
        warn!(event_name = "webhook.signature_invalid", "rejected unsigned or tampered webhook");
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid signature"})));
    }

    let notification: WebhookNotification = match serde_json::from_slice(&body) {
        Ok(notification) => notification,
        Err(err) => {
            warn!(event_name = "webhook.malformed", error = %err, "unparseable webhook body");
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid payload"})));
        }
    };

    if !notification.is_payment() {
        info!(
            event_name = "webhook.ignored_type",
            webhook_type = notification.kind,
            "non-payment webhook accepted and ignored"
        );
        return (StatusCode::OK, Json(json!({"message": "webhook type not supported"})));
    }

    let payment_id = notification.payment_id();
    let details = match state.gateway.get_payment(payment_id).await {
        Ok(details) => details,
        Err(err) => {
            error!(
                event_name = "webhook.payment_lookup_failed",
                payment_id,
                error = %err,
                "payment lookup failed, asking for redelivery"
            );
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "payment lookup failed"})),
            );
        }
    };

    match state.orchestrator.process_payment_status_update(&details).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "flow_found": outcome.flow_found,
                "message_sent": outcome.message_sent,
            })),
        ),
        Err(err) => {
            error!(
                event_name = "webhook.processing_failed",
                payment_id,
                error = %err,
                "status update failed, asking for redelivery"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "processing failed"})))
        }
    }
}

#[derive(Debug, Deserialize)]
struct InboundWebhook {
    #[serde(rename = "conversationId")]
    conversation_id: String,
    sender: InboundSender,
    #[serde(default)]
    content: InboundContent,
}

#[derive(Debug, Deserialize)]
struct InboundSender {
    #[serde(rename = "identifierValue")]
    identifier_value: String,
}

#[derive(Debug, Default, Deserialize)]
struct InboundContent {
    #[serde(default)]
    text: String,
}

async fn whatsapp(State(state): State<WebhookState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let inbound: InboundWebhook = match serde_json::from_slice(&body) {
        Ok(inbound) => inbound,
        Err(err) => {
            warn!(event_name = "webhook.malformed", error = %err, "unparseable inbound message");
            return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid payload"})));
        }
    };

    let conversation_id = ConversationId::new(inbound.conversation_id);
    let message =
        InboundMessage { sender: inbound.sender.identifier_value, text: inbound.content.text };

    let action = state.orchestrator.handle_conversation_message(&conversation_id, &message).await;

    match action {
        Some(MessageAction::Reply(text)) => {
            let reply_sent = match PhoneNumber::parse(&message.sender) {
                Ok(phone) => match state.messaging.send_text(&phone, &text).await {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(
                            event_name = "webhook.reply_send_failed",
                            conversation_id = %conversation_id,
                            error = %err,
                            "reply not delivered"
                        );
                        false
                    }
                },
                Err(_) => false,
            };
            (StatusCode::OK, Json(json!({"action": "reply", "reply_sent": reply_sent})))
        }
        Some(MessageAction::PaymentInitiated(flow_id)) => (
            StatusCode::OK,
            Json(json!({"action": "payment_initiated", "flow_id": flow_id.to_string()})),
        ),
        None => (StatusCode::OK, Json(json!({"action": "none"}))),
    }
}
