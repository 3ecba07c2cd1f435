//! HTTP client for the Bird channels API.

use chrono::{SecondsFormat, Utc};
use pagoflow_core::config::BirdConfig;
use pagoflow_core::{MessagingError, PhoneNumber};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::messages::{PaymentConfirmationMessage, PaymentFailureMessage, PaymentLinkMessage};
use crate::templates::{self, RenderedTemplate};
use crate::WhatsAppMessaging;

const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct BirdClient {
    config: BirdConfig,
    client: Client,
}

impl BirdClient {
    pub fn new(config: BirdConfig) -> Result<Self, MessagingError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| MessagingError::new("http_client_build_failed", err.to_string()))?;
        Ok(Self { config, client })
    }

    #[instrument(skip(self, template), fields(template_kind = template.kind))]
    async fn send_template(
        &self,
        phone: &PhoneNumber,
        template: &RenderedTemplate,
    ) -> Result<(), MessagingError> {
        let url = format!(
            "{}/channels/{}/messages",
            self.config.base_url.trim_end_matches('/'),
            self.config.channel_id
        );
        let body = MessageBody {
            receiver: Receiver {
                contacts: vec![Contact { identifier_value: phone.as_str().to_owned() }],
            },
            template: TemplateBody {
                kind: template.kind.to_owned(),
                text: template.text.clone(),
                buttons: template
                    .buttons
                    .iter()
                    .map(|b| ButtonBody {
                        kind: "url".to_owned(),
                        title: b.title.clone(),
                        url: b.url.clone(),
                    })
                    .collect(),
            },
            metadata: MessageMetadata {
                source: "whatsapp_checkout".to_owned(),
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|err| MessagingError::new("channel_unreachable", err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            info!(
                event_name = "whatsapp_message_sent",
                template_kind = template.kind,
                "message delivered to channel"
            );
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "whatsapp_send_failed",
                template_kind = template.kind,
                http_status = status.as_u16(),
                "channel rejected message"
            );
            Err(MessagingError::new(
                "send_failed",
                format!("channel returned {status}: {}", body.chars().take(256).collect::<String>()),
            )
            .with_http_status(status.as_u16()))
        }
    }
}

#[async_trait::async_trait]
impl WhatsAppMessaging for BirdClient {
    async fn send_payment_link(
        &self,
        phone: &PhoneNumber,
        message: &PaymentLinkMessage,
    ) -> Result<(), MessagingError> {
        self.send_template(phone, &templates::payment_link(message)).await
    }

    async fn send_payment_confirmation(
        &self,
        phone: &PhoneNumber,
        message: &PaymentConfirmationMessage,
    ) -> Result<(), MessagingError> {
        self.send_template(phone, &templates::payment_confirmation(message)).await
    }

    async fn send_payment_failure(
        &self,
        phone: &PhoneNumber,
        message: &PaymentFailureMessage,
    ) -> Result<(), MessagingError> {
        self.send_template(phone, &templates::payment_failure(message)).await
    }

    async fn send_text(&self, phone: &PhoneNumber, text: &str) -> Result<(), MessagingError> {
        let template = RenderedTemplate {
            kind: "text",
            text: text.to_owned(),
            buttons: Vec::new(),
        };
        self.send_template(phone, &template).await
    }
}

#[derive(Debug, Serialize)]
struct MessageBody {
    receiver: Receiver,
    template: TemplateBody,
    metadata: MessageMetadata,
}

#[derive(Debug, Serialize)]
struct Receiver {
    contacts: Vec<Contact>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Contact {
    identifier_value: String,
}

#[derive(Debug, Serialize)]
struct TemplateBody {
    #[serde(rename = "type")]
    kind: String,
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buttons: Vec<ButtonBody>,
}

#[derive(Debug, Serialize)]
struct ButtonBody {
    #[serde(rename = "type")]
    kind: String,
    title: String,
    url: String,
}

#[derive(Debug, Serialize)]
struct MessageMetadata {
    source: String,
    timestamp: String,
}
