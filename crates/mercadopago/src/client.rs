//! HTTP client for the MercadoPago Checkout Preferences and Payments
//! APIs.

use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use pagoflow_core::config::{BrandConfig, MercadoPagoConfig};
use pagoflow_core::GatewayError;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::models::{PaymentDetails, PreferencePayload, PreferenceRequest};
use crate::status::PaymentStatus;
use crate::PaymentGateway;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_EXPIRY_HOURS: i64 = 24;

pub struct MercadoPagoClient {
    config: MercadoPagoConfig,
    brand: BrandConfig,
    client: Client,
}

impl MercadoPagoClient {
    pub fn new(config: MercadoPagoConfig, brand: BrandConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| GatewayError::new("http_client_build_failed", err.to_string()))?;
        Ok(Self { config, brand, client })
    }

    fn bearer(&self) -> &str {
        self.config.access_token.expose_secret()
    }

    fn build_preference_body(
        &self,
        request: &PreferenceRequest,
        transaction_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PreferenceBody {
        let items = request
            .items
            .iter()
            .map(|item| PreferenceItem {
                id: item.id.clone(),
                title: item.title.clone(),
                description: item.description.clone().unwrap_or_default(),
                quantity: item.quantity,
                unit_price: item.unit_price.amount(),
                currency_id: "COP".to_owned(),
            })
            .collect();

        let national = request.customer_phone.national_digits().to_owned();
        let email = request.customer.email.clone().unwrap_or_else(|| {
            format!("{national}@temp.{}.co", self.brand.name.to_lowercase())
        });
        let payer = PreferencePayer {
            name: request.customer.name.clone().unwrap_or_default(),
            email,
            phone: PayerPhone { area_code: "57".to_owned(), number: national },
        };

        let conversation = request.conversation_id.as_str();
        let base = self.brand.return_base_url.trim_end_matches('/');
        let back_urls = BackUrls {
            success: format!("{base}/payment/success?conversation={conversation}"),
            failure: format!("{base}/payment/failure?conversation={conversation}"),
            pending: format!("{base}/payment/pending?conversation={conversation}"),
        };

        PreferenceBody {
            items,
            payer,
            back_urls,
            auto_return: "approved".to_owned(),
            external_reference: transaction_id.to_owned(),
            expires: true,
            expiration_date_from: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            expiration_date_to: expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            metadata: PreferenceMetadata {
                flow_id: request.flow_id.to_string(),
                conversation_id: conversation.to_owned(),
                customer_phone: request.customer_phone.as_str().to_owned(),
                source: "whatsapp_checkout".to_owned(),
            },
        }
    }

    async fn error_from_response(
        code: &str,
        response: reqwest::Response,
    ) -> GatewayError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or_else(|| format!("unexpected http {status}"));
        GatewayError::new(code, message)
            .with_http_status(status)
            .with_detail("body", body.chars().take(512).collect::<String>())
    }
}

#[async_trait::async_trait]
impl PaymentGateway for MercadoPagoClient {
    #[instrument(skip(self, request), fields(flow_id = %request.flow_id))]
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<PreferencePayload, GatewayError> {
        let transaction_id = Uuid::new_v4().to_string();
        let expires_at = request
            .expires_at
            .unwrap_or_else(|| Utc::now() + ChronoDuration::hours(DEFAULT_EXPIRY_HOURS));
        let body = self.build_preference_body(request, &transaction_id, expires_at);

        debug!(
            event_name = "preference_creation_started",
            item_count = body.items.len(),
            transaction_id = %transaction_id,
            "creating checkout preference"
        );

        let url = format!("{}/checkout/preferences", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|err| GatewayError::new("gateway_unreachable", err.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("preference_create_failed", response).await);
        }

        let preference: PreferenceResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::new("preference_decode_failed", err.to_string()))?;

        let checkout_url = if self.config.sandbox {
            preference.sandbox_init_point.unwrap_or(preference.init_point)
        } else {
            preference.init_point
        };

        info!(
            event_name = "preference_created",
            preference_id = %preference.id,
            transaction_id = %transaction_id,
            "checkout preference created"
        );

        Ok(PreferencePayload {
            preference_id: preference.id,
            checkout_url,
            transaction_id,
            expires_at,
        })
    }

    #[instrument(skip(self))]
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails, GatewayError> {
        let url = format!("{}/v1/payments/{payment_id}", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.bearer())
            .send()
            .await
            .map_err(|err| GatewayError::new("gateway_unreachable", err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::new("payment_not_found", format!("payment {payment_id} not found"))
                .with_http_status(404));
        }
        if !response.status().is_success() {
            return Err(Self::error_from_response("payment_lookup_failed", response).await);
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|err| GatewayError::new("payment_decode_failed", err.to_string()))?;
        decode_payment(payment_id, raw)
    }

    /// Cancels by collapsing the preference expiration window to now,
    /// matching how the hosted checkout is retired upstream.
    #[instrument(skip(self))]
    async fn cancel_preference(&self, preference_id: &str) -> Result<bool, GatewayError> {
        let url = format!(
            "{}/checkout/preferences/{preference_id}",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "expires": true,
            "expiration_date_to": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        });
        let response = self
            .client
            .put(&url)
            .bearer_auth(self.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|err| GatewayError::new("gateway_unreachable", err.to_string()))?;

        if response.status().is_success() {
            info!(event_name = "preference_cancelled", preference_id, "preference expired remotely");
            Ok(true)
        } else {
            warn!(
                event_name = "preference_cancel_refused",
                preference_id,
                http_status = response.status().as_u16(),
                "vendor refused preference cancellation"
            );
            Ok(false)
        }
    }
}

fn decode_payment(payment_id: &str, raw: Value) -> Result<PaymentDetails, GatewayError> {
    let status_str = raw
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::new("payment_decode_failed", "missing status field"))?;
    let status = PaymentStatus::parse(status_str).ok_or_else(|| {
        GatewayError::new("payment_decode_failed", format!("unknown status {status_str}"))
    })?;
    let transaction_amount = raw
        .get("transaction_amount")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    Ok(PaymentDetails {
        payment_id: payment_id.to_owned(),
        status,
        status_detail: raw
            .get("status_detail")
            .and_then(Value::as_str)
            .map(str::to_owned),
        external_reference: raw
            .get("external_reference")
            .and_then(Value::as_str)
            .map(str::to_owned),
        transaction_amount,
        approval_code: raw
            .get("authorization_code")
            .and_then(Value::as_str)
            .map(str::to_owned),
        raw,
    })
}

#[derive(Debug, Serialize)]
struct PreferenceBody {
    items: Vec<PreferenceItem>,
    payer: PreferencePayer,
    back_urls: BackUrls,
    auto_return: String,
    external_reference: String,
    expires: bool,
    expiration_date_from: String,
    expiration_date_to: String,
    metadata: PreferenceMetadata,
}

#[derive(Debug, Serialize)]
struct PreferenceItem {
    id: String,
    title: String,
    description: String,
    quantity: u32,
    unit_price: rust_decimal::Decimal,
    currency_id: String,
}

#[derive(Debug, Serialize)]
struct PreferencePayer {
    name: String,
    email: String,
    phone: PayerPhone,
}

#[derive(Debug, Serialize)]
struct PayerPhone {
    area_code: String,
    number: String,
}

#[derive(Debug, Serialize)]
struct BackUrls {
    success: String,
    failure: String,
    pending: String,
}

#[derive(Debug, Serialize)]
struct PreferenceMetadata {
    flow_id: String,
    conversation_id: String,
    customer_phone: String,
    source: String,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
    #[serde(default)]
    sandbox_init_point: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pagoflow_core::config::{BrandConfig, MercadoPagoConfig};
    use pagoflow_core::{
        CartItem, ConversationId, CustomerInfo, FlowId, Money, PhoneNumber,
    };
    use rust_decimal::Decimal;
    use secrecy::SecretString;

    use super::{decode_payment, MercadoPagoClient};
    use crate::models::PreferenceRequest;
    use crate::status::PaymentStatus;

    fn test_client() -> MercadoPagoClient {
        let config = MercadoPagoConfig {
            access_token: SecretString::from("test-token"),
            webhook_secret: SecretString::from("test-secret"),
            base_url: "https://api.mercadopago.com".to_owned(),
            sandbox: true,
        };
        let brand = BrandConfig {
            name: "KOAJ".to_owned(),
            support_phone: "+573001234567".to_owned(),
            return_base_url: "https://shop.example.co/".to_owned(),
        };
        MercadoPagoClient::new(config, brand).expect("client builds")
    }

    fn test_request() -> PreferenceRequest {
        PreferenceRequest {
            flow_id: FlowId::generate(&ConversationId::new("conv_1")),
            conversation_id: ConversationId::new("conv_1"),
            customer_phone: PhoneNumber::parse("+573001234567").expect("valid phone"),
            customer: CustomerInfo { name: Some("Ana".to_owned()), email: None },
            items: vec![CartItem {
                id: "camisa-01".to_owned(),
                title: "Camisa".to_owned(),
                description: None,
                quantity: 2,
                unit_price: Money::new(Decimal::from(50_000)),
            }],
            expires_at: None,
        }
    }

    #[test]
    fn preference_body_carries_cop_items_and_back_urls() {
        let client = test_client();
        let request = test_request();
        let body = client.build_preference_body(&request, "txn-1", Utc::now());

        assert_eq!(body.items.len(), 1);
        assert_eq!(body.items[0].currency_id, "COP");
        assert_eq!(body.items[0].quantity, 2);
        assert_eq!(body.external_reference, "txn-1");
        assert!(body.expires);
        assert_eq!(
            body.back_urls.success,
            "https://shop.example.co/payment/success?conversation=conv_1"
        );
        assert_eq!(body.payer.phone.area_code, "57");
        assert_eq!(body.payer.phone.number, "3001234567");
    }

    #[test]
    fn missing_email_gets_a_brand_fallback() {
        let client = test_client();
        let request = test_request();
        let body = client.build_preference_body(&request, "txn-1", Utc::now());
        assert_eq!(body.payer.email, "3001234567@temp.koaj.co");
    }

    #[test]
    fn payment_responses_decode_into_details() {
        let raw = serde_json::json!({
            "id": 987654,
            "status": "rejected",
            "status_detail": "cc_rejected_insufficient_amount",
            "transaction_amount": 100000,
            "external_reference": "txn-1",
            "authorization_code": null,
        });
        let details = decode_payment("987654", raw).expect("payment decodes");
        assert_eq!(details.status, PaymentStatus::Rejected);
        assert_eq!(
            details.status_detail.as_deref(),
            Some("cc_rejected_insufficient_amount")
        );
        assert_eq!(details.external_reference.as_deref(), Some("txn-1"));
        assert!(details.approval_code.is_none());
    }

    #[test]
    fn unknown_payment_status_is_a_decode_error() {
        let raw = serde_json::json!({"status": "paid"});
        let err = decode_payment("1", raw).expect_err("unknown status rejected");
        assert_eq!(err.code, "payment_decode_failed");
    }
}
