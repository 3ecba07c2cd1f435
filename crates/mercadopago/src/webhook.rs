//! Webhook notification parsing and signature verification.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Body of a gateway webhook POST. Only `type == "payment"`
/// notifications carry a payment id worth looking up.
#[derive(Clone, Debug, Deserialize)]
pub struct WebhookNotification {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub action: Option<String>,
    pub data: WebhookData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WebhookData {
    pub id: String,
}

impl WebhookNotification {
    pub fn is_payment(&self) -> bool {
        self.kind == "payment"
    }

    pub fn payment_id(&self) -> &str {
        &self.data.id
    }
}

/// Checks the hex-encoded HMAC-SHA256 signature the gateway sends over
/// the raw request body. Comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    use super::{verify_signature, WebhookNotification};

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_verifies() {
        let body = br#"{"type":"payment","data":{"id":"123"}}"#;
        let signature = sign("topsecret", body);
        assert!(verify_signature("topsecret", body, &signature));
    }

    #[test]
    fn tampered_body_fails_verification() {
        let body = br#"{"type":"payment","data":{"id":"123"}}"#;
        let signature = sign("topsecret", body);
        assert!(!verify_signature("topsecret", b"{}", &signature));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let body = br#"{"type":"payment","data":{"id":"123"}}"#;
        let signature = sign("topsecret", body);
        assert!(!verify_signature("other", body, &signature));
    }

    #[test]
    fn non_hex_signature_is_rejected() {
        assert!(!verify_signature("topsecret", b"{}", "not hex at all"));
    }

    #[test]
    fn payment_notifications_expose_the_payment_id() {
        let body = r#"{"id": 42, "type": "payment", "action": "payment.updated", "data": {"id": "987654"}}"#;
        let notification: WebhookNotification =
            serde_json::from_str(body).expect("webhook body parses");
        assert!(notification.is_payment());
        assert_eq!(notification.payment_id(), "987654");
        assert_eq!(notification.action.as_deref(), Some("payment.updated"));
    }

    #[test]
    fn non_payment_notifications_are_flagged() {
        let body = r#"{"type": "merchant_order", "data": {"id": "555"}}"#;
        let notification: WebhookNotification =
            serde_json::from_str(body).expect("webhook body parses");
        assert!(!notification.is_payment());
    }
}
