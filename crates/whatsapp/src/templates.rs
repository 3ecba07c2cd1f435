//! Spanish WhatsApp copy for the three payment messages. Each renderer
//! returns the message text plus any URL buttons to attach.

use pagoflow_core::format::{format_cop, format_expiry};
use pagoflow_core::CartItem;

use crate::messages::{PaymentConfirmationMessage, PaymentFailureMessage, PaymentLinkMessage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlButton {
    pub title: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub kind: &'static str,
    pub text: String,
    pub buttons: Vec<UrlButton>,
}

fn greeting(customer_name: Option<&str>) -> &str {
    customer_name.unwrap_or("estimado cliente")
}

/// Bullet list of cart lines: `• Title\n  Cantidad: N x $P COP = $T COP`.
fn items_block(items: &[CartItem]) -> String {
    let mut out = String::new();
    for item in items {
        let unit = format_cop(item.unit_price);
        let line = format_cop(item.line_total());
        out.push_str(&format!(
            "• {}\n  Cantidad: {} x {unit} = {line}\n\n",
            item.title, item.quantity
        ));
    }
    out.trim_end().to_owned()
}

pub fn payment_link(message: &PaymentLinkMessage) -> RenderedTemplate {
    let text = format!(
        "🛍️ *{brand}* - Completa tu compra\n\n\
         ¡Hola {name}! 👋\n\n\
         Tienes los siguientes productos reservados:\n\n\
         {items}\n\n\
         💰 *Total: {total}*\n\n\
         Para completar tu compra, haz clic en el siguiente enlace:\n\
         {url}\n\n\
         ⏰ Este enlace expira el {expiry}\n\n\
         ¿Necesitas ayuda? Escríbenos, estamos aquí para apoyarte 💬",
        brand = message.brand_name,
        name = greeting(message.customer_name.as_deref()),
        items = items_block(&message.items),
        total = format_cop(message.total_amount),
        url = message.checkout_url,
        expiry = format_expiry(message.expires_at),
    );
    RenderedTemplate {
        kind: "payment_link",
        text,
        buttons: vec![UrlButton {
            title: "💳 Pagar Ahora".to_owned(),
            url: message.checkout_url.clone(),
        }],
    }
}

pub fn payment_confirmation(message: &PaymentConfirmationMessage) -> RenderedTemplate {
    let mut text = format!(
        "✅ *¡Pago Confirmado!* - {brand}\n\n\
         ¡Hola {name}! 🎉\n\n\
         Tu pago ha sido procesado exitosamente:\n\n\
         📋 *Detalles de la compra:*\n\
         {items}\n\n\
         💰 *Total pagado: {total}*\n\
         🆔 *ID de pago: {payment_id}*",
        brand = message.brand_name,
        name = greeting(message.customer_name.as_deref()),
        items = items_block(&message.items),
        total = format_cop(message.total_amount),
        payment_id = message.payment_id,
    );
    if let Some(code) = &message.approval_code {
        text.push_str(&format!("\n✅ *Código de aprobación: {code}*"));
    }
    text.push_str(&format!(
        "\n\n📦 *¿Qué sigue?*\n\
         • Recibirás un email con los detalles de tu compra\n\
         • Tu pedido será procesado en las próximas 24 horas\n\
         • Te notificaremos cuando esté listo para envío\n\n\
         ¡Gracias por confiar en {}! 💙",
        message.brand_name
    ));
    RenderedTemplate { kind: "payment_confirmation", text, buttons: Vec::new() }
}

pub fn payment_failure(message: &PaymentFailureMessage) -> RenderedTemplate {
    let mut text = format!(
        "❌ *Problema con el Pago* - {brand}\n\n\
         Hola {name} 😔\n\n\
         Hubo un problema procesando tu pago:\n\n\
         ⚠️ *Motivo:* {reason}\n\n\
         🔄 *¿Qué puedes hacer?*\n\
         • Verifica los datos de tu tarjeta\n\
         • Intenta con otro método de pago\n\
         • Contacta a tu banco si es necesario",
        brand = message.brand_name,
        name = greeting(message.customer_name.as_deref()),
        reason = message.reason,
    );
    let mut buttons = Vec::new();
    if let Some(retry_url) = &message.retry_url {
        text.push_str("\n\n💳 Puedes intentar nuevamente con el enlace:");
        buttons.push(UrlButton {
            title: "🔄 Intentar de nuevo".to_owned(),
            url: retry_url.clone(),
        });
    }
    text.push_str(&format!(
        "\n\n📞 *¿Necesitas ayuda?*\nContáctanos: {}",
        message.support_phone
    ));
    RenderedTemplate { kind: "payment_failure", text, buttons }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pagoflow_core::{CartItem, Money};
    use rust_decimal::Decimal;

    use super::{payment_confirmation, payment_failure, payment_link};
    use crate::messages::{
        PaymentConfirmationMessage, PaymentFailureMessage, PaymentLinkMessage,
    };

    fn camisa(quantity: u32) -> CartItem {
        CartItem {
            id: "camisa-01".to_owned(),
            title: "Camisa".to_owned(),
            description: None,
            quantity,
            unit_price: Money::new(Decimal::from(50_000)),
        }
    }

    #[test]
    fn payment_link_shows_line_totals_and_formatted_total() {
        let rendered = payment_link(&PaymentLinkMessage {
            brand_name: "KOAJ".to_owned(),
            customer_name: Some("Ana".to_owned()),
            items: vec![camisa(2)],
            total_amount: Money::new(Decimal::from(100_000)),
            checkout_url: "https://mp.example/checkout/abc".to_owned(),
            expires_at: Utc.with_ymd_and_hms(2026, 9, 5, 15, 4, 0).single().expect("valid date"),
        });
        assert_eq!(rendered.kind, "payment_link");
        assert!(rendered.text.contains("¡Hola Ana!"));
        assert!(rendered.text.contains("Cantidad: 2 x $50,000 COP = $100,000 COP"));
        assert!(rendered.text.contains("*Total: $100,000 COP*"));
        assert!(rendered.text.contains("5 de septiembre de 2026 a las 15:04"));
        assert_eq!(rendered.buttons.len(), 1);
        assert_eq!(rendered.buttons[0].url, "https://mp.example/checkout/abc");
    }

    #[test]
    fn anonymous_customers_get_the_generic_greeting() {
        let rendered = payment_link(&PaymentLinkMessage {
            brand_name: "KOAJ".to_owned(),
            customer_name: None,
            items: vec![camisa(1)],
            total_amount: Money::new(Decimal::from(50_000)),
            checkout_url: "https://mp.example/checkout/abc".to_owned(),
            expires_at: Utc::now(),
        });
        assert!(rendered.text.contains("¡Hola estimado cliente!"));
    }

    #[test]
    fn confirmation_includes_approval_code_when_present() {
        let base = PaymentConfirmationMessage {
            brand_name: "KOAJ".to_owned(),
            customer_name: None,
            items: vec![camisa(1)],
            total_amount: Money::new(Decimal::from(50_000)),
            payment_id: "987654".to_owned(),
            approval_code: Some("AUTH123".to_owned()),
        };
        let with_code = payment_confirmation(&base);
        assert!(with_code.text.contains("Código de aprobación: AUTH123"));

        let without = payment_confirmation(&PaymentConfirmationMessage {
            approval_code: None,
            ..base
        });
        assert!(!without.text.contains("Código de aprobación"));
    }

    #[test]
    fn failure_retry_button_appears_only_with_a_retry_url() {
        let base = PaymentFailureMessage {
            brand_name: "KOAJ".to_owned(),
            customer_name: None,
            reason: "Fondos insuficientes en la tarjeta.".to_owned(),
            retry_url: Some("https://mp.example/checkout/retry".to_owned()),
            support_phone: "+573001234567".to_owned(),
        };
        let with_retry = payment_failure(&base);
        assert_eq!(with_retry.buttons.len(), 1);
        assert!(with_retry.text.contains("Fondos insuficientes"));
        assert!(with_retry.text.contains("+573001234567"));

        let without = payment_failure(&PaymentFailureMessage { retry_url: None, ..base });
        assert!(without.buttons.is_empty());
    }
}
