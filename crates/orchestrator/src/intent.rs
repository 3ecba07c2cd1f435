//! Keyword classification of inbound Spanish messages.
//!
//! Case-insensitive substring match against three keyword sets. Payment
//! intent wins when several match, so "quiero pagar mi carrito" starts a
//! checkout instead of a cart action.

const PAYMENT_KEYWORDS: &[&str] = &["pagar", "comprar", "precio", "costo", "checkout", "pago"];
const CART_KEYWORDS: &[&str] = &["carrito", "agregar", "quitar", "vaciar", "eliminar"];
const PRODUCT_KEYWORDS: &[&str] = &["producto", "talla", "color", "disponible", "stock"];
const CLEAR_CART_KEYWORDS: &[&str] = &["vaciar", "eliminar"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageIntent {
    Payment,
    CartAction,
    ProductInquiry,
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword))
}

/// `None` means the message is not payment-related and gets no reply.
pub fn classify(text: &str) -> Option<MessageIntent> {
    let normalized = text.to_lowercase();
    if contains_any(&normalized, PAYMENT_KEYWORDS) {
        Some(MessageIntent::Payment)
    } else if contains_any(&normalized, CART_KEYWORDS) {
        Some(MessageIntent::CartAction)
    } else if contains_any(&normalized, PRODUCT_KEYWORDS) {
        Some(MessageIntent::ProductInquiry)
    } else {
        None
    }
}

pub fn is_clear_cart(text: &str) -> bool {
    contains_any(&text.to_lowercase(), CLEAR_CART_KEYWORDS)
}

#[cfg(test)]
mod tests {
    use super::{classify, is_clear_cart, MessageIntent};

    #[test]
    fn payment_keywords_classify_as_payment() {
        for text in ["quiero pagar", "cuánto cuesta? el precio", "Listo para el CHECKOUT"] {
            assert_eq!(classify(text), Some(MessageIntent::Payment), "{text}");
        }
    }

    #[test]
    fn payment_intent_wins_over_cart_keywords() {
        assert_eq!(classify("quiero pagar mi carrito"), Some(MessageIntent::Payment));
    }

    #[test]
    fn cart_keywords_classify_as_cart_action() {
        assert_eq!(classify("agregar otra camisa al carrito"), Some(MessageIntent::CartAction));
        assert_eq!(classify("vaciar carrito"), Some(MessageIntent::CartAction));
    }

    #[test]
    fn product_keywords_classify_as_inquiry() {
        assert_eq!(classify("¿tienen talla M disponible?"), Some(MessageIntent::ProductInquiry));
    }

    #[test]
    fn unrelated_messages_have_no_intent() {
        assert_eq!(classify("hola, buenos días"), None);
    }

    #[test]
    fn clear_cart_detects_vaciar_and_eliminar_only() {
        assert!(is_clear_cart("Vaciar el carrito por favor"));
        assert!(is_clear_cart("eliminar todo"));
        assert!(!is_clear_cart("agregar al carrito"));
    }
}
