//! Vendor payment statuses and their classification into the three
//! buckets the orchestrator dispatches on, plus the Spanish customer copy
//! for each outcome.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Authorized,
    InProcess,
    InMediation,
    Rejected,
    Cancelled,
    Refunded,
    ChargedBack,
}

impl PaymentStatus {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "pending" => Self::Pending,
            "approved" => Self::Approved,
            "authorized" => Self::Authorized,
            "in_process" => Self::InProcess,
            "in_mediation" => Self::InMediation,
            "rejected" => Self::Rejected,
            "cancelled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            "charged_back" => Self::ChargedBack,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Authorized => "authorized",
            Self::InProcess => "in_process",
            Self::InMediation => "in_mediation",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::ChargedBack => "charged_back",
        }
    }
}

/// The three webhook dispatch buckets. Statuses outside all three
/// (mediation, refunds, chargebacks) are recorded but trigger no
/// conversation-side action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentStatusKind {
    Successful,
    Failed,
    Pending,
    Other,
}

pub fn classify(status: PaymentStatus) -> PaymentStatusKind {
    match status {
        PaymentStatus::Approved | PaymentStatus::Authorized => PaymentStatusKind::Successful,
        PaymentStatus::Rejected | PaymentStatus::Cancelled => PaymentStatusKind::Failed,
        PaymentStatus::Pending | PaymentStatus::InProcess => PaymentStatusKind::Pending,
        PaymentStatus::InMediation | PaymentStatus::Refunded | PaymentStatus::ChargedBack => {
            PaymentStatusKind::Other
        }
    }
}

fn base_message(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Approved | PaymentStatus::Authorized => {
            "¡Pago aprobado! Tu compra ha sido procesada exitosamente."
        }
        PaymentStatus::Pending => {
            "Tu pago está siendo procesado. Te notificaremos cuando esté listo."
        }
        PaymentStatus::InProcess => "Tu pago está en proceso de verificación.",
        PaymentStatus::Rejected => {
            "Tu pago fue rechazado. Por favor intenta con otro método de pago."
        }
        PaymentStatus::Cancelled => "El pago fue cancelado.",
        PaymentStatus::Refunded => "Tu pago ha sido reembolsado.",
        PaymentStatus::ChargedBack => "Se ha procesado una devolución del cargo.",
        PaymentStatus::InMediation => "Tu pago está en revisión.",
    }
}

fn rejected_detail(status_detail: &str) -> Option<&'static str> {
    Some(match status_detail {
        "cc_rejected_insufficient_amount" => "Fondos insuficientes en la tarjeta.",
        "cc_rejected_bad_filled_card_number" => "Número de tarjeta incorrecto.",
        "cc_rejected_bad_filled_date" => "Fecha de vencimiento incorrecta.",
        "cc_rejected_bad_filled_security_code" => "Código de seguridad incorrecto.",
        "cc_rejected_card_disabled" => "La tarjeta está deshabilitada.",
        "cc_rejected_call_for_authorize" => "Debes autorizar el pago con tu banco.",
        "cc_rejected_duplicated_payment" => "Pago duplicado detectado.",
        _ => return None,
    })
}

/// Deterministic human-readable reason for a payment outcome. Unknown
/// detail codes fall back to the generic message for the status.
pub fn failure_reason(status: PaymentStatus, status_detail: Option<&str>) -> String {
    let base = base_message(status);
    match (status, status_detail.and_then(rejected_detail)) {
        (PaymentStatus::Rejected, Some(detail)) => format!("{base} {detail}"),
        _ => base.to_owned(),
    }
}
