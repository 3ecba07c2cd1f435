//! Customer-facing formatting shared by every message builder, so the COP
//! and phone renderings cannot drift between call sites.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::domain::money::Money;
use crate::domain::phone::PhoneNumber;

const SPANISH_MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// `$1,234,567 COP` — whole pesos with thousands grouping.
pub fn format_cop(amount: Money) -> String {
    let rounded = amount.amount().round_dp(0);
    let digits = rounded.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded.is_sign_negative() { "-" } else { "" };
    format!("${sign}{grouped} COP")
}

/// `+57 300 123 4567`
pub fn format_phone_display(phone: &PhoneNumber) -> String {
    let national = phone.national_digits();
    format!("+57 {} {} {}", &national[..3], &national[3..6], &national[6..])
}

/// `30 de agosto de 2026 a las 15:04` (UTC; payment links carry their own
/// timezone on the gateway side).
pub fn format_expiry(expires_at: DateTime<Utc>) -> String {
    let month = SPANISH_MONTHS[expires_at.month0() as usize];
    format!(
        "{} de {} de {} a las {:02}:{:02}",
        expires_at.day(),
        month,
        expires_at.year(),
        expires_at.hour(),
        expires_at.minute()
    )
}
