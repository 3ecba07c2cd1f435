use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Colombian customer phone number in canonical form: `+57` followed by
/// exactly ten digits. Parsed once at the boundary, passed by value after.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Accepts any formatting (spaces, dashes, leading `+`). A bare
    /// ten-digit mobile number gets the `57` country code prepended; a
    /// twelve-digit number must already carry it.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

        let national = match digits.len() {
            10 => digits,
            12 if digits.starts_with("57") => digits[2..].to_owned(),
            _ => return Err(ValidationError::InvalidPhone { raw: raw.to_owned() }),
        };

        Ok(Self(format!("+57{national}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Digits only, country code included. The Bird API wants this form.
    pub fn digits(&self) -> &str {
        &self.0[1..]
    }

    /// The ten national digits without the country code.
    pub fn national_digits(&self) -> &str {
        &self.0[3..]
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::ValidationError;

    use super::PhoneNumber;

    #[test]
    fn bare_national_number_gains_country_code() {
        let phone = PhoneNumber::parse("3001234567").expect("ten digits are valid");
        assert_eq!(phone.as_str(), "+573001234567");
    }

    #[test]
    fn prefixed_and_bare_forms_normalize_identically() {
        let bare = PhoneNumber::parse("3001234567").expect("bare form");
        let prefixed = PhoneNumber::parse("+573001234567").expect("prefixed form");
        let spaced = PhoneNumber::parse("+57 300 123-4567").expect("formatted form");

        assert_eq!(bare, prefixed);
        assert_eq!(bare, spaced);
    }

    #[test]
    fn too_short_number_is_rejected() {
        let error = PhoneNumber::parse("12345678").expect_err("eight digits are invalid");
        assert!(matches!(error, ValidationError::InvalidPhone { .. }));
    }

    #[test]
    fn twelve_digits_without_country_code_are_rejected() {
        assert!(PhoneNumber::parse("583001234567").is_err());
    }

    #[test]
    fn digit_views_strip_expected_prefixes() {
        let phone = PhoneNumber::parse("+573001234567").expect("valid");
        assert_eq!(phone.digits(), "573001234567");
        assert_eq!(phone.national_digits(), "3001234567");
    }
}
