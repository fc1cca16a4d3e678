use bigdecimal::BigDecimal;
use std::fmt;

pub const CURRENCY_CODE_LEN: usize = 3;
pub const RECIPIENT_NAME_MAX_LEN: usize = 120;
pub const ACCOUNT_IDENTIFIER_MAX_LEN: usize = 64;
pub const NOTES_MAX_LEN: usize = 500;
pub const ACCOUNT_TYPE_MAX_LEN: usize = 32;
pub const ALLOWED_CURRENCIES: &[&str] = &["USD", "EUR", "GBP", "JPY"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_currency(code: &str) -> ValidationResult {
    if code.len() != CURRENCY_CODE_LEN || !ALLOWED_CURRENCIES.contains(&code) {
        return Err(ValidationError::new(
            "currency",
            format!("must be one of: {}", ALLOWED_CURRENCIES.join(", ")),
        ));
    }

    Ok(())
}

/// Number of minor-unit digits for a currency.
pub fn minor_units(currency: &str) -> i64 {
    match currency {
        "JPY" => 0,
        _ => 2,
    }
}

pub fn validate_positive_amount(amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new("amount", "must be greater than zero"));
    }

    Ok(())
}

/// Positive, with no more fractional digits than the currency's minor unit.
pub fn validate_amount(amount: &BigDecimal, currency: &str) -> ValidationResult {
    validate_positive_amount(amount)?;

    let scale = minor_units(currency);
    if &amount.with_scale(scale) != amount {
        return Err(ValidationError::new(
            "amount",
            format!("must have at most {} decimal places for {}", scale, currency),
        ));
    }

    Ok(())
}

/// Optional free text: sanitized, length-checked, empty collapses to None.
pub fn clean_notes(notes: Option<&str>) -> Result<Option<String>, ValidationError> {
    match notes.map(sanitize_string) {
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => {
            validate_max_len("notes", &s, NOTES_MAX_LEN)?;
            Ok(Some(s))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).expect("valid decimal")
    }

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_currency() {
        assert!(validate_currency("USD").is_ok());
        assert!(validate_currency("usd").is_err());
        assert!(validate_currency("XYZ").is_err());
    }

    #[test]
    fn validates_positive_amount() {
        assert!(validate_positive_amount(&dec("1.23")).is_ok());
        assert!(validate_positive_amount(&BigDecimal::from(0)).is_err());
        assert!(validate_positive_amount(&BigDecimal::from(-1)).is_err());
    }

    #[test]
    fn validates_minor_unit_precision() {
        assert!(validate_amount(&dec("120.00"), "USD").is_ok());
        assert!(validate_amount(&dec("120.5"), "USD").is_ok());
        assert!(validate_amount(&dec("120.001"), "USD").is_err());
        assert!(validate_amount(&dec("120.10"), "JPY").is_err());
        assert!(validate_amount(&dec("120"), "JPY").is_ok());
        assert!(validate_amount(&dec("-5.00"), "USD").is_err());
    }

    #[test]
    fn cleans_notes() {
        assert_eq!(clean_notes(None), Ok(None));
        assert_eq!(clean_notes(Some("   ")), Ok(None));
        assert_eq!(clean_notes(Some(" rent\n")), Ok(Some("rent".to_string())));
        assert!(clean_notes(Some(&"x".repeat(NOTES_MAX_LEN + 1))).is_err());
    }
}
