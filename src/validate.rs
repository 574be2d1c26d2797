//! Input shape checks shared by the sync and CRUD endpoints.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use time::{macros::format_description, Date};

pub const BILL_NUMBER_MAX_LEN: usize = 50;

lazy_static! {
    static ref DATE_RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref PERIOD_RE: Regex = Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").unwrap();
    // numeric(10, 2): at most eight integer digits and two fractional ones.
    static ref AMOUNT_RE: Regex = Regex::new(r"^-?\d{1,8}(\.\d{1,2})?$").unwrap();
}

/// A field that failed validation, addressed by its path in the request
/// (e.g. `readings[1].date`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn format_date(date: Date) -> String {
    // A four-digit year cannot fail to format.
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

/// Parses an exact `YYYY-MM-DD` calendar date.
pub fn parse_date(field: &str, raw: &str) -> Result<Date, ValidationError> {
    if !DATE_RE.is_match(raw) {
        return Err(ValidationError::new(field, "invalid date format (YYYY-MM-DD)"));
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ValidationError::new(field, format!("{raw} is not a calendar date")))
}

pub fn parse_optional_date(
    field: &str,
    raw: Option<&str>,
) -> Result<Option<Date>, ValidationError> {
    raw.map(|s| parse_date(field, s)).transpose()
}

/// Checks a `YYYY-MM` billing period.
pub fn check_billing_period(
    field: &str,
    raw: Option<String>,
) -> Result<Option<String>, ValidationError> {
    match raw {
        Some(p) if !PERIOD_RE.is_match(&p) => Err(ValidationError::new(
            field,
            "invalid billing period format (YYYY-MM)",
        )),
        other => Ok(other),
    }
}

pub fn check_max_len(
    field: &str,
    raw: Option<String>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match raw {
        Some(s) if s.chars().count() > max => Err(ValidationError::new(
            field,
            format!("must be at most {max} characters"),
        )),
        other => Ok(other),
    }
}

/// Parses a fixed-point amount and normalizes it to exactly two fractional digits.
pub fn parse_amount(field: &str, raw: &str) -> Result<Decimal, ValidationError> {
    let raw = raw.trim();
    if !AMOUNT_RE.is_match(raw) {
        return Err(ValidationError::new(
            field,
            "invalid amount (up to 8 integer and 2 fractional digits)",
        ));
    }
    let mut amount = Decimal::from_str(raw)
        .map_err(|e| ValidationError::new(field, format!("invalid amount: {e}")))?;
    amount.rescale(2);
    Ok(amount)
}

/// Serde adapters for `YYYY-MM-DD` dates on outgoing payloads.
pub mod iso_date {
    use serde::Serializer;
    use time::Date;

    use super::format_date;

    pub fn serialize<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_date(*date))
    }

    pub mod option {
        use serde::Serializer;
        use time::Date;

        use crate::validate::format_date;

        pub fn serialize<S: Serializer>(date: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => s.serialize_some(&format_date(*d)),
                None => s.serialize_none(),
            }
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
/// Pair with `#[serde(default)]`.
pub fn nullable<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}
