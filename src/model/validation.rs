//! Structural validation rules for POS receipts.

use chrono::{DateTime, Utc};

/// Default tolerance between `subtotal + tax` and `total`, in minor units.
pub const DEFAULT_TOTAL_TOLERANCE_CENTS: i64 = 5;

/// Number of trailing card digits retained after normalization.
const CARD_SUFFIX_LEN: usize = 4;

/// Errors raised while turning raw POS input into a [`super::Receipt`].
///
/// A validation error means nothing was written to either path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Line item {index} missing required field: {field}")]
    MissingItemField { index: usize, field: &'static str },

    #[error("Line item {index} must have at least a upc or sku")]
    ItemMissingIdentifier { index: usize },

    #[error("Line item {index} has negative quantity {quantity}")]
    NegativeQuantity { index: usize, quantity: i64 },

    #[error("Negative amount for {field}: {value}")]
    NegativeAmount { field: String, value: i64 },

    #[error(
        "subtotal_cents ({subtotal}) + tax_cents ({tax}) does not equal total_cents ({total}) within ±{tolerance}"
    )]
    TotalMismatch {
        subtotal: i64,
        tax: i64,
        total: i64,
        tolerance: i64,
    },

    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Unknown tender type: {0}")]
    UnknownTender(String),
}

/// Tunable validation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationRules {
    /// Maximum allowed |subtotal + tax - total|, in minor units.
    pub total_tolerance_cents: i64,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            total_tolerance_cents: DEFAULT_TOTAL_TOLERANCE_CENTS,
        }
    }
}

impl ValidationRules {
    /// Check header totals. Only applies when both subtotal and tax are known.
    pub fn check_totals(
        &self,
        subtotal: Option<i64>,
        tax: Option<i64>,
        total: i64,
    ) -> Result<(), ValidationError> {
        let (Some(subtotal), Some(tax)) = (subtotal, tax) else {
            return Ok(());
        };

        // widened: the i64 sum can overflow
        let diff = (subtotal as i128 + tax as i128 - total as i128).abs();
        if diff > self.total_tolerance_cents as i128 {
            return Err(ValidationError::TotalMismatch {
                subtotal,
                tax,
                total,
                tolerance: self.total_tolerance_cents,
            });
        }
        Ok(())
    }
}

/// Normalize a loosely formatted card suffix.
///
/// Accepts `"4532"`, `"****4532"`, `"xxxx-xxxx-xxxx-4532"` and similar.
/// Returns the last four digits, or `None` when fewer than four digits remain.
pub fn normalize_card_last4(raw: &str) -> Option<String> {
    let digits: Vec<char> = raw.trim().chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < CARD_SUFFIX_LEN {
        return None;
    }
    Some(digits[digits.len() - CARD_SUFFIX_LEN..].iter().collect())
}

/// Parse a timezone-aware RFC 3339 timestamp into UTC.
///
/// Naive timestamps (no offset) are rejected.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ValidationError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Require a non-negative amount.
pub(crate) fn non_negative(field: impl Into<String>, value: i64) -> Result<i64, ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeAmount {
            field: field.into(),
            value,
        });
    }
    Ok(value)
}

/// Treat blank strings as absent.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
