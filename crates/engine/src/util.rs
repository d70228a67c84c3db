//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! parsing of stored values so every entity maps them the same way.

use std::str::FromStr;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{ResultSettlement, SettlementError};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultSettlement<Uuid> {
    Uuid::parse_str(value).map_err(|_| SettlementError::InvalidId(format!("invalid {label} id")))
}

/// Parse a decimal stored as text (percentages, rates).
pub(crate) fn parse_decimal(value: &str, label: &str) -> ResultSettlement<Decimal> {
    Decimal::from_str(value)
        .map_err(|_| SettlementError::InvalidAmount(format!("invalid stored {label}: {value}")))
}

/// Validate a stage/item percentage: `0 < p <= 100`.
pub(crate) fn validate_percentage(percentage: Decimal, label: &str) -> ResultSettlement<()> {
    if percentage <= Decimal::ZERO || percentage > Decimal::ONE_HUNDRED {
        return Err(SettlementError::InvalidAmount(format!(
            "percentage of '{label}' must be in (0, 100], got {percentage}"
        )));
    }
    Ok(())
}

/// Trim a required label, rejecting empty ones.
pub(crate) fn normalize_required(value: &str, label: &str) -> ResultSettlement<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SettlementError::InvalidAmount(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
