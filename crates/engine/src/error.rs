//! The module contains the errors the settlement engine can throw.
//!
//! The errors fall in four families:
//!
//! - [`Precondition`] the state does not allow the operation (no payment
//!   term, already resolved item, rejected payment...). Safe to retry once
//!   the caller fixes the state.
//! - [`OverAllocation`] money would be applied beyond a remaining balance.
//! - [`MissingRate`] money has to cross currencies and no rate is known.
//! - [`InvalidAmount`] and friends: malformed input.
//!
//! Every error raised inside a mutating [`Engine`](crate::Engine) operation
//! rolls the surrounding DB transaction back.
//!
//!  [`Precondition`]: SettlementError::Precondition
//!  [`OverAllocation`]: SettlementError::OverAllocation
//!  [`MissingRate`]: SettlementError::MissingRate
//!  [`InvalidAmount`]: SettlementError::InvalidAmount
use sea_orm::DbErr;
use thiserror::Error;

/// Settlement engine errors.
#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("Over-allocation: {0}")]
    OverAllocation(String),
    #[error("Missing exchange rate {from} -> {to}")]
    MissingRate { from: String, to: String },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for SettlementError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Precondition(a), Self::Precondition(b)) => a == b,
            (Self::OverAllocation(a), Self::OverAllocation(b)) => a == b,
            (
                Self::MissingRate { from: fa, to: ta },
                Self::MissingRate { from: fb, to: tb },
            ) => fa == fb && ta == tb,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidPeriod(a), Self::InvalidPeriod(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
