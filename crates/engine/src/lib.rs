//! Financial settlement core: money, payment schedules, allocations and
//! cash-flow projection.
//!
//! The pure building blocks ([`plan_schedule`], [`derive_status`],
//! [`cash_flow::project`]...) work on plain values. [`Engine`] wraps them
//! with persistence: every mutating operation runs in one DB transaction.

pub use allocation::{
    check_allocation, check_credit, check_waive, derive_status, plan_waterfall,
    to_document_amount,
};
pub use allocations::Allocation;
pub use cash_flow::{
    BucketTotals, CashFlowReport, FlowAmounts, Net, NetDirection, Period, standard_periods,
};
pub use credit_applications::CreditApplication;
pub use currency::{Currency, CurrencyCode};
pub use directory::{CurrencyDirectory, CurrencyRepository};
pub use error::SettlementError;
pub use exchange_rates::ExchangeRate;
pub use money::{MINOR_DIGITS, MINOR_PER_MAJOR, Money, format, to_major, to_minor};
pub use ops::{Engine, EngineBuilder};
pub use payable::{FlowDirection, Payable};
pub use payment_terms::{CalculationBase, PaymentTermStage, PaymentTermTemplate};
pub use payments::{NewPayment, Payment, PaymentDirection, PaymentStatus};
pub use pricing::{LineItem, effective_unit_price};
pub use schedule::{Document, due_date_for, initial_status, plan_regeneration, plan_schedule};
pub use schedule_items::{ItemStatus, ScheduleItem};

mod allocation;
mod allocations;
pub mod cash_flow;
mod credit_applications;
mod currency;
mod directory;
mod error;
mod exchange_rates;
mod money;
mod ops;
mod payable;
mod payment_term_stages;
mod payment_terms;
mod payments;
mod pricing;
mod schedule;
mod schedule_items;
mod util;

pub type ResultSettlement<T> = Result<T, SettlementError>;
