//! Settlement rules: status derivation and the checks every allocation,
//! credit application and waive has to pass.
//!
//! Everything here is pure. The [`Engine`](crate::Engine) loads the rows
//! under lock, runs these checks and persists the outcome in the same
//! transaction.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use crate::{
    CurrencyCode, ItemStatus, Money, Payment, PaymentStatus, ResultSettlement, ScheduleItem,
    SettlementError,
};

/// Status of `item` as of `as_of`.
///
/// WAIVED is sticky, then PAID when nothing remains. Otherwise the due date
/// decides: PENDING without one or beyond the due-soon window, OVERDUE once
/// passed, DUE in between.
pub fn derive_status(item: &ScheduleItem, as_of: NaiveDate, due_soon_days: u32) -> ItemStatus {
    if item.status == ItemStatus::Waived {
        return ItemStatus::Waived;
    }
    if item.remaining_amount().is_zero() {
        return ItemStatus::Paid;
    }
    let Some(due) = item.due_date else {
        return ItemStatus::Pending;
    };
    let horizon = as_of
        .checked_add_days(Days::new(u64::from(due_soon_days)))
        .unwrap_or(NaiveDate::MAX);
    if due > horizon {
        ItemStatus::Pending
    } else if due < as_of {
        ItemStatus::Overdue
    } else {
        ItemStatus::Due
    }
}

/// Converts a payment-currency amount into the item currency.
///
/// Returns the rate snapshot to store (`None` for same-currency moves) and
/// the converted amount. A cross-currency move without a rate fails.
pub fn to_document_amount(
    amount: Money,
    payment_currency: CurrencyCode,
    item_currency: CurrencyCode,
    rate: Option<Decimal>,
) -> ResultSettlement<(Option<Decimal>, Money)> {
    if payment_currency == item_currency {
        return Ok((None, amount));
    }
    let rate = rate.ok_or_else(|| SettlementError::MissingRate {
        from: payment_currency.to_string(),
        to: item_currency.to_string(),
    })?;
    if rate <= Decimal::ZERO {
        return Err(SettlementError::InvalidAmount(format!(
            "exchange rate must be > 0, got {rate}"
        )));
    }
    Ok((Some(rate), amount.convert(rate)?))
}

/// Checks `allocate(payment, item, amount)` where `document_amount` is the
/// amount already converted into the item currency.
pub fn check_allocation(
    payment: &Payment,
    item: &ScheduleItem,
    amount: Money,
    document_amount: Money,
) -> ResultSettlement<()> {
    if !amount.is_positive() || !document_amount.is_positive() {
        return Err(SettlementError::InvalidAmount(format!(
            "allocation amount must be > 0, got {amount}"
        )));
    }
    if payment.status == PaymentStatus::Rejected {
        return Err(SettlementError::Precondition(format!(
            "payment {} is rejected",
            payment.id
        )));
    }
    if payment.direction.settles() != item.payable.direction() {
        return Err(SettlementError::Precondition(format!(
            "{} payment cannot settle {}",
            payment.direction.as_str(),
            item.payable
        )));
    }
    if item.is_credit {
        return Err(SettlementError::Precondition(format!(
            "item '{}' is a credit, apply it instead of allocating to it",
            item.label
        )));
    }
    ensure_collectible(item)?;
    let remaining = item.remaining_amount();
    if document_amount > remaining {
        return Err(SettlementError::OverAllocation(format!(
            "{document_amount} {} exceeds the remaining {remaining} of '{}'",
            item.currency, item.label
        )));
    }
    let unallocated = payment.unallocated();
    if amount > unallocated {
        return Err(SettlementError::OverAllocation(format!(
            "{amount} {} exceeds the unallocated {unallocated} of payment {}",
            payment.currency, payment.id
        )));
    }
    Ok(())
}

/// Checks `apply_credit(credit, target, amount)`.
pub fn check_credit(
    credit: &ScheduleItem,
    target: &ScheduleItem,
    amount: Money,
) -> ResultSettlement<()> {
    if !amount.is_positive() {
        return Err(SettlementError::InvalidAmount(format!(
            "credit amount must be > 0, got {amount}"
        )));
    }
    if !credit.is_credit {
        return Err(SettlementError::Precondition(format!(
            "item '{}' is not a credit",
            credit.label
        )));
    }
    if credit.id == target.id {
        return Err(SettlementError::Precondition(
            "a credit cannot be applied to itself".to_string(),
        ));
    }
    if credit.status == ItemStatus::Waived {
        return Err(SettlementError::Precondition(format!(
            "credit '{}' is waived",
            credit.label
        )));
    }
    if target.is_credit {
        return Err(SettlementError::Precondition(format!(
            "target '{}' is a credit",
            target.label
        )));
    }
    if credit.currency != target.currency {
        return Err(SettlementError::CurrencyMismatch(format!(
            "credit in {} cannot settle an item in {}",
            credit.currency, target.currency
        )));
    }
    if credit.payable.direction() != target.payable.direction() {
        return Err(SettlementError::Precondition(format!(
            "credit of {} cannot settle {}",
            credit.payable, target.payable
        )));
    }
    let available = credit.remaining_amount();
    if available.is_zero() {
        return Err(SettlementError::Precondition(format!(
            "credit '{}' is fully consumed",
            credit.label
        )));
    }
    ensure_collectible(target)?;
    if amount > available {
        return Err(SettlementError::OverAllocation(format!(
            "{amount} exceeds the unconsumed {available} of credit '{}'",
            credit.label
        )));
    }
    let remaining = target.remaining_amount();
    if amount > remaining {
        return Err(SettlementError::OverAllocation(format!(
            "{amount} exceeds the remaining {remaining} of '{}'",
            target.label
        )));
    }
    Ok(())
}

/// Checks `waive(item)`: only unresolved items can be waived.
pub fn check_waive(item: &ScheduleItem) -> ResultSettlement<()> {
    ensure_collectible(item)
}

fn ensure_collectible(item: &ScheduleItem) -> ResultSettlement<()> {
    if item.status == ItemStatus::Waived {
        return Err(SettlementError::Precondition(format!(
            "item '{}' is waived",
            item.label
        )));
    }
    if item.remaining_amount().is_zero() {
        return Err(SettlementError::Precondition(format!(
            "item '{}' is already paid",
            item.label
        )));
    }
    Ok(())
}

/// Splits `available` over `remaining` balances in order, each one up to
/// its balance. Returns one amount per balance; trailing ones are zero once
/// the money runs out.
pub fn plan_waterfall(available: Money, remaining: &[Money]) -> Vec<Money> {
    let mut left = if available.is_negative() {
        Money::ZERO
    } else {
        available
    };
    remaining
        .iter()
        .map(|balance| {
            let take = if *balance < left { *balance } else { left };
            let take = if take.is_negative() { Money::ZERO } else { take };
            left -= take;
            take
        })
        .collect()
}
