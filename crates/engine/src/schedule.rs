//! Payment schedule generation.
//!
//! Every stage of a [`PaymentTermTemplate`] becomes one [`ScheduleItem`]
//! whose amount is `round(total × percentage / 100)`. Stages are rounded
//! independently: no remainder is pushed onto the last item, so the items
//! may differ from the document total by at most one minor unit per stage.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use uuid::Uuid;

use crate::{
    CalculationBase, CurrencyCode, ItemStatus, Money, Payable, PaymentTermStage,
    PaymentTermTemplate, ResultSettlement, ScheduleItem, SettlementError,
};

/// What the schedule generator needs to know about the owning document.
#[derive(Clone, Debug)]
pub struct Document {
    pub payable: Payable,
    pub total: Money,
    pub currency: CurrencyCode,
    pub payment_term: Option<PaymentTermTemplate>,
    /// Concrete dates known so far; missing bases leave due dates empty.
    pub base_dates: HashMap<CalculationBase, NaiveDate>,
}

impl Document {
    pub fn new(payable: Payable, total: Money, currency: CurrencyCode) -> Self {
        Self {
            payable,
            total,
            currency,
            payment_term: None,
            base_dates: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_payment_term(mut self, template: PaymentTermTemplate) -> Self {
        self.payment_term = Some(template);
        self
    }

    #[must_use]
    pub fn with_base_date(mut self, base: CalculationBase, date: NaiveDate) -> Self {
        self.base_dates.insert(base, date);
        self
    }
}

/// `base date + day_offset`, or `None` while the base date is unknown.
pub fn due_date_for(
    stage_base: CalculationBase,
    day_offset: u32,
    base_dates: &HashMap<CalculationBase, NaiveDate>,
) -> Option<NaiveDate> {
    base_dates
        .get(&stage_base)
        .and_then(|date| date.checked_add_days(Days::new(u64::from(day_offset))))
}

/// Status of a freshly generated item: DUE once the due date falls inside
/// the due-soon window, PENDING otherwise.
pub fn initial_status(due_date: Option<NaiveDate>, as_of: NaiveDate, due_soon_days: u32) -> ItemStatus {
    let horizon = as_of
        .checked_add_days(Days::new(u64::from(due_soon_days)))
        .unwrap_or(NaiveDate::MAX);
    match due_date {
        Some(date) if date <= horizon => ItemStatus::Due,
        _ => ItemStatus::Pending,
    }
}

/// Expands the document's payment term into schedule items.
///
/// Sort orders start at `first_sort_order` and follow the template order.
pub fn plan_schedule(
    document: &Document,
    first_sort_order: i32,
    as_of: NaiveDate,
    due_soon_days: u32,
) -> ResultSettlement<Vec<ScheduleItem>> {
    let template = document.payment_term.as_ref().ok_or_else(|| {
        SettlementError::Precondition(format!(
            "no payment term assigned to {}",
            document.payable
        ))
    })?;
    if document.total.is_negative() {
        return Err(SettlementError::InvalidAmount(format!(
            "document total must not be negative, got {}",
            document.total
        )));
    }

    let mut items = Vec::with_capacity(template.stages.len());
    let mut sort_order = first_sort_order;
    for stage in &template.stages {
        items.push(plan_item(document, stage, sort_order, as_of, due_soon_days)?);
        sort_order += 1;
    }
    Ok(items)
}

/// Plans the stages a regeneration has to recreate.
///
/// A stage already covered by a preserved item (same label, calculation
/// base and day offset) is skipped; each preserved item covers at most one
/// stage. The new items are numbered after the highest preserved sort order.
pub fn plan_regeneration(
    document: &Document,
    preserved: &[ScheduleItem],
    as_of: NaiveDate,
    due_soon_days: u32,
) -> ResultSettlement<Vec<ScheduleItem>> {
    let first = preserved.iter().map(|i| i.sort_order).max().unwrap_or(0) + 1;
    let planned = plan_schedule(document, first, as_of, due_soon_days)?;

    let mut covered = vec![false; preserved.len()];
    let mut items = Vec::with_capacity(planned.len());
    for item in planned {
        let cover = preserved.iter().enumerate().position(|(idx, kept)| {
            !covered[idx]
                && !kept.is_credit
                && kept.label == item.label
                && kept.calculation_base == item.calculation_base
                && kept.day_offset == item.day_offset
        });
        match cover {
            Some(idx) => covered[idx] = true,
            None => items.push(item),
        }
    }
    for (sort_order, item) in (first..).zip(items.iter_mut()) {
        item.sort_order = sort_order;
    }
    Ok(items)
}

fn plan_item(
    document: &Document,
    stage: &PaymentTermStage,
    sort_order: i32,
    as_of: NaiveDate,
    due_soon_days: u32,
) -> ResultSettlement<ScheduleItem> {
    let due_date = due_date_for(stage.calculation_base, stage.day_offset, &document.base_dates);
    let amount = document.total.percent_of(stage.percentage)?;
    // Nothing to collect: the item is settled from the start.
    let status = if amount.is_zero() {
        ItemStatus::Paid
    } else {
        initial_status(due_date, as_of, due_soon_days)
    };
    Ok(ScheduleItem {
        id: Uuid::new_v4(),
        payable: document.payable,
        label: stage.label.clone(),
        percentage: Some(stage.percentage),
        amount,
        currency: document.currency,
        due_date,
        calculation_base: Some(stage.calculation_base),
        day_offset: Some(stage.day_offset),
        is_blocking: stage.is_blocking,
        is_credit: false,
        status,
        sort_order,
        waived_reason: None,
        paid_amount: Money::ZERO,
        credited_amount: Money::ZERO,
        consumed_amount: Money::ZERO,
    })
}
