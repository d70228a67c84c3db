//! Cash-flow projection over outstanding schedule items.
//!
//! Items are bucketed by due date into [`Period`]s (day ranges relative to
//! the projection date) and split into inflow (receivables) and outflow
//! (payables). Per bucket and direction, amounts are summed per currency and
//! then converted into the base currency with the rate valid on the
//! projection date. A currency without a rate never fails the projection: it
//! stays out of the converted total and is listed in `unconverted`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    CurrencyCode, CurrencyRepository, FlowDirection, ItemStatus, Money, ResultSettlement,
    ScheduleItem, SettlementError,
};

/// A due-date window, in days relative to the projection date.
///
/// Both ends are inclusive; `start: None` is open towards the past.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Period {
    pub label: String,
    pub start: Option<i64>,
    pub end: i64,
}

impl Period {
    pub fn new(label: &str, start: Option<i64>, end: i64) -> Self {
        Self {
            label: label.to_string(),
            start,
            end,
        }
    }

    pub fn contains(&self, days: i64) -> bool {
        self.start.is_none_or(|start| start <= days) && days <= self.end
    }
}

/// Overdue, this week, next week, then 15/30/60/90-day windows.
pub fn standard_periods() -> Vec<Period> {
    vec![
        Period::new("overdue", None, -1),
        Period::new("this week", Some(0), 6),
        Period::new("next week", Some(7), 13),
        Period::new("15 days", Some(14), 15),
        Period::new("30 days", Some(16), 30),
        Period::new("60 days", Some(31), 60),
        Period::new("90 days", Some(61), 90),
    ]
}

/// Rejects empty period lists, inverted ranges and more than one open start.
pub fn validate_periods(periods: &[Period]) -> ResultSettlement<()> {
    if periods.is_empty() {
        return Err(SettlementError::InvalidPeriod(
            "at least one period is required".to_string(),
        ));
    }
    let mut open = 0;
    for period in periods {
        match period.start {
            Some(start) if start > period.end => {
                return Err(SettlementError::InvalidPeriod(format!(
                    "'{}' starts at day {start} after its end {}",
                    period.label, period.end
                )));
            }
            None => open += 1,
            _ => {}
        }
    }
    if open > 1 {
        return Err(SettlementError::InvalidPeriod(format!(
            "{open} periods have an open start, at most one allowed"
        )));
    }
    Ok(())
}

/// Totals of one direction inside one bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FlowAmounts {
    /// Raw outstanding amounts per original currency.
    pub by_currency: BTreeMap<CurrencyCode, Money>,
    /// Sum of every convertible currency, in the base currency.
    pub converted: Money,
    /// Currencies with no rate to the base currency, with their raw amount.
    pub unconverted: BTreeMap<CurrencyCode, Money>,
}

impl FlowAmounts {
    fn add(&mut self, currency: CurrencyCode, amount: Money) {
        *self.by_currency.entry(currency).or_default() += amount;
    }

    fn convert<R: CurrencyRepository + ?Sized>(
        &mut self,
        base: CurrencyCode,
        as_of: NaiveDate,
        rates: &R,
    ) {
        self.converted = Money::ZERO;
        self.unconverted.clear();
        for (&currency, &amount) in &self.by_currency {
            match rates.convert_money(amount, currency, base, as_of) {
                Some(converted) => self.converted += converted,
                None => {
                    tracing::warn!(
                        %currency,
                        %base,
                        %as_of,
                        "no exchange rate, amount left out of the converted total"
                    );
                    self.unconverted.insert(currency, amount);
                }
            }
        }
    }

    pub fn has_conversion_warning(&self) -> bool {
        !self.unconverted.is_empty()
    }
}

/// Which side a net figure leans to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetDirection {
    Inflow,
    Outflow,
    Balanced,
}

/// Signed `inflow - outflow`; labelling is up to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Net(pub Money);

impl Net {
    pub fn signed(self) -> Money {
        self.0
    }

    pub fn abs(self) -> Money {
        self.0.abs()
    }

    pub fn direction(self) -> NetDirection {
        if self.0.is_positive() {
            NetDirection::Inflow
        } else if self.0.is_negative() {
            NetDirection::Outflow
        } else {
            NetDirection::Balanced
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BucketTotals {
    pub label: String,
    pub inflow: FlowAmounts,
    pub outflow: FlowAmounts,
    pub item_count: usize,
}

impl BucketTotals {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Self::default()
        }
    }

    fn add(&mut self, item: &ScheduleItem, amount: Money) {
        let flow = match item.payable.direction() {
            FlowDirection::Inflow => &mut self.inflow,
            FlowDirection::Outflow => &mut self.outflow,
        };
        flow.add(item.currency, amount);
        self.item_count += 1;
    }

    /// Net of the converted totals.
    pub fn net(&self) -> Net {
        Net(self.inflow.converted - self.outflow.converted)
    }

    pub fn has_conversion_warning(&self) -> bool {
        self.inflow.has_conversion_warning() || self.outflow.has_conversion_warning()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CashFlowReport {
    pub as_of: NaiveDate,
    pub base_currency: CurrencyCode,
    /// One entry per requested period, in the requested order.
    pub buckets: Vec<BucketTotals>,
    /// Outstanding items with no due date yet.
    pub unscheduled: BucketTotals,
    /// Overdue items that no requested period covers.
    pub past_due: BucketTotals,
    /// Items due after every requested period.
    pub beyond_horizon: BucketTotals,
}

impl CashFlowReport {
    fn all_buckets(&self) -> impl Iterator<Item = &BucketTotals> {
        self.buckets
            .iter()
            .chain([&self.unscheduled, &self.past_due, &self.beyond_horizon])
    }

    pub fn total_inflow(&self) -> Money {
        self.all_buckets().map(|b| b.inflow.converted).sum()
    }

    pub fn total_outflow(&self) -> Money {
        self.all_buckets().map(|b| b.outflow.converted).sum()
    }

    pub fn net(&self) -> Net {
        Net(self.total_inflow() - self.total_outflow())
    }

    /// Every currency that could not be converted anywhere in the report.
    pub fn unconverted_currencies(&self) -> Vec<CurrencyCode> {
        let mut codes: Vec<CurrencyCode> = self
            .all_buckets()
            .flat_map(|b| b.inflow.unconverted.keys().chain(b.outflow.unconverted.keys()))
            .copied()
            .collect();
        codes.sort();
        codes.dedup();
        codes
    }

    pub fn has_conversion_warning(&self) -> bool {
        self.all_buckets().any(BucketTotals::has_conversion_warning)
    }
}

/// Whether an item still expects money.
pub fn is_outstanding(item: &ScheduleItem) -> bool {
    !item.is_credit
        && !matches!(item.status, ItemStatus::Paid | ItemStatus::Waived)
        && item.remaining_amount().is_positive()
}

/// Projects `items` over `periods` as of `as_of`.
///
/// Items that are not outstanding are skipped. Each scheduled item lands in
/// the first period containing its due date; overdue items outside every
/// period go to `past_due`, later ones to `beyond_horizon`.
pub fn project<R: CurrencyRepository + ?Sized>(
    items: &[ScheduleItem],
    periods: &[Period],
    as_of: NaiveDate,
    base_currency: CurrencyCode,
    rates: &R,
) -> ResultSettlement<CashFlowReport> {
    validate_periods(periods)?;

    let mut buckets: Vec<BucketTotals> = periods.iter().map(|p| BucketTotals::new(&p.label)).collect();
    let mut unscheduled = BucketTotals::new("unscheduled");
    let mut past_due = BucketTotals::new("past due");
    let mut beyond_horizon = BucketTotals::new("beyond horizon");

    for item in items.iter().filter(|i| is_outstanding(i)) {
        let remaining = item.remaining_amount();
        let Some(due) = item.due_date else {
            unscheduled.add(item, remaining);
            continue;
        };
        let days = (due - as_of).num_days();
        match periods.iter().position(|p| p.contains(days)) {
            Some(idx) => buckets[idx].add(item, remaining),
            None if days < 0 => past_due.add(item, remaining),
            None => beyond_horizon.add(item, remaining),
        }
    }

    for bucket in buckets
        .iter_mut()
        .chain([&mut unscheduled, &mut past_due, &mut beyond_horizon])
    {
        bucket.inflow.convert(base_currency, as_of, rates);
        bucket.outflow.convert(base_currency, as_of, rates);
    }

    Ok(CashFlowReport {
        as_of,
        base_currency,
        buckets,
        unscheduled,
        past_due,
        beyond_horizon,
    })
}
