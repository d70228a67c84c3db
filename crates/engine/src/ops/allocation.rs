use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, DatabaseTransaction, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Allocation, CreditApplication, ItemStatus, Money, Payment, ResultSettlement, ScheduleItem,
    SettlementError, allocations, check_allocation, check_credit, check_waive,
    credit_applications, derive_status, plan_waterfall, schedule_items, to_document_amount,
    util::normalize_optional_text,
};

use super::{Engine, helpers::Lock, with_tx};

impl Engine {
    /// Applies `amount` (payment currency) of a payment to a schedule item.
    ///
    /// When the currencies differ the amount is converted with
    /// `exchange_rate`, or else with the stored rate valid on the payment
    /// date; without either the allocation fails. The converted amount must
    /// fit the item's remaining balance and `amount` the payment's
    /// unallocated balance. Payment and item rows are locked for the whole
    /// operation.
    pub async fn allocate(
        &self,
        payment_id: Uuid,
        item_id: Uuid,
        amount: Money,
        exchange_rate: Option<Decimal>,
    ) -> ResultSettlement<Allocation> {
        let as_of = Self::today();
        with_tx!(self, |db_tx| {
            let mut payment = self
                .require_payment(&db_tx, payment_id, Lock::Exclusive)
                .await?;
            let mut item = self.require_item(&db_tx, item_id, Lock::Exclusive).await?;
            self.settle(&db_tx, &mut payment, &mut item, amount, exchange_rate, as_of)
                .await
        })
    }

    /// Spreads the payment's unallocated balance over `item_ids` in order,
    /// each item taking up to its remaining balance. Waived items are
    /// skipped. All items must be in the payment currency.
    pub async fn allocate_in_order(
        &self,
        payment_id: Uuid,
        item_ids: &[Uuid],
    ) -> ResultSettlement<Vec<Allocation>> {
        let as_of = Self::today();
        with_tx!(self, |db_tx| {
            let mut payment = self
                .require_payment(&db_tx, payment_id, Lock::Exclusive)
                .await?;
            if payment.unallocated().is_zero() {
                return Err(SettlementError::Precondition(format!(
                    "payment {payment_id} is fully allocated"
                )));
            }

            let mut items = Vec::with_capacity(item_ids.len());
            for (idx, item_id) in item_ids.iter().enumerate() {
                if item_ids[..idx].contains(item_id) {
                    return Err(SettlementError::Precondition(format!(
                        "schedule item {item_id} listed twice"
                    )));
                }
                let item = self.require_item(&db_tx, *item_id, Lock::Exclusive).await?;
                if item.currency != payment.currency {
                    return Err(SettlementError::CurrencyMismatch(format!(
                        "item '{}' is in {}, payment {payment_id} in {}",
                        item.label, item.currency, payment.currency
                    )));
                }
                if item.is_credit {
                    return Err(SettlementError::Precondition(format!(
                        "item '{}' is a credit",
                        item.label
                    )));
                }
                items.push(item);
            }

            let remaining: Vec<Money> = items
                .iter()
                .map(|item| {
                    if item.status == ItemStatus::Waived {
                        Money::ZERO
                    } else {
                        item.remaining_amount()
                    }
                })
                .collect();
            let plan = plan_waterfall(payment.unallocated(), &remaining);

            let mut created = Vec::new();
            for (mut item, amount) in items.into_iter().zip(plan) {
                if !amount.is_positive() {
                    continue;
                }
                let allocation = self
                    .settle(&db_tx, &mut payment, &mut item, amount, None, as_of)
                    .await?;
                created.push(allocation);
            }
            tracing::info!(
                %payment_id,
                allocations = created.len(),
                unallocated = %payment.unallocated(),
                "payment allocated in order"
            );
            Ok(created)
        })
    }

    /// Offsets `amount` of a credit item against another item of the same
    /// currency and flow.
    pub async fn apply_credit(
        &self,
        credit_item_id: Uuid,
        target_item_id: Uuid,
        amount: Money,
    ) -> ResultSettlement<CreditApplication> {
        let as_of = Self::today();
        with_tx!(self, |db_tx| {
            let mut credit = self
                .require_item(&db_tx, credit_item_id, Lock::Exclusive)
                .await?;
            let mut target = self
                .require_item(&db_tx, target_item_id, Lock::Exclusive)
                .await?;
            check_credit(&credit, &target, amount)?;

            let application = CreditApplication::new(credit.id, target.id, amount);
            credit_applications::ActiveModel::from(&application)
                .insert(&db_tx)
                .await?;
            credit.consumed_amount += amount;
            target.credited_amount += amount;
            self.restatus(&db_tx, &mut credit, as_of).await?;
            self.restatus(&db_tx, &mut target, as_of).await?;
            tracing::info!(
                credit = %credit.id,
                target = %target.id,
                %amount,
                "credit applied"
            );
            Ok(application)
        })
    }

    /// Marks an unresolved item WAIVED and no longer blocking. Existing
    /// allocations stay in place.
    pub async fn waive(&self, item_id: Uuid, reason: Option<&str>) -> ResultSettlement<()> {
        with_tx!(self, |db_tx| {
            let item = self.require_item(&db_tx, item_id, Lock::Exclusive).await?;
            check_waive(&item)?;
            schedule_items::ActiveModel {
                id: ActiveValue::Set(item.id.to_string()),
                status: ActiveValue::Set(ItemStatus::Waived.as_str().to_string()),
                is_blocking: ActiveValue::Set(false),
                waived_reason: ActiveValue::Set(normalize_optional_text(reason)),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            tracing::info!(%item_id, remaining = %item.remaining_amount(), "schedule item waived");
            Ok(())
        })
    }

    /// Recomputes the stored status of every unresolved item as of `as_of`.
    /// Returns how many changed.
    pub async fn refresh_statuses(&self, as_of: NaiveDate) -> ResultSettlement<usize> {
        with_tx!(self, |db_tx| {
            let items = self.unresolved_items(&db_tx).await?;
            let mut changed = 0;
            for mut item in items {
                if self.restatus(&db_tx, &mut item, as_of).await? {
                    changed += 1;
                }
            }
            tracing::info!(%as_of, changed, "schedule statuses refreshed");
            Ok(changed)
        })
    }

    async fn settle(
        &self,
        db: &DatabaseTransaction,
        payment: &mut Payment,
        item: &mut ScheduleItem,
        amount: Money,
        exchange_rate: Option<Decimal>,
        as_of: NaiveDate,
    ) -> ResultSettlement<Allocation> {
        let rate = match exchange_rate {
            _ if payment.currency == item.currency => None,
            Some(rate) => Some(rate),
            None => {
                self.stored_rate(db, payment.currency, item.currency, payment.paid_on)
                    .await?
            }
        };
        let (rate, document_amount) =
            to_document_amount(amount, payment.currency, item.currency, rate)?;
        check_allocation(payment, item, amount, document_amount)?;

        let allocation = Allocation::new(payment.id, item.id, amount, rate, document_amount);
        allocations::ActiveModel::from(&allocation)
            .insert(db)
            .await?;
        payment.allocated += amount;
        item.paid_amount += document_amount;
        self.restatus(db, item, as_of).await?;
        tracing::info!(
            payment = %payment.id,
            item = %item.id,
            %amount,
            %document_amount,
            remaining = %item.remaining_amount(),
            "allocation recorded"
        );
        Ok(allocation)
    }

    /// Derives and stores the item status; returns whether it changed.
    async fn restatus(
        &self,
        db: &DatabaseTransaction,
        item: &mut ScheduleItem,
        as_of: NaiveDate,
    ) -> ResultSettlement<bool> {
        let status = derive_status(item, as_of, self.due_soon_days);
        if status == item.status {
            return Ok(false);
        }
        tracing::debug!(item = %item.id, from = item.status.as_str(), to = status.as_str(), "status change");
        item.status = status;
        self.store_status(db, item).await?;
        Ok(true)
    }
}
