use std::collections::HashMap;

use chrono::NaiveDate;
use sea_orm::{ActiveValue, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    CalculationBase, Document, ItemStatus, Money, Payable, ResultSettlement, ScheduleItem,
    SettlementError, derive_status, due_date_for, plan_regeneration, plan_schedule, schedule_items,
    util::normalize_required,
};

use super::{Engine, helpers::Lock, with_tx};

impl Engine {
    /// Generates the schedule of a document from its payment term.
    ///
    /// Refused when the document has no payment term, or when it already has
    /// schedule items, settled or not (use [`Engine::regenerate_schedule`]
    /// then). Returns the number of items created.
    pub async fn generate_schedule(&self, document: &Document) -> ResultSettlement<usize> {
        let as_of = Self::today();
        with_tx!(self, |db_tx| {
            self.require_currency(&db_tx, document.currency).await?;
            let existing = self.items_of(&db_tx, document.payable, Lock::Exclusive).await?;
            if existing.iter().any(|item| !item.is_credit) {
                return Err(SettlementError::Precondition(format!(
                    "{} already has a schedule, regenerate it instead",
                    document.payable
                )));
            }

            let first = Self::next_sort_order(&existing);
            let planned = plan_schedule(document, first, as_of, self.due_soon_days)?;
            for item in &planned {
                schedule_items::ActiveModel::try_from(item)?
                    .insert(&db_tx)
                    .await?;
            }
            tracing::info!(
                payable = %document.payable,
                items = planned.len(),
                total = %document.total,
                "schedule generated"
            );
            Ok(planned.len())
        })
    }

    /// Rebuilds the untouched part of a schedule.
    ///
    /// Items carrying allocations or credit applications, waived items and
    /// credit items are preserved as they are. Every other item is deleted
    /// and recreated from the current template and total, after the
    /// preserved ones; stages a preserved item already covers are not
    /// planned again. Returns the number of items created.
    pub async fn regenerate_schedule(&self, document: &Document) -> ResultSettlement<usize> {
        let as_of = Self::today();
        with_tx!(self, |db_tx| {
            if document.payment_term.is_none() {
                return Err(SettlementError::Precondition(format!(
                    "no payment term assigned to {}",
                    document.payable
                )));
            }
            self.require_currency(&db_tx, document.currency).await?;
            let existing = self.items_of(&db_tx, document.payable, Lock::Exclusive).await?;
            if existing.is_empty() {
                return Err(SettlementError::Precondition(format!(
                    "{} has no schedule to regenerate",
                    document.payable
                )));
            }

            let (preserved, replaced): (Vec<_>, Vec<_>) = existing.into_iter().partition(|item| {
                item.has_settlements() || item.status == ItemStatus::Waived || item.is_credit
            });
            if !replaced.is_empty() {
                schedule_items::Entity::delete_many()
                    .filter(
                        schedule_items::Column::Id
                            .is_in(replaced.iter().map(|item| item.id.to_string())),
                    )
                    .exec(&db_tx)
                    .await?;
            }

            let planned = plan_regeneration(document, &preserved, as_of, self.due_soon_days)?;
            for item in &planned {
                schedule_items::ActiveModel::try_from(item)?
                    .insert(&db_tx)
                    .await?;
            }
            tracing::info!(
                payable = %document.payable,
                preserved = preserved.len(),
                deleted = replaced.len(),
                created = planned.len(),
                "schedule regenerated"
            );
            Ok(planned.len())
        })
    }

    /// Fills the missing due dates of a document once base dates are known.
    ///
    /// Returns the number of items that got a due date.
    pub async fn resolve_due_dates(
        &self,
        payable: Payable,
        base_dates: &HashMap<CalculationBase, NaiveDate>,
    ) -> ResultSettlement<usize> {
        let as_of = Self::today();
        with_tx!(self, |db_tx| {
            let items = self.items_of(&db_tx, payable, Lock::Exclusive).await?;
            let mut resolved = 0;
            for mut item in items.into_iter().filter(|item| item.due_date.is_none()) {
                let (Some(base), Some(offset)) = (item.calculation_base, item.day_offset) else {
                    continue;
                };
                let Some(due_date) = due_date_for(base, offset, base_dates) else {
                    continue;
                };
                item.due_date = Some(due_date);
                item.status = derive_status(&item, as_of, self.due_soon_days);
                schedule_items::ActiveModel {
                    id: ActiveValue::Set(item.id.to_string()),
                    due_date: ActiveValue::Set(Some(due_date)),
                    status: ActiveValue::Set(item.status.as_str().to_string()),
                    ..Default::default()
                }
                .update(&db_tx)
                .await?;
                resolved += 1;
            }
            tracing::info!(%payable, resolved, "due dates resolved");
            Ok(resolved)
        })
    }

    /// Adds a credit item (funds owed back to the paying party) to a
    /// document, in the document currency.
    pub async fn add_credit_item(
        &self,
        payable: Payable,
        label: &str,
        amount: Money,
    ) -> ResultSettlement<Uuid> {
        let label = normalize_required(label, "credit label")?;
        with_tx!(self, |db_tx| {
            let items = self.items_of(&db_tx, payable, Lock::Exclusive).await?;
            let currency = items
                .iter()
                .find(|item| !item.is_credit)
                .map(|item| item.currency)
                .ok_or_else(|| {
                    SettlementError::Precondition(format!("{payable} has no schedule"))
                })?;
            let credit = ScheduleItem::credit(
                payable,
                currency,
                label,
                amount,
                Self::next_sort_order(&items),
            )?;
            schedule_items::ActiveModel::try_from(&credit)?
                .insert(&db_tx)
                .await?;
            tracing::info!(%payable, id = %credit.id, %amount, "credit item added");
            Ok(credit.id)
        })
    }

    /// Items of a document with their settled amounts, by sort order.
    pub async fn schedule(&self, payable: Payable) -> ResultSettlement<Vec<ScheduleItem>> {
        with_tx!(self, |db_tx| {
            let items = self.items_of(&db_tx, payable, Lock::None).await?;
            tracing::debug!(%payable, items = items.len(), "schedule loaded");
            Ok(items)
        })
    }

    pub async fn schedule_item(&self, item_id: Uuid) -> ResultSettlement<ScheduleItem> {
        with_tx!(self, |db_tx| {
            self.require_item(&db_tx, item_id, Lock::None).await
        })
    }
}
