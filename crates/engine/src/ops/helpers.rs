use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, prelude::*,
};
use uuid::Uuid;

use crate::{
    Currency, CurrencyCode, ExchangeRate, ItemStatus, Money, Payable, Payment, ResultSettlement,
    ScheduleItem, SettlementError, allocations, credit_applications, currency, exchange_rates,
    payments, schedule_items,
};

use super::Engine;

/// Row lock mode for the loaders below.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Lock {
    None,
    /// `SELECT ... FOR UPDATE` where the backend supports it.
    Exclusive,
}

fn maybe_lock<S: QuerySelect>(select: S, lock: Lock) -> S {
    match lock {
        Lock::None => select,
        Lock::Exclusive => select.lock_exclusive(),
    }
}

impl Engine {
    pub(super) async fn require_currency(
        &self,
        db: &DatabaseTransaction,
        code: CurrencyCode,
    ) -> ResultSettlement<Currency> {
        let model = currency::Entity::find_by_id(code.to_string())
            .one(db)
            .await?
            .ok_or_else(|| SettlementError::KeyNotFound(format!("currency {code}")))?;
        Currency::try_from(model)
    }

    /// Stored rate `from -> to` valid on `on`; the latest `valid_from` wins.
    pub(super) async fn stored_rate(
        &self,
        db: &DatabaseTransaction,
        from: CurrencyCode,
        to: CurrencyCode,
        on: NaiveDate,
    ) -> ResultSettlement<Option<Decimal>> {
        if from == to {
            return Ok(Some(Decimal::ONE));
        }
        let model = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::FromCurrency.eq(from.to_string()))
            .filter(exchange_rates::Column::ToCurrency.eq(to.to_string()))
            .filter(exchange_rates::Column::ValidFrom.lte(on))
            .filter(
                Condition::any()
                    .add(exchange_rates::Column::ValidTo.is_null())
                    .add(exchange_rates::Column::ValidTo.gte(on)),
            )
            .order_by_desc(exchange_rates::Column::ValidFrom)
            .one(db)
            .await?;
        model
            .map(ExchangeRate::try_from)
            .transpose()
            .map(|rate| rate.map(|r| r.rate))
    }

    /// Loads a payment with its allocated total.
    pub(super) async fn require_payment(
        &self,
        db: &DatabaseTransaction,
        payment_id: Uuid,
        lock: Lock,
    ) -> ResultSettlement<Payment> {
        let model = maybe_lock(payments::Entity::find_by_id(payment_id.to_string()), lock)
            .one(db)
            .await?
            .ok_or_else(|| SettlementError::KeyNotFound(format!("payment {payment_id}")))?;
        let mut payment = Payment::try_from(model)?;
        payment.allocated = allocations::Entity::find()
            .filter(allocations::Column::PaymentId.eq(payment_id.to_string()))
            .all(db)
            .await?
            .iter()
            .map(|a| Money::new(a.amount_minor))
            .sum();
        Ok(payment)
    }

    pub(super) async fn require_item(
        &self,
        db: &DatabaseTransaction,
        item_id: Uuid,
        lock: Lock,
    ) -> ResultSettlement<ScheduleItem> {
        let model = maybe_lock(schedule_items::Entity::find_by_id(item_id.to_string()), lock)
            .one(db)
            .await?
            .ok_or_else(|| SettlementError::KeyNotFound(format!("schedule item {item_id}")))?;
        let mut items = self.hydrate_items(db, vec![model]).await?;
        items
            .pop()
            .ok_or_else(|| SettlementError::KeyNotFound(format!("schedule item {item_id}")))
    }

    /// Every item of a document, ordered by sort order.
    pub(super) async fn items_of(
        &self,
        db: &DatabaseTransaction,
        payable: Payable,
        lock: Lock,
    ) -> ResultSettlement<Vec<ScheduleItem>> {
        let select = schedule_items::Entity::find()
            .filter(schedule_items::Column::PayableType.eq(payable.kind_str()))
            .filter(schedule_items::Column::PayableId.eq(payable.id().to_string()))
            .order_by_asc(schedule_items::Column::SortOrder);
        let models = maybe_lock(select, lock).all(db).await?;
        self.hydrate_items(db, models).await
    }

    /// Every item not yet PAID or WAIVED, across documents.
    pub(super) async fn unresolved_items(
        &self,
        db: &DatabaseTransaction,
    ) -> ResultSettlement<Vec<ScheduleItem>> {
        let models = schedule_items::Entity::find()
            .filter(
                schedule_items::Column::Status
                    .is_not_in([ItemStatus::Paid.as_str(), ItemStatus::Waived.as_str()]),
            )
            .order_by_asc(schedule_items::Column::DueDate)
            .order_by_asc(schedule_items::Column::SortOrder)
            .all(db)
            .await?;
        self.hydrate_items(db, models).await
    }

    /// Converts models and fills the amounts settled through allocations
    /// and credit applications.
    pub(super) async fn hydrate_items(
        &self,
        db: &DatabaseTransaction,
        models: Vec<schedule_items::Model>,
    ) -> ResultSettlement<Vec<ScheduleItem>> {
        if models.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();

        let mut paid: HashMap<String, Money> = HashMap::new();
        for allocation in allocations::Entity::find()
            .filter(allocations::Column::ScheduleItemId.is_in(ids.clone()))
            .all(db)
            .await?
        {
            *paid.entry(allocation.schedule_item_id).or_default() +=
                Money::new(allocation.document_amount_minor);
        }

        let mut credited: HashMap<String, Money> = HashMap::new();
        let mut consumed: HashMap<String, Money> = HashMap::new();
        for application in credit_applications::Entity::find()
            .filter(
                Condition::any()
                    .add(credit_applications::Column::TargetItemId.is_in(ids.clone()))
                    .add(credit_applications::Column::CreditItemId.is_in(ids)),
            )
            .all(db)
            .await?
        {
            let amount = Money::new(application.amount_minor);
            *credited.entry(application.target_item_id).or_default() += amount;
            *consumed.entry(application.credit_item_id).or_default() += amount;
        }

        models
            .into_iter()
            .map(|model| {
                let id = model.id.clone();
                let mut item = ScheduleItem::try_from(model)?;
                item.paid_amount = paid.get(&id).copied().unwrap_or_default();
                item.credited_amount = credited.get(&id).copied().unwrap_or_default();
                item.consumed_amount = consumed.get(&id).copied().unwrap_or_default();
                Ok(item)
            })
            .collect()
    }

    pub(super) async fn store_status(
        &self,
        db: &DatabaseTransaction,
        item: &ScheduleItem,
    ) -> ResultSettlement<()> {
        let model = schedule_items::ActiveModel {
            id: ActiveValue::Set(item.id.to_string()),
            status: ActiveValue::Set(item.status.as_str().to_string()),
            ..Default::default()
        };
        model.update(db).await?;
        Ok(())
    }

    /// Next free sort order of a document.
    pub(super) fn next_sort_order(items: &[ScheduleItem]) -> i32 {
        items.iter().map(|i| i.sort_order).max().unwrap_or(0) + 1
    }
}
