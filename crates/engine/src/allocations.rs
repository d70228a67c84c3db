//! Allocations: a slice of a payment applied to one schedule item.
//!
//! `amount` is in the payment currency; `document_amount` is the same money
//! in the item (document) currency, fixed at allocation time together with
//! the rate used, so later rate changes never move settled balances.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Money, ResultSettlement, SettlementError,
    util::{parse_decimal, parse_uuid},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub schedule_item_id: Uuid,
    pub amount: Money,
    /// `None` when payment and document share the currency.
    pub exchange_rate: Option<Decimal>,
    pub document_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl Allocation {
    pub fn new(
        payment_id: Uuid,
        schedule_item_id: Uuid,
        amount: Money,
        exchange_rate: Option<Decimal>,
        document_amount: Money,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            schedule_item_id,
            amount,
            exchange_rate,
            document_amount,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub payment_id: String,
    pub schedule_item_id: String,
    pub amount_minor: i64,
    pub exchange_rate: Option<String>,
    pub document_amount_minor: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::payments::Entity",
        from = "Column::PaymentId",
        to = "super::payments::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Payments,
    #[sea_orm(
        belongs_to = "super::schedule_items::Entity",
        from = "Column::ScheduleItemId",
        to = "super::schedule_items::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    ScheduleItems,
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::schedule_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduleItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Allocation> for ActiveModel {
    fn from(allocation: &Allocation) -> Self {
        Self {
            id: ActiveValue::Set(allocation.id.to_string()),
            payment_id: ActiveValue::Set(allocation.payment_id.to_string()),
            schedule_item_id: ActiveValue::Set(allocation.schedule_item_id.to_string()),
            amount_minor: ActiveValue::Set(allocation.amount.minor()),
            exchange_rate: ActiveValue::Set(allocation.exchange_rate.map(|r| r.to_string())),
            document_amount_minor: ActiveValue::Set(allocation.document_amount.minor()),
            created_at: ActiveValue::Set(allocation.created_at),
        }
    }
}

impl TryFrom<Model> for Allocation {
    type Error = SettlementError;

    fn try_from(model: Model) -> ResultSettlement<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "allocation")?,
            payment_id: parse_uuid(&model.payment_id, "payment")?,
            schedule_item_id: parse_uuid(&model.schedule_item_id, "schedule item")?,
            amount: Money::new(model.amount_minor),
            exchange_rate: model
                .exchange_rate
                .as_deref()
                .map(|r| parse_decimal(r, "exchange rate"))
                .transpose()?,
            document_amount: Money::new(model.document_amount_minor),
            created_at: model.created_at,
        })
    }
}
