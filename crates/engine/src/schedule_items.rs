//! Schedule items: one expected payment milestone of a document.
//!
//! Only the definition of an item is stored. How much of it has been settled
//! is always derived from the allocations and credit applications pointing
//! at it (see [`ScheduleItem::remaining_amount`]).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    CalculationBase, CurrencyCode, Money, Payable, ResultSettlement, SettlementError,
    util::{parse_decimal, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Due,
    Overdue,
    Paid,
    Waived,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Due => "due",
            Self::Overdue => "overdue",
            Self::Paid => "paid",
            Self::Waived => "waived",
        }
    }

    /// Terminal states: nothing more can be applied.
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Paid | Self::Waived)
    }
}

impl TryFrom<&str> for ItemStatus {
    type Error = SettlementError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "due" => Ok(Self::Due),
            "overdue" => Ok(Self::Overdue),
            "paid" => Ok(Self::Paid),
            "waived" => Ok(Self::Waived),
            other => Err(SettlementError::InvalidId(format!(
                "invalid schedule item status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub id: Uuid,
    pub payable: Payable,
    pub label: String,
    /// `None` for items not generated from a stage (credits).
    pub percentage: Option<Decimal>,
    /// In document currency.
    pub amount: Money,
    pub currency: CurrencyCode,
    pub due_date: Option<NaiveDate>,
    pub calculation_base: Option<CalculationBase>,
    pub day_offset: Option<u32>,
    pub is_blocking: bool,
    pub is_credit: bool,
    pub status: ItemStatus,
    pub sort_order: i32,
    pub waived_reason: Option<String>,
    /// Sum of payment allocations landed on this item (document currency).
    pub paid_amount: Money,
    /// Sum of credit applications landed on this item.
    pub credited_amount: Money,
    /// Credit items only: sum of credit applications drawn from this item.
    pub consumed_amount: Money,
}

impl ScheduleItem {
    /// A credit (offset) item: funds owed back to the paying party.
    pub fn credit(
        payable: Payable,
        currency: CurrencyCode,
        label: String,
        amount: Money,
        sort_order: i32,
    ) -> ResultSettlement<Self> {
        if !amount.is_positive() {
            return Err(SettlementError::InvalidAmount(
                "credit amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            payable,
            label,
            percentage: None,
            amount,
            currency,
            due_date: None,
            calculation_base: None,
            day_offset: None,
            is_blocking: false,
            is_credit: true,
            status: ItemStatus::Pending,
            sort_order,
            waived_reason: None,
            paid_amount: Money::ZERO,
            credited_amount: Money::ZERO,
            consumed_amount: Money::ZERO,
        })
    }

    /// Money applied against the item, whatever its source.
    pub fn settled_amount(&self) -> Money {
        if self.is_credit {
            self.consumed_amount
        } else {
            self.paid_amount + self.credited_amount
        }
    }

    /// `amount - settled`, floored at zero.
    pub fn remaining_amount(&self) -> Money {
        let remaining = self.amount - self.settled_amount();
        if remaining.is_negative() {
            Money::ZERO
        } else {
            remaining
        }
    }

    /// Any money (allocation or credit, in either direction) touched it.
    pub fn has_settlements(&self) -> bool {
        !self.paid_amount.is_zero() || !self.credited_amount.is_zero() || !self.consumed_amount.is_zero()
    }

    /// Waived, or nothing left to settle.
    pub fn is_resolved(&self) -> bool {
        self.status == ItemStatus::Waived || self.remaining_amount().is_zero()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "schedule_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub payable_type: String,
    pub payable_id: String,
    pub label: String,
    pub percentage: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub due_date: Option<Date>,
    pub calculation_base: Option<String>,
    pub day_offset: Option<i32>,
    pub is_blocking: bool,
    pub is_credit: bool,
    pub status: String,
    pub sort_order: i32,
    pub waived_reason: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::allocations::Entity")]
    Allocations,
}

impl Related<super::allocations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<&ScheduleItem> for ActiveModel {
    type Error = SettlementError;

    fn try_from(item: &ScheduleItem) -> ResultSettlement<Self> {
        let day_offset = item
            .day_offset
            .map(|offset| {
                i32::try_from(offset).map_err(|_| {
                    SettlementError::InvalidAmount(format!("day offset too large: {offset}"))
                })
            })
            .transpose()?;
        Ok(Self {
            id: ActiveValue::Set(item.id.to_string()),
            payable_type: ActiveValue::Set(item.payable.kind_str().to_string()),
            payable_id: ActiveValue::Set(item.payable.id().to_string()),
            label: ActiveValue::Set(item.label.clone()),
            percentage: ActiveValue::Set(item.percentage.map(|p| p.to_string())),
            amount_minor: ActiveValue::Set(item.amount.minor()),
            currency: ActiveValue::Set(item.currency.to_string()),
            due_date: ActiveValue::Set(item.due_date),
            calculation_base: ActiveValue::Set(
                item.calculation_base.map(|b| b.as_str().to_string()),
            ),
            day_offset: ActiveValue::Set(day_offset),
            is_blocking: ActiveValue::Set(item.is_blocking),
            is_credit: ActiveValue::Set(item.is_credit),
            status: ActiveValue::Set(item.status.as_str().to_string()),
            sort_order: ActiveValue::Set(item.sort_order),
            waived_reason: ActiveValue::Set(item.waived_reason.clone()),
        })
    }
}

/// Builds the item definition; settled amounts start at zero and are filled
/// from allocations by the engine.
impl TryFrom<Model> for ScheduleItem {
    type Error = SettlementError;

    fn try_from(model: Model) -> ResultSettlement<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "schedule item")?,
            payable: Payable::from_parts(&model.payable_type, &model.payable_id)?,
            percentage: model
                .percentage
                .as_deref()
                .map(|p| parse_decimal(p, "percentage"))
                .transpose()?,
            amount: Money::new(model.amount_minor),
            currency: model.currency.parse()?,
            due_date: model.due_date,
            calculation_base: model
                .calculation_base
                .as_deref()
                .map(CalculationBase::try_from)
                .transpose()?,
            day_offset: model
                .day_offset
                .map(|offset| {
                    u32::try_from(offset).map_err(|_| {
                        SettlementError::InvalidAmount(format!(
                            "negative stored day offset: {offset}"
                        ))
                    })
                })
                .transpose()?,
            is_blocking: model.is_blocking,
            is_credit: model.is_credit,
            status: ItemStatus::try_from(model.status.as_str())?,
            sort_order: model.sort_order,
            waived_reason: model.waived_reason,
            label: model.label,
            paid_amount: Money::ZERO,
            credited_amount: Money::ZERO,
            consumed_amount: Money::ZERO,
        })
    }
}
