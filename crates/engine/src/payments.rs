//! Payments: money actually moved by wire transfer.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    CurrencyCode, FlowDirection, Money, ResultSettlement, SettlementError,
    util::{normalize_optional_text, normalize_required, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDirection {
    /// Received from a client.
    Inbound,
    /// Sent to a supplier.
    Outbound,
}

impl PaymentDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    /// The document flow this payment can settle.
    pub fn settles(self) -> FlowDirection {
        match self {
            Self::Inbound => FlowDirection::Inflow,
            Self::Outbound => FlowDirection::Outflow,
        }
    }
}

impl TryFrom<&str> for PaymentDirection {
    type Error = SettlementError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "inbound" => Ok(Self::Inbound),
            "outbound" => Ok(Self::Outbound),
            other => Err(SettlementError::InvalidId(format!(
                "invalid payment direction: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    PendingApproval,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = SettlementError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending_approval" => Ok(Self::PendingApproval),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(SettlementError::InvalidId(format!(
                "invalid payment status: {other}"
            ))),
        }
    }
}

/// Input of [`Engine::record_payment`](crate::Engine::record_payment).
#[derive(Clone, Debug)]
pub struct NewPayment<'a> {
    pub direction: PaymentDirection,
    pub counterparty: &'a str,
    pub currency: CurrencyCode,
    pub amount: Money,
    pub paid_on: NaiveDate,
    pub reference: Option<&'a str>,
    pub attachment: Option<&'a str>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub direction: PaymentDirection,
    pub counterparty: String,
    pub currency: CurrencyCode,
    /// Wire amount: the money actually moved.
    pub amount: Money,
    pub paid_on: NaiveDate,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub attachment: Option<String>,
    /// Sum of the payment's allocations (payment currency).
    pub allocated: Money,
}

impl Payment {
    pub fn new(input: &NewPayment<'_>) -> ResultSettlement<Self> {
        if !input.amount.is_positive() {
            return Err(SettlementError::InvalidAmount(
                "payment amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            direction: input.direction,
            counterparty: normalize_required(input.counterparty, "counterparty")?,
            currency: input.currency,
            amount: input.amount,
            paid_on: input.paid_on,
            status: PaymentStatus::PendingApproval,
            reference: normalize_optional_text(input.reference),
            attachment: normalize_optional_text(input.attachment),
            allocated: Money::ZERO,
        })
    }

    /// Wire amount not yet allocated; never negative.
    pub fn unallocated(&self) -> Money {
        let left = self.amount - self.allocated;
        if left.is_negative() { Money::ZERO } else { left }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub direction: String,
    pub counterparty: String,
    pub currency: String,
    pub amount_minor: i64,
    pub paid_on: Date,
    pub status: String,
    pub reference: Option<String>,
    pub attachment: Option<String>,
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

impl From<&Payment> for ActiveModel {
    fn from(payment: &Payment) -> Self {
        Self {
            id: ActiveValue::Set(payment.id.to_string()),
            direction: ActiveValue::Set(payment.direction.as_str().to_string()),
            counterparty: ActiveValue::Set(payment.counterparty.clone()),
            currency: ActiveValue::Set(payment.currency.to_string()),
            amount_minor: ActiveValue::Set(payment.amount.minor()),
            paid_on: ActiveValue::Set(payment.paid_on),
            status: ActiveValue::Set(payment.status.as_str().to_string()),
            reference: ActiveValue::Set(payment.reference.clone()),
            attachment: ActiveValue::Set(payment.attachment.clone()),
        }
    }
}

impl TryFrom<Model> for Payment {
    type Error = SettlementError;

    fn try_from(model: Model) -> ResultSettlement<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "payment")?,
            direction: PaymentDirection::try_from(model.direction.as_str())?,
            currency: model.currency.parse()?,
            amount: Money::new(model.amount_minor),
            paid_on: model.paid_on,
            status: PaymentStatus::try_from(model.status.as_str())?,
            counterparty: model.counterparty,
            reference: model.reference,
            attachment: model.attachment,
            allocated: Money::ZERO,
        })
    }
}
