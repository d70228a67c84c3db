//! Credit applications: part of a credit item offset against another item.
//!
//! Structurally an allocation whose source is a credit schedule item instead
//! of a wire transfer. Both items share the document currency.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Money, ResultSettlement, SettlementError, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditApplication {
    pub id: Uuid,
    pub credit_item_id: Uuid,
    pub target_item_id: Uuid,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

impl CreditApplication {
    pub fn new(credit_item_id: Uuid, target_item_id: Uuid, amount: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            credit_item_id,
            target_item_id,
            amount,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "credit_applications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub credit_item_id: String,
    pub target_item_id: String,
    pub amount_minor: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::schedule_items::Entity",
        from = "Column::CreditItemId",
        to = "super::schedule_items::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    CreditItem,
    #[sea_orm(
        belongs_to = "super::schedule_items::Entity",
        from = "Column::TargetItemId",
        to = "super::schedule_items::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    TargetItem,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CreditApplication> for ActiveModel {
    fn from(application: &CreditApplication) -> Self {
        Self {
            id: ActiveValue::Set(application.id.to_string()),
            credit_item_id: ActiveValue::Set(application.credit_item_id.to_string()),
            target_item_id: ActiveValue::Set(application.target_item_id.to_string()),
            amount_minor: ActiveValue::Set(application.amount.minor()),
            created_at: ActiveValue::Set(application.created_at),
        }
    }
}

impl TryFrom<Model> for CreditApplication {
    type Error = SettlementError;

    fn try_from(model: Model) -> ResultSettlement<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "credit application")?,
            credit_item_id: parse_uuid(&model.credit_item_id, "credit item")?,
            target_item_id: parse_uuid(&model.target_item_id, "schedule item")?,
            amount: Money::new(model.amount_minor),
            created_at: model.created_at,
        })
    }
}
