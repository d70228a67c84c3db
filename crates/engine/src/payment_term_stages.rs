//! Persisted stages of a payment term template.

use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{
    CalculationBase, PaymentTermStage, ResultSettlement, SettlementError, util::parse_decimal,
};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "payment_term_stages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub payment_term_id: String,
    pub position: i32,
    pub label: String,
    pub percentage: String,
    pub day_offset: i32,
    pub calculation_base: String,
    pub is_blocking: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::payment_terms::Entity",
        from = "Column::PaymentTermId",
        to = "super::payment_terms::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    PaymentTerms,
}

impl Related<super::payment_terms::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentTerms.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn from_stage(
        payment_term_id: Uuid,
        position: i32,
        stage: &PaymentTermStage,
    ) -> ResultSettlement<Self> {
        let day_offset = i32::try_from(stage.day_offset).map_err(|_| {
            SettlementError::InvalidAmount(format!("day offset too large: {}", stage.day_offset))
        })?;
        Ok(Self {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            payment_term_id: ActiveValue::Set(payment_term_id.to_string()),
            position: ActiveValue::Set(position),
            label: ActiveValue::Set(stage.label.clone()),
            percentage: ActiveValue::Set(stage.percentage.to_string()),
            day_offset: ActiveValue::Set(day_offset),
            calculation_base: ActiveValue::Set(stage.calculation_base.as_str().to_string()),
            is_blocking: ActiveValue::Set(stage.is_blocking),
        })
    }
}

impl TryFrom<Model> for PaymentTermStage {
    type Error = SettlementError;

    fn try_from(model: Model) -> ResultSettlement<Self> {
        Ok(Self {
            percentage: parse_decimal(&model.percentage, "percentage")?,
            day_offset: u32::try_from(model.day_offset).map_err(|_| {
                SettlementError::InvalidAmount(format!(
                    "negative stored day offset: {}",
                    model.day_offset
                ))
            })?,
            calculation_base: CalculationBase::try_from(model.calculation_base.as_str())?,
            is_blocking: model.is_blocking,
            label: model.label,
        })
    }
}
