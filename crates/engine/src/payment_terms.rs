//! Payment term templates.
//!
//! A template is an ordered list of stages, each one a percentage of the
//! document total due `day_offset` days after a calculation base date
//! (order date, shipment date...). The concrete base dates belong to the
//! document and are supplied by the caller at generation time.

use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ResultSettlement, SettlementError,
    util::{normalize_required, validate_percentage},
};

/// The document date a stage is counted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationBase {
    OrderDate,
    ConfirmationDate,
    ShipmentDate,
    DeliveryDate,
    InvoiceDate,
}

impl CalculationBase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrderDate => "order_date",
            Self::ConfirmationDate => "confirmation_date",
            Self::ShipmentDate => "shipment_date",
            Self::DeliveryDate => "delivery_date",
            Self::InvoiceDate => "invoice_date",
        }
    }
}

impl TryFrom<&str> for CalculationBase {
    type Error = SettlementError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "order_date" => Ok(Self::OrderDate),
            "confirmation_date" => Ok(Self::ConfirmationDate),
            "shipment_date" => Ok(Self::ShipmentDate),
            "delivery_date" => Ok(Self::DeliveryDate),
            "invoice_date" => Ok(Self::InvoiceDate),
            other => Err(SettlementError::InvalidId(format!(
                "invalid calculation base: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTermStage {
    pub label: String,
    /// `0 < percentage <= 100`.
    pub percentage: Decimal,
    pub day_offset: u32,
    pub calculation_base: CalculationBase,
    /// Lifecycle-critical stage (typically the deposit): its items block the
    /// downstream workflow until paid or waived.
    pub is_blocking: bool,
}

impl PaymentTermStage {
    pub fn new(
        label: &str,
        percentage: Decimal,
        day_offset: u32,
        calculation_base: CalculationBase,
    ) -> ResultSettlement<Self> {
        let label = normalize_required(label, "stage label")?;
        validate_percentage(percentage, &label)?;
        Ok(Self {
            label,
            percentage,
            day_offset,
            calculation_base,
            is_blocking: false,
        })
    }

    #[must_use]
    pub fn blocking(mut self) -> Self {
        self.is_blocking = true;
        self
    }
}

/// An ordered list of stages.
///
/// Stages are expected to add up to 100% but generation does not enforce it;
/// see [`PaymentTermTemplate::is_balanced`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTermTemplate {
    pub id: Uuid,
    pub name: String,
    pub stages: Vec<PaymentTermStage>,
}

impl PaymentTermTemplate {
    pub fn new(name: &str, stages: Vec<PaymentTermStage>) -> ResultSettlement<Self> {
        let name = normalize_required(name, "payment term name")?;
        if stages.is_empty() {
            return Err(SettlementError::Precondition(format!(
                "payment term '{name}' has no stages"
            )));
        }
        for stage in &stages {
            validate_percentage(stage.percentage, &stage.label)?;
        }
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            stages,
        })
    }

    pub fn total_percentage(&self) -> Decimal {
        self.stages.iter().map(|s| s.percentage).sum()
    }

    /// Returns `true` when the stages add up to exactly 100%.
    pub fn is_balanced(&self) -> bool {
        self.total_percentage() == Decimal::ONE_HUNDRED
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "payment_terms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::payment_term_stages::Entity")]
    Stages,
}

impl Related<super::payment_term_stages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&PaymentTermTemplate> for ActiveModel {
    fn from(template: &PaymentTermTemplate) -> Self {
        Self {
            id: ActiveValue::Set(template.id.to_string()),
            name: ActiveValue::Set(template.name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_percentage_bounds() {
        let base = CalculationBase::OrderDate;
        assert!(PaymentTermStage::new("deposit", Decimal::ZERO, 0, base).is_err());
        assert!(PaymentTermStage::new("deposit", Decimal::new(101, 0), 0, base).is_err());
        assert!(PaymentTermStage::new("deposit", Decimal::new(-5, 0), 0, base).is_err());
        assert!(PaymentTermStage::new("  ", Decimal::new(30, 0), 0, base).is_err());
        assert!(PaymentTermStage::new("deposit", Decimal::ONE_HUNDRED, 0, base).is_ok());
    }

    #[test]
    fn template_requires_stages_but_not_balance() {
        assert!(PaymentTermTemplate::new("empty", Vec::new()).is_err());

        let stages = vec![
            PaymentTermStage::new("deposit", Decimal::new(30, 0), 0, CalculationBase::OrderDate)
                .unwrap()
                .blocking(),
            PaymentTermStage::new("balance", Decimal::new(60, 0), 30, CalculationBase::ShipmentDate)
                .unwrap(),
        ];
        let template = PaymentTermTemplate::new("30/60", stages).unwrap();
        assert!(!template.is_balanced());
        assert_eq!(template.total_percentage(), Decimal::new(90, 0));
        assert!(template.stages[0].is_blocking);
    }

    #[test]
    fn calculation_base_round_trips_through_str() {
        for base in [
            CalculationBase::OrderDate,
            CalculationBase::ConfirmationDate,
            CalculationBase::ShipmentDate,
            CalculationBase::DeliveryDate,
            CalculationBase::InvoiceDate,
        ] {
            assert_eq!(CalculationBase::try_from(base.as_str()).unwrap(), base);
        }
        assert!(CalculationBase::try_from("payday").is_err());
    }
}
