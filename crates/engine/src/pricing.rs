//! Unit price resolution for invoice lines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Money, ResultSettlement, SettlementError};

/// The client-specific custom price when set and non-zero, else the
/// proforma price.
pub fn effective_unit_price(pi_price: Money, custom_price: Option<Money>) -> Money {
    custom_price
        .filter(|price| !price.is_zero())
        .unwrap_or(pi_price)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub pi_unit_price: Money,
    pub custom_unit_price: Option<Money>,
}

impl LineItem {
    pub fn unit_price(&self) -> Money {
        effective_unit_price(self.pi_unit_price, self.custom_unit_price)
    }

    /// `unit price × quantity`, rounded to minor units.
    pub fn total(&self) -> ResultSettlement<Money> {
        if self.quantity.is_sign_negative() {
            return Err(SettlementError::InvalidAmount(format!(
                "quantity of '{}' must not be negative",
                self.description
            )));
        }
        self.unit_price().convert(self.quantity)
    }
}
