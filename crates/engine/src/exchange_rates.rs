//! Dated pairwise conversion rates.
//!
//! A rate converts **from** one currency **to** another:
//! `amount_to = amount_from × rate`. Lookups are by direct pair only; the
//! engine never triangulates through a third currency.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CurrencyCode, ResultSettlement, SettlementError, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub id: Uuid,
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub rate: Decimal,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
}

impl ExchangeRate {
    pub fn new(
        from: CurrencyCode,
        to: CurrencyCode,
        rate: Decimal,
        valid_from: NaiveDate,
        valid_to: Option<NaiveDate>,
    ) -> ResultSettlement<Self> {
        if from == to {
            return Err(SettlementError::CurrencyMismatch(format!(
                "rate needs two distinct currencies, got {from} twice"
            )));
        }
        if rate <= Decimal::ZERO {
            return Err(SettlementError::InvalidAmount(format!(
                "exchange rate must be > 0, got {rate}"
            )));
        }
        if let Some(until) = valid_to
            && until < valid_from
        {
            return Err(SettlementError::InvalidAmount(format!(
                "rate validity ends ({until}) before it starts ({valid_from})"
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            from,
            to,
            rate,
            valid_from,
            valid_to,
        })
    }

    /// Returns `true` when the rate can be used for a conversion on `date`.
    #[must_use]
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && self.valid_to.is_none_or(|until| date <= until)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "exchange_rates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: String,
    pub valid_from: Date,
    pub valid_to: Option<Date>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::currency::Entity",
        from = "Column::FromCurrency",
        to = "super::currency::Column::Code",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    FromCurrency,
    #[sea_orm(
        belongs_to = "super::currency::Entity",
        from = "Column::ToCurrency",
        to = "super::currency::Column::Code",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    ToCurrency,
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ExchangeRate> for ActiveModel {
    fn from(rate: &ExchangeRate) -> Self {
        Self {
            id: ActiveValue::Set(rate.id.to_string()),
            from_currency: ActiveValue::Set(rate.from.to_string()),
            to_currency: ActiveValue::Set(rate.to.to_string()),
            rate: ActiveValue::Set(rate.rate.to_string()),
            valid_from: ActiveValue::Set(rate.valid_from),
            valid_to: ActiveValue::Set(rate.valid_to),
        }
    }
}

impl TryFrom<Model> for ExchangeRate {
    type Error = SettlementError;

    fn try_from(model: Model) -> ResultSettlement<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "exchange rate")?,
            from: model.from_currency.parse()?,
            to: model.to_currency.parse()?,
            rate: Decimal::from_str(&model.rate).map_err(|_| {
                SettlementError::InvalidAmount(format!("invalid stored rate: {}", model.rate))
            })?,
            valid_from: model.valid_from,
            valid_to: model.valid_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> CurrencyCode {
        raw.parse().unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn new_rejects_invalid_rates() {
        let from = day(2026, 1, 1);
        assert!(ExchangeRate::new(code("USD"), code("USD"), Decimal::ONE, from, None).is_err());
        assert!(ExchangeRate::new(code("USD"), code("EUR"), Decimal::ZERO, from, None).is_err());
        assert!(
            ExchangeRate::new(code("USD"), code("EUR"), Decimal::ONE, from, Some(day(2025, 12, 31)))
                .is_err()
        );
    }

    #[test]
    fn validity_range_is_inclusive() {
        let rate = ExchangeRate::new(
            code("USD"),
            code("EUR"),
            Decimal::new(92, 2),
            day(2026, 1, 1),
            Some(day(2026, 1, 31)),
        )
        .unwrap();
        assert!(!rate.is_valid_on(day(2025, 12, 31)));
        assert!(rate.is_valid_on(day(2026, 1, 1)));
        assert!(rate.is_valid_on(day(2026, 1, 31)));
        assert!(!rate.is_valid_on(day(2026, 2, 1)));
    }
}
