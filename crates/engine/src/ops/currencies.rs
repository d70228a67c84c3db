use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Currency, CurrencyCode, CurrencyDirectory, ExchangeRate, ResultSettlement, SettlementError,
    currency, exchange_rates,
    util::{normalize_optional_text, normalize_required},
};

use super::{Engine, with_tx};

impl Engine {
    /// Registers a currency (active, not base).
    pub async fn add_currency(
        &self,
        code: &str,
        name: &str,
        symbol: Option<&str>,
    ) -> ResultSettlement<CurrencyCode> {
        let code: CurrencyCode = code.parse()?;
        let name = normalize_required(name, "currency name")?;
        with_tx!(self, |db_tx| {
            let exists = currency::Entity::find_by_id(code.to_string())
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(SettlementError::ExistingKey(code.to_string()));
            }
            let currency = Currency::new(code, name, normalize_optional_text(symbol));
            currency::ActiveModel::from(&currency).insert(&db_tx).await?;
            tracing::info!(%code, "currency added");
            Ok(code)
        })
    }

    /// Makes `code` the only base currency.
    pub async fn set_base_currency(&self, code: CurrencyCode) -> ResultSettlement<()> {
        with_tx!(self, |db_tx| {
            // Concurrent base switches queue here.
            currency::Entity::find()
                .lock_exclusive()
                .all(&db_tx)
                .await?;
            let currency = self.require_currency(&db_tx, code).await?;
            if !currency.active {
                return Err(SettlementError::Precondition(format!(
                    "inactive currency {code} cannot be the base currency"
                )));
            }
            currency::Entity::update_many()
                .col_expr(currency::Column::IsBase, Expr::value(false))
                .filter(currency::Column::IsBase.eq(true))
                .exec(&db_tx)
                .await?;
            currency::ActiveModel {
                code: ActiveValue::Set(code.to_string()),
                is_base: ActiveValue::Set(true),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            tracing::info!(%code, "base currency set");
            Ok(())
        })
    }

    /// Activates or deactivates a currency. The base currency stays active.
    pub async fn set_currency_active(
        &self,
        code: CurrencyCode,
        active: bool,
    ) -> ResultSettlement<()> {
        with_tx!(self, |db_tx| {
            let currency = self.require_currency(&db_tx, code).await?;
            if currency.is_base && !active {
                return Err(SettlementError::Precondition(format!(
                    "base currency {code} cannot be deactivated"
                )));
            }
            currency::ActiveModel {
                code: ActiveValue::Set(code.to_string()),
                active: ActiveValue::Set(active),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            tracing::info!(%code, active, "currency activation changed");
            Ok(())
        })
    }

    /// Stores a dated `from -> to` rate. Both currencies must be known.
    pub async fn add_exchange_rate(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        rate: Decimal,
        valid_from: NaiveDate,
        valid_to: Option<NaiveDate>,
    ) -> ResultSettlement<Uuid> {
        let rate = ExchangeRate::new(from, to, rate, valid_from, valid_to)?;
        with_tx!(self, |db_tx| {
            self.require_currency(&db_tx, from).await?;
            self.require_currency(&db_tx, to).await?;
            exchange_rates::ActiveModel::from(&rate)
                .insert(&db_tx)
                .await?;
            tracing::info!(%from, %to, rate = %rate.rate, %valid_from, "exchange rate added");
            Ok(rate.id)
        })
    }

    /// Snapshot of every currency and rate.
    pub async fn currency_directory(&self) -> ResultSettlement<CurrencyDirectory> {
        with_tx!(self, |db_tx| {
            let currencies = currency::Entity::find()
                .order_by_asc(currency::Column::Code)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(Currency::try_from)
                .collect::<ResultSettlement<Vec<_>>>()?;
            let rates = exchange_rates::Entity::find()
                .order_by_asc(exchange_rates::Column::ValidFrom)
                .all(&db_tx)
                .await?
                .into_iter()
                .map(ExchangeRate::try_from)
                .collect::<ResultSettlement<Vec<_>>>()?;
            tracing::debug!(
                currencies = currencies.len(),
                rates = rates.len(),
                "currency directory loaded"
            );
            CurrencyDirectory::new(currencies, rates)
        })
    }
}
