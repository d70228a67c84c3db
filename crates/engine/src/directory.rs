//! Currency and exchange-rate lookups.
//!
//! [`CurrencyRepository`] is the interface the settlement core consumes;
//! [`CurrencyDirectory`] is the in-memory implementation, either built by
//! hand (tests, callers with their own storage) or loaded from the engine
//! tables via [`Engine::currency_directory`](crate::Engine::currency_directory).

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{Currency, CurrencyCode, ExchangeRate, Money, ResultSettlement, SettlementError};

/// Read-only currency reference data.
pub trait CurrencyRepository {
    fn find_by_code(&self, code: CurrencyCode) -> Option<Currency>;

    fn base_currency(&self) -> Option<Currency>;

    /// Direct rate `from -> to` valid on `on`, if any.
    fn rate(&self, from: CurrencyCode, to: CurrencyCode, on: NaiveDate) -> Option<Decimal>;

    /// Converts a major-unit amount. Same-currency conversion is 1:1.
    fn convert(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
        major: Decimal,
        on: NaiveDate,
    ) -> Option<Decimal> {
        if from == to {
            return Some(major);
        }
        self.rate(from, to, on)
            .and_then(|rate| major.checked_mul(rate))
    }

    /// Converts a [`Money`] amount, rounding to minor units.
    fn convert_money(
        &self,
        amount: Money,
        from: CurrencyCode,
        to: CurrencyCode,
        on: NaiveDate,
    ) -> Option<Money> {
        if from == to {
            return Some(amount);
        }
        self.rate(from, to, on)
            .and_then(|rate| amount.convert(rate).ok())
    }
}

/// In-memory snapshot of currencies and rates.
#[derive(Clone, Debug, Default)]
pub struct CurrencyDirectory {
    currencies: HashMap<CurrencyCode, Currency>,
    rates: Vec<ExchangeRate>,
}

impl CurrencyDirectory {
    /// Builds a directory, refusing more than one base currency.
    pub fn new(currencies: Vec<Currency>, rates: Vec<ExchangeRate>) -> ResultSettlement<Self> {
        let bases = currencies.iter().filter(|c| c.is_base).count();
        if bases > 1 {
            return Err(SettlementError::Precondition(format!(
                "{bases} base currencies configured, at most one allowed"
            )));
        }
        Ok(Self {
            currencies: currencies.into_iter().map(|c| (c.code, c)).collect(),
            rates,
        })
    }

    pub fn currencies(&self) -> impl Iterator<Item = &Currency> {
        self.currencies.values()
    }

    pub fn rates(&self) -> &[ExchangeRate] {
        &self.rates
    }
}

impl CurrencyRepository for CurrencyDirectory {
    fn find_by_code(&self, code: CurrencyCode) -> Option<Currency> {
        self.currencies.get(&code).cloned()
    }

    fn base_currency(&self) -> Option<Currency> {
        self.currencies.values().find(|c| c.is_base).cloned()
    }

    fn rate(&self, from: CurrencyCode, to: CurrencyCode, on: NaiveDate) -> Option<Decimal> {
        if from == to {
            return Some(Decimal::ONE);
        }
        // Overlapping ranges: the most recently started one wins.
        self.rates
            .iter()
            .filter(|r| r.from == from && r.to == to && r.is_valid_on(on))
            .max_by_key(|r| r.valid_from)
            .map(|r| r.rate)
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

    fn directory() -> CurrencyDirectory {
        let mut usd = Currency::new(code("USD"), "US Dollar".to_string(), Some("$".to_string()));
        usd.is_base = true;
        let eur = Currency::new(code("EUR"), "Euro".to_string(), Some("€".to_string()));
        let rates = vec![
            ExchangeRate::new(code("EUR"), code("USD"), Decimal::new(108, 2), day(2026, 1, 1), None)
                .unwrap(),
            ExchangeRate::new(
                code("EUR"),
                code("USD"),
                Decimal::new(110, 2),
                day(2026, 3, 1),
                Some(day(2026, 3, 31)),
            )
            .unwrap(),
        ];
        CurrencyDirectory::new(vec![usd, eur], rates).unwrap()
    }

    #[test]
    fn finds_base_currency() {
        let dir = directory();
        assert_eq!(dir.base_currency().unwrap().code, code("USD"));
        assert_eq!(dir.find_by_code(code("EUR")).unwrap().name, "Euro");
        assert!(dir.find_by_code(code("CNY")).is_none());
    }

    #[test]
    fn rejects_two_base_currencies() {
        let mut a = Currency::new(code("USD"), "US Dollar".to_string(), None);
        a.is_base = true;
        let mut b = Currency::new(code("EUR"), "Euro".to_string(), None);
        b.is_base = true;
        assert!(CurrencyDirectory::new(vec![a, b], Vec::new()).is_err());
    }

    #[test]
    fn latest_valid_rate_wins() {
        let dir = directory();
        assert_eq!(
            dir.rate(code("EUR"), code("USD"), day(2026, 2, 1)),
            Some(Decimal::new(108, 2))
        );
        assert_eq!(
            dir.rate(code("EUR"), code("USD"), day(2026, 3, 15)),
            Some(Decimal::new(110, 2))
        );
        assert_eq!(
            dir.rate(code("EUR"), code("USD"), day(2026, 4, 1)),
            Some(Decimal::new(108, 2))
        );
        assert_eq!(dir.rate(code("EUR"), code("USD"), day(2025, 12, 31)), None);
    }

    #[test]
    fn no_triangulation_or_reverse_lookup() {
        let dir = directory();
        assert_eq!(dir.rate(code("USD"), code("EUR"), day(2026, 2, 1)), None);
        assert_eq!(
            dir.convert(code("USD"), code("EUR"), Decimal::ONE, day(2026, 2, 1)),
            None
        );
    }

    #[test]
    fn converts_major_and_money() {
        let dir = directory();
        let on = day(2026, 2, 1);
        assert_eq!(
            dir.convert(code("EUR"), code("USD"), Decimal::new(100, 0), on),
            Some(Decimal::new(10800, 2))
        );
        assert_eq!(
            dir.convert_money(Money::new(1_000_000), code("EUR"), code("USD"), on),
            Some(Money::new(1_080_000))
        );
        assert_eq!(
            dir.convert_money(Money::new(5), code("USD"), code("USD"), on),
            Some(Money::new(5))
        );
    }
}
