use std::{fmt, str::FromStr};

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{ResultSettlement, SettlementError};

/// ISO-4217-like currency code: exactly three ASCII letters, stored
/// uppercase.
///
/// ```rust
/// use settlement::CurrencyCode;
///
/// let usd: CurrencyCode = " usd ".parse().unwrap();
/// assert_eq!(usd.as_str(), "USD");
/// assert!("US".parse::<CurrencyCode>().is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    /// Canonical code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Constructed only from ASCII letters.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl FromStr for CurrencyCode {
    type Err = SettlementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bytes: [u8; 3] = trimmed
            .as_bytes()
            .try_into()
            .map_err(|_| SettlementError::CurrencyMismatch(format!("invalid currency: {s}")))?;
        if !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(SettlementError::CurrencyMismatch(format!(
                "invalid currency: {s}"
            )));
        }
        Ok(Self(bytes.map(|b| b.to_ascii_uppercase())))
    }
}

impl TryFrom<&str> for CurrencyCode {
    type Error = SettlementError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurrencyCode({})", self.as_str())
    }
}

impl Serialize for CurrencyCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Currency metadata.
///
/// At most one currency is the *base* currency: the one every amount is
/// normalized into for consolidated reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: CurrencyCode,
    pub name: String,
    pub symbol: Option<String>,
    pub is_base: bool,
    pub active: bool,
}

impl Currency {
    pub fn new(code: CurrencyCode, name: String, symbol: Option<String>) -> Self {
        Self {
            code,
            name,
            symbol,
            is_base: false,
            active: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "currencies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub name: String,
    pub symbol: Option<String>,
    pub is_base: bool,
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Currency> for ActiveModel {
    fn from(currency: &Currency) -> Self {
        Self {
            code: ActiveValue::Set(currency.code.to_string()),
            name: ActiveValue::Set(currency.name.clone()),
            symbol: ActiveValue::Set(currency.symbol.clone()),
            is_base: ActiveValue::Set(currency.is_base),
            active: ActiveValue::Set(currency.active),
        }
    }
}

impl TryFrom<Model> for Currency {
    type Error = SettlementError;

    fn try_from(model: Model) -> ResultSettlement<Self> {
        Ok(Self {
            code: model.code.parse()?,
            name: model.name,
            symbol: model.symbol,
            is_base: model.is_base,
            active: model.active,
        })
    }
}
