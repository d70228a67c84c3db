//! The documents a schedule can belong to.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ResultSettlement, SettlementError, util::parse_uuid};

/// Which way money moves for a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDirection {
    /// Receivable: the client pays us.
    Inflow,
    /// Payable: we pay the supplier.
    Outflow,
}

/// Reference to the document owning a schedule item.
///
/// Persisted as a `(payable_type, payable_id)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Payable {
    ProformaInvoice(Uuid),
    PurchaseOrder(Uuid),
}

impl Payable {
    pub fn kind_str(self) -> &'static str {
        match self {
            Self::ProformaInvoice(_) => "proforma_invoice",
            Self::PurchaseOrder(_) => "purchase_order",
        }
    }

    pub fn id(self) -> Uuid {
        match self {
            Self::ProformaInvoice(id) | Self::PurchaseOrder(id) => id,
        }
    }

    pub fn direction(self) -> FlowDirection {
        match self {
            Self::ProformaInvoice(_) => FlowDirection::Inflow,
            Self::PurchaseOrder(_) => FlowDirection::Outflow,
        }
    }

    /// Rebuilds a reference from its stored `(type, id)` pair.
    pub fn from_parts(kind: &str, id: &str) -> ResultSettlement<Self> {
        let id = parse_uuid(id, "payable")?;
        match kind {
            "proforma_invoice" => Ok(Self::ProformaInvoice(id)),
            "purchase_order" => Ok(Self::PurchaseOrder(id)),
            other => Err(SettlementError::InvalidId(format!(
                "invalid payable type: {other}"
            ))),
        }
    }
}

impl fmt::Display for Payable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind_str(), self.id())
    }
}

impl FromStr for Payable {
    type Err = SettlementError;

    /// Parses the `type:id` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| SettlementError::InvalidId(format!("expected type:id, got {s}")))?;
        Self::from_parts(kind, id)
    }
}
