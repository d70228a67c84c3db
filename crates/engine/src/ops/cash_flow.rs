use chrono::NaiveDate;
use sea_orm::TransactionTrait;

use crate::{
    CashFlowReport, CurrencyRepository, Period, ResultSettlement, SettlementError, cash_flow,
};

use super::{Engine, with_tx};

impl Engine {
    /// Projects every outstanding item over `periods`, converted into the
    /// base currency with the rates valid on `as_of`.
    pub async fn project_cash_flow(
        &self,
        periods: &[Period],
        as_of: NaiveDate,
    ) -> ResultSettlement<CashFlowReport> {
        cash_flow::validate_periods(periods)?;
        let directory = self.currency_directory().await?;
        let base = directory.base_currency().ok_or_else(|| {
            SettlementError::Precondition("no base currency configured".to_string())
        })?;

        let items = with_tx!(self, |db_tx| { self.unresolved_items(&db_tx).await })?;

        let report = cash_flow::project(&items, periods, as_of, base.code, &directory)?;
        if report.has_conversion_warning() {
            tracing::warn!(
                unconverted = ?report.unconverted_currencies(),
                "cash-flow totals exclude unconvertible currencies"
            );
        }
        tracing::debug!(
            %as_of,
            base = %base.code,
            inflow = %report.total_inflow(),
            outflow = %report.total_outflow(),
            "cash flow projected"
        );
        Ok(report)
    }
}
