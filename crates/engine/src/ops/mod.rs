use chrono::{NaiveDate, Utc};
use sea_orm::DatabaseConnection;

use crate::ResultSettlement;

mod allocation;
mod cash_flow;
mod currencies;
mod helpers;
mod payment_terms;
mod payments;
mod schedule;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    due_soon_days: u32,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Days before the due date from which an item counts as DUE.
    pub fn due_soon_days(&self) -> u32 {
        self.due_soon_days
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    due_soon_days: u32,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Window, in days, during which an upcoming item is reported as DUE.
    /// Defaults to 0: items become DUE on their due date.
    pub fn due_soon_days(mut self, days: u32) -> EngineBuilder {
        self.due_soon_days = days;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultSettlement<Engine> {
        Ok(Engine {
            database: self.database,
            due_soon_days: self.due_soon_days,
        })
    }
}
