//! At most one currency row may carry the base flag.

use sea_orm::{ConnectionTrait, DbErr, Statement};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        let backend = db.get_database_backend();

        let bases = db
            .query_all(Statement::from_string(
                backend,
                "SELECT code FROM currencies WHERE is_base;".to_string(),
            ))
            .await?;
        if bases.len() > 1 {
            let mut codes = Vec::with_capacity(bases.len());
            for row in &bases {
                codes.push(row.try_get::<String>("", "code")?);
            }
            return Err(DbErr::Custom(format!(
                "cannot enforce a single base currency: {} are all marked base",
                codes.join(", ")
            )));
        }

        db.execute(Statement::from_string(
            backend,
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_currencies_single_base ON currencies (is_base) WHERE is_base;"
                .to_string(),
        ))
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        let backend = db.get_database_backend();
        db.execute(Statement::from_string(
            backend,
            "DROP INDEX IF EXISTS idx_currencies_single_base;".to_string(),
        ))
        .await?;
        Ok(())
    }
}
