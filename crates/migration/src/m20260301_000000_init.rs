//! Initial schema migration - creates all settlement tables.
//!
//! - `currencies`: currency metadata and the base-currency flag
//! - `exchange_rates`: dated pairwise conversion rates
//! - `payment_terms`, `payment_term_stages`: schedule templates
//! - `schedule_items`: expected payment milestones of a document
//! - `payments`: wire transfers
//! - `allocations`: payment money applied to schedule items
//! - `credit_applications`: credit items offset against other items
//!
//! Amounts are `*_minor` BIGINT columns (1 major = 10,000 minor). Rates and
//! percentages are stored as decimal text.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Currencies {
    Table,
    Code,
    Name,
    Symbol,
    IsBase,
    Active,
}

#[derive(Iden)]
enum ExchangeRates {
    Table,
    Id,
    FromCurrency,
    ToCurrency,
    Rate,
    ValidFrom,
    ValidTo,
}

#[derive(Iden)]
enum PaymentTerms {
    Table,
    Id,
    Name,
}

#[derive(Iden)]
enum PaymentTermStages {
    Table,
    Id,
    PaymentTermId,
    Position,
    Label,
    Percentage,
    DayOffset,
    CalculationBase,
    IsBlocking,
}

#[derive(Iden)]
enum ScheduleItems {
    Table,
    Id,
    PayableType,
    PayableId,
    Label,
    Percentage,
    AmountMinor,
    Currency,
    DueDate,
    CalculationBase,
    DayOffset,
    IsBlocking,
    IsCredit,
    Status,
    SortOrder,
    WaivedReason,
}

#[derive(Iden)]
enum Payments {
    Table,
    Id,
    Direction,
    Counterparty,
    Currency,
    AmountMinor,
    PaidOn,
    Status,
    Reference,
    Attachment,
}

#[derive(Iden)]
enum Allocations {
    Table,
    Id,
    PaymentId,
    ScheduleItemId,
    AmountMinor,
    ExchangeRate,
    DocumentAmountMinor,
    CreatedAt,
}

#[derive(Iden)]
enum CreditApplications {
    Table,
    Id,
    CreditItemId,
    TargetItemId,
    AmountMinor,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Currencies
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Currencies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Currencies::Code)
                            .string_len(3)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Currencies::Name).string().not_null())
                    .col(ColumnDef::new(Currencies::Symbol).string())
                    .col(
                        ColumnDef::new(Currencies::IsBase)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Currencies::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Exchange rates
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ExchangeRates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExchangeRates::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExchangeRates::FromCurrency)
                            .string_len(3)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExchangeRates::ToCurrency)
                            .string_len(3)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExchangeRates::Rate).string().not_null())
                    .col(ColumnDef::new(ExchangeRates::ValidFrom).date().not_null())
                    .col(ColumnDef::new(ExchangeRates::ValidTo).date())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-exchange_rates-from_currency")
                            .from(ExchangeRates::Table, ExchangeRates::FromCurrency)
                            .to(Currencies::Table, Currencies::Code),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-exchange_rates-to_currency")
                            .from(ExchangeRates::Table, ExchangeRates::ToCurrency)
                            .to(Currencies::Table, Currencies::Code),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-exchange_rates-pair-valid_from")
                    .table(ExchangeRates::Table)
                    .col(ExchangeRates::FromCurrency)
                    .col(ExchangeRates::ToCurrency)
                    .col(ExchangeRates::ValidFrom)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Payment terms
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(PaymentTerms::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentTerms::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PaymentTerms::Name).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PaymentTermStages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentTermStages::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PaymentTermStages::PaymentTermId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTermStages::Position)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentTermStages::Label).string().not_null())
                    .col(
                        ColumnDef::new(PaymentTermStages::Percentage)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTermStages::DayOffset)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTermStages::CalculationBase)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentTermStages::IsBlocking)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-payment_term_stages-payment_term_id")
                            .from(PaymentTermStages::Table, PaymentTermStages::PaymentTermId)
                            .to(PaymentTerms::Table, PaymentTerms::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payment_term_stages-term-position-unique")
                    .table(PaymentTermStages::Table)
                    .col(PaymentTermStages::PaymentTermId)
                    .col(PaymentTermStages::Position)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Schedule items
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ScheduleItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ScheduleItems::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ScheduleItems::PayableType).string().not_null())
                    .col(ColumnDef::new(ScheduleItems::PayableId).string().not_null())
                    .col(ColumnDef::new(ScheduleItems::Label).string().not_null())
                    .col(ColumnDef::new(ScheduleItems::Percentage).string())
                    .col(
                        ColumnDef::new(ScheduleItems::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ScheduleItems::Currency)
                            .string_len(3)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ScheduleItems::DueDate).date())
                    .col(ColumnDef::new(ScheduleItems::CalculationBase).string())
                    .col(ColumnDef::new(ScheduleItems::DayOffset).integer())
                    .col(
                        ColumnDef::new(ScheduleItems::IsBlocking)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ScheduleItems::IsCredit)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(ScheduleItems::Status).string().not_null())
                    .col(ColumnDef::new(ScheduleItems::SortOrder).integer().not_null())
                    .col(ColumnDef::new(ScheduleItems::WaivedReason).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-schedule_items-currency")
                            .from(ScheduleItems::Table, ScheduleItems::Currency)
                            .to(Currencies::Table, Currencies::Code),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-schedule_items-payable")
                    .table(ScheduleItems::Table)
                    .col(ScheduleItems::PayableType)
                    .col(ScheduleItems::PayableId)
                    .col(ScheduleItems::SortOrder)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-schedule_items-status-due_date")
                    .table(ScheduleItems::Table)
                    .col(ScheduleItems::Status)
                    .col(ScheduleItems::DueDate)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Payments
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Payments::Direction).string().not_null())
                    .col(ColumnDef::new(Payments::Counterparty).string().not_null())
                    .col(ColumnDef::new(Payments::Currency).string_len(3).not_null())
                    .col(ColumnDef::new(Payments::AmountMinor).big_integer().not_null())
                    .col(ColumnDef::new(Payments::PaidOn).date().not_null())
                    .col(ColumnDef::new(Payments::Status).string().not_null())
                    .col(ColumnDef::new(Payments::Reference).string())
                    .col(ColumnDef::new(Payments::Attachment).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-payments-currency")
                            .from(Payments::Table, Payments::Currency)
                            .to(Currencies::Table, Currencies::Code),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Allocations
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Allocations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Allocations::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Allocations::PaymentId).string().not_null())
                    .col(
                        ColumnDef::new(Allocations::ScheduleItemId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Allocations::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Allocations::ExchangeRate).string())
                    .col(
                        ColumnDef::new(Allocations::DocumentAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Allocations::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-allocations-payment_id")
                            .from(Allocations::Table, Allocations::PaymentId)
                            .to(Payments::Table, Payments::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-allocations-schedule_item_id")
                            .from(Allocations::Table, Allocations::ScheduleItemId)
                            .to(ScheduleItems::Table, ScheduleItems::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-allocations-payment_id")
                    .table(Allocations::Table)
                    .col(Allocations::PaymentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-allocations-schedule_item_id")
                    .table(Allocations::Table)
                    .col(Allocations::ScheduleItemId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Credit applications
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(CreditApplications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CreditApplications::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CreditApplications::CreditItemId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CreditApplications::TargetItemId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CreditApplications::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CreditApplications::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-credit_applications-credit_item_id")
                            .from(CreditApplications::Table, CreditApplications::CreditItemId)
                            .to(ScheduleItems::Table, ScheduleItems::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-credit_applications-target_item_id")
                            .from(CreditApplications::Table, CreditApplications::TargetItemId)
                            .to(ScheduleItems::Table, ScheduleItems::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-credit_applications-credit_item_id")
                    .table(CreditApplications::Table)
                    .col(CreditApplications::CreditItemId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-credit_applications-target_item_id")
                    .table(CreditApplications::Table)
                    .col(CreditApplications::TargetItemId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(CreditApplications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Allocations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ScheduleItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PaymentTermStages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PaymentTerms::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ExchangeRates::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Currencies::Table).to_owned())
            .await?;
        Ok(())
    }
}
