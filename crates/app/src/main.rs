use std::error::Error;

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use rust_decimal::Decimal;
use settings::Database;
use settlement::{
    BucketTotals, CashFlowReport, CurrencyCode, CurrencyRepository, Engine, Payable,
    standard_periods,
};

mod settings;

#[derive(Parser, Debug)]
#[command(name = "settle")]
#[command(about = "Operator utilities for the settlement engine")]
struct Cli {
    /// Settings file, without extension (also read from `SETTLE_SETTINGS`).
    #[arg(long, env = "SETTLE_SETTINGS", default_value = "settings")]
    settings: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations and exit.
    Migrate,
    Currency(Currency),
    Statuses(Statuses),
    /// Print the cash-flow projection over the standard windows.
    CashFlow(AsOfArgs),
    Schedule(Schedule),
}

#[derive(Args, Debug)]
struct Currency {
    #[command(subcommand)]
    command: CurrencyCommand,
}

#[derive(Subcommand, Debug)]
enum CurrencyCommand {
    /// Register a currency.
    Add(CurrencyAddArgs),
    /// Make a currency the base currency.
    Base { code: CurrencyCode },
    /// Store an exchange rate.
    Rate(RateArgs),
    /// List currencies and rates.
    List,
}

#[derive(Args, Debug)]
struct CurrencyAddArgs {
    code: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    symbol: Option<String>,
}

#[derive(Args, Debug)]
struct RateArgs {
    from: CurrencyCode,
    to: CurrencyCode,
    rate: Decimal,
    #[arg(long)]
    valid_from: NaiveDate,
    #[arg(long)]
    valid_to: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct Statuses {
    #[command(subcommand)]
    command: StatusesCommand,
}

#[derive(Subcommand, Debug)]
enum StatusesCommand {
    /// Recompute the status of every unresolved schedule item.
    Refresh(AsOfArgs),
}

#[derive(Args, Debug)]
struct AsOfArgs {
    /// Reference date (defaults to today, UTC).
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

impl AsOfArgs {
    fn date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[derive(Args, Debug)]
struct Schedule {
    #[command(subcommand)]
    command: ScheduleCommand,
}

#[derive(Subcommand, Debug)]
enum ScheduleCommand {
    /// Print the schedule of a document.
    Show {
        /// Document reference, `proforma_invoice:<uuid>` or `purchase_order:<uuid>`.
        #[arg(long)]
        payable: Payable,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = settings::Settings::new(&cli.settings)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "settle={level},settlement={level},migration={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let engine = Engine::builder()
        .database(db)
        .due_soon_days(settings.settlement.due_soon_days)
        .build()
        .await?;

    match cli.command {
        Command::Migrate => println!("migrations applied"),
        Command::Currency(Currency { command }) => currency(&engine, command).await?,
        Command::Statuses(Statuses {
            command: StatusesCommand::Refresh(args),
        }) => {
            let changed = engine.refresh_statuses(args.date()).await?;
            println!("{changed} schedule item(s) changed status");
        }
        Command::CashFlow(args) => {
            let report = engine
                .project_cash_flow(&standard_periods(), args.date())
                .await?;
            print_cash_flow(&report);
        }
        Command::Schedule(Schedule {
            command: ScheduleCommand::Show { payable },
        }) => {
            let items = engine.schedule(payable).await?;
            if items.is_empty() {
                println!("no schedule for {payable}");
            }
            for item in items {
                println!(
                    "{:>3}  {:<24} {:>18} {}  paid {:>18}  remaining {:>18}  due {:<10}  {}{}",
                    item.sort_order,
                    item.label,
                    item.amount.format(2),
                    item.currency,
                    (item.paid_amount + item.credited_amount).format(2),
                    item.remaining_amount().format(2),
                    item.due_date.map_or_else(|| "-".to_string(), |d| d.to_string()),
                    item.status.as_str(),
                    if item.is_blocking { " (blocking)" } else { "" },
                );
            }
        }
    }

    Ok(())
}

async fn currency(
    engine: &Engine,
    command: CurrencyCommand,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match command {
        CurrencyCommand::Add(args) => {
            let code = engine
                .add_currency(&args.code, &args.name, args.symbol.as_deref())
                .await?;
            println!("added currency {code}");
        }
        CurrencyCommand::Base { code } => {
            engine.set_base_currency(code).await?;
            println!("base currency is now {code}");
        }
        CurrencyCommand::Rate(args) => {
            let id = engine
                .add_exchange_rate(args.from, args.to, args.rate, args.valid_from, args.valid_to)
                .await?;
            println!("added rate {id}");
        }
        CurrencyCommand::List => {
            let directory = engine.currency_directory().await?;
            let mut currencies: Vec<_> = directory.currencies().collect();
            currencies.sort_by_key(|c| c.code);
            for c in currencies {
                println!(
                    "{} {:<24} {}{}",
                    c.code,
                    c.name,
                    if c.is_base { "base" } else { "" },
                    if c.active { "" } else { " (inactive)" },
                );
            }
            for rate in directory.rates() {
                println!(
                    "{} -> {} {} from {} to {}",
                    rate.from,
                    rate.to,
                    rate.rate,
                    rate.valid_from,
                    rate.valid_to
                        .map_or_else(|| "open".to_string(), |d| d.to_string()),
                );
            }
            if directory.base_currency().is_none() {
                println!("warning: no base currency set");
            }
        }
    }
    Ok(())
}

fn print_cash_flow(report: &CashFlowReport) {
    println!("cash flow as of {} in {}", report.as_of, report.base_currency);
    let rows = report
        .buckets
        .iter()
        .chain([&report.unscheduled, &report.past_due, &report.beyond_horizon]);
    for bucket in rows {
        print_bucket(bucket);
    }
    let net = report.net();
    println!(
        "total: in {}  out {}  net {} ({:?})",
        report.total_inflow().format(2),
        report.total_outflow().format(2),
        net.abs().format(2),
        net.direction()
    );
    let unconverted = report.unconverted_currencies();
    if !unconverted.is_empty() {
        let codes: Vec<_> = unconverted.iter().map(CurrencyCode::as_str).collect();
        println!(
            "warning: no rate to {} for {}; those amounts are excluded",
            report.base_currency,
            codes.join(", ")
        );
    }
}

fn print_bucket(bucket: &BucketTotals) {
    let net = bucket.net();
    println!(
        "{:<16} in {:>18}  out {:>18}  net {:>18} {:?}{}",
        bucket.label,
        bucket.inflow.converted.format(2),
        bucket.outflow.converted.format(2),
        net.abs().format(2),
        net.direction(),
        if bucket.has_conversion_warning() { "  !" } else { "" },
    );
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    tracing::debug!("database ready");
    Ok(database)
}
