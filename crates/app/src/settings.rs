//! Handles settings for the application. Configuration is written in
//! `settings.toml` and can be overridden with `SETTLE_*` environment
//! variables (`SETTLE_APP__LEVEL=debug`, `SETTLE_DATABASE__SQLITE=...`).
//!
//! See `settings.toml` for the configuration.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Default, Deserialize)]
pub struct Settlement {
    /// Days before the due date from which items are reported as DUE.
    #[serde(default)]
    pub due_soon_days: u32,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    #[serde(default)]
    pub settlement: Settlement,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", "info")?
            .set_default("database", "memory")?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("SETTLE").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
