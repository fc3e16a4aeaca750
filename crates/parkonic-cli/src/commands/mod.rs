//! Subcommand implementations.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use parkonic_core::{TicketFields, TicketKind, TicketRecord};
use parkonic_service::{coerce_record, Config, TicketService};
use parkonic_store::{create_sqlite_pool_with, run_migrations, SqliteTicketRepository};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::SqlitePool;

pub mod dump;
pub mod ingest;
pub mod schema;
pub mod tickets;

/// Loaded configuration shared by every command.
pub struct Context {
    pub config: Config,
}

impl Context {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Opens the configured store without touching its schema.
    pub async fn pool(&self) -> Result<SqlitePool> {
        let database = &self.config.database;
        create_sqlite_pool_with(
            &database.url,
            database.max_connections,
            database.connection_timeout(),
        )
        .await
        .with_context(|| format!("failed to open {}", database.url))
    }

    /// Opens the store and applies outstanding migrations.
    pub async fn migrated_pool(&self) -> Result<SqlitePool> {
        let pool = self.pool().await?;
        run_migrations(&pool)
            .await
            .context("failed to apply ticket migrations")?;
        Ok(pool)
    }

    /// Builds the ticket service over a migrated store.
    pub async fn service(&self) -> Result<TicketService> {
        let pool = self.migrated_pool().await?;
        let service = TicketService::new(
            Arc::new(SqliteTicketRepository::new(pool.clone(), TicketKind::Omc)),
            Arc::new(SqliteTicketRepository::new(pool, TicketKind::Ocr)),
            self.config.ingest.clone(),
        )?;
        Ok(service)
    }
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    println!("{rendered}");
    Ok(())
}

/// Parses one JSON object keyed by column name into ticket fields.
///
/// Scalars of any JSON type are taken as text and coerced like CSV values, so
/// `"101"` and `101` both fill an integer column and a malformed value only
/// nulls its own column. `null` leaves the column unset.
pub fn fields_from_json(payload: &str, position: usize) -> Result<TicketFields, serde_json::Error> {
    let object: Map<String, Value> = serde_json::from_str(payload)?;
    let text: Map<String, Value> = object
        .into_iter()
        .filter_map(|(column, value)| {
            let value = match value {
                Value::Null => return None,
                Value::String(text) => text,
                other => other.to_string(),
            };
            Some((column, Value::String(value)))
        })
        .collect();
    let record: TicketRecord = serde_json::from_value(Value::Object(text))?;
    Ok(coerce_record(record, position))
}
