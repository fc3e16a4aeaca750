//! Service layer for the parking ticket tables.
//! Ingestion, session deduplication and trip correlation shared by the CLI.

mod config;
pub mod metrics;
mod ticket_service;

pub use config::{
    Config, ConfigError, DatabaseConfig, DumpConfig, IngestConfig, LoggingConfig,
    DEFAULT_CONFIG_FILE,
};
pub use ticket_service::{
    coerce_record, IngestFailure, IngestOutcome, IngestReport, TicketService, TripCorrelation,
};
