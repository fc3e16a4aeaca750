//! SQLite adapters and schema rendering for the parking ticket tables.

pub mod schema;
mod ticket_repository;
mod util;

pub use schema::{
    describe_columns, describe_indexes, mysql_create_table, mysql_dump, reset_schema,
    ColumnInfo, IndexInfo, DEFAULT_DATABASE_NAME,
};
pub use ticket_repository::SqliteTicketRepository;
pub use util::{create_sqlite_pool, create_sqlite_pool_with, run_migrations};

/// Embedded SQL migrations for the ticket database.
pub const MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
