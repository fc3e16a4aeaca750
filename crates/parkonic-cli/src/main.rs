use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use parkonic_core::{TicketId, TicketKind};
use parkonic_service::Config;

mod commands;
mod logging;

use commands::ingest::InputFormat;
use commands::tickets::SearchArgs;
use commands::Context;

#[derive(Parser, Debug)]
#[command(name = "parkonic")]
#[command(about = "Parking ticket schema and ingestion tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./parkonic.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database URL, overrides the configured one
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the MySQL dump of the ticket database
    Dump {
        /// Output file (defaults to the configured dump file name)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Database name written into the dump
        #[arg(long)]
        database: Option<String>,
    },

    /// Apply the embedded migrations
    Migrate,

    /// Drop and recreate both ticket tables
    Reset,

    /// Insert a sample ticket into each empty table
    Seed,

    /// Ingest tickets from a CSV or JSON Lines file
    Ingest {
        /// Target table: omc or ocr
        kind: TicketKind,

        /// Input file
        file: PathBuf,

        /// Input format (detected from the extension if not specified)
        #[arg(long, value_enum)]
        format: Option<InputFormat>,

        /// Print Prometheus counters to stderr after the batch
        #[arg(long)]
        metrics: bool,
    },

    /// List tickets, newest first
    List {
        kind: TicketKind,

        #[arg(long, default_value = "50")]
        limit: u32,

        #[arg(long, default_value = "0")]
        offset: u32,
    },

    /// Show one ticket
    Show { kind: TicketKind, id: TicketId },

    /// Search tickets by indexed columns
    Search {
        kind: TicketKind,

        #[command(flatten)]
        filters: SearchArgs,
    },

    /// Insert one ticket from a JSON file as given, skipping deduplication
    Create { kind: TicketKind, file: PathBuf },

    /// Replace every column of a ticket with the contents of a JSON file
    Update {
        kind: TicketKind,
        id: TicketId,
        file: PathBuf,
    },

    /// Delete one ticket
    Delete { kind: TicketKind, id: TicketId },

    /// Show the tickets of both tables linked to a trip
    Correlate { trip_id: i32 },

    /// Show the stored columns and indexes of a table
    Describe { kind: TicketKind },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    if let Command::Dump {
        database: Some(name),
        ..
    } = &cli.command
    {
        config.dump.database_name = name.clone();
    }
    config.validate().context("invalid configuration")?;

    logging::init_logging(&config.logging)?;
    tracing::debug!(database = %config.database.url, "configuration loaded");

    let ctx = Context::new(config);
    match cli.command {
        Command::Dump { output, .. } => commands::dump::run(&ctx, output),
        Command::Migrate => commands::schema::migrate(&ctx).await,
        Command::Reset => commands::schema::reset(&ctx).await,
        Command::Seed => commands::schema::seed(&ctx).await,
        Command::Describe { kind } => commands::schema::describe(&ctx, kind).await,
        Command::Ingest {
            kind,
            file,
            format,
            metrics,
        } => commands::ingest::run(&ctx, kind, &file, format, metrics).await,
        Command::List {
            kind,
            limit,
            offset,
        } => commands::tickets::list(&ctx, kind, limit, offset).await,
        Command::Show { kind, id } => commands::tickets::show(&ctx, kind, id).await,
        Command::Search { kind, filters } => commands::tickets::search(&ctx, kind, filters).await,
        Command::Create { kind, file } => commands::tickets::create(&ctx, kind, &file).await.map(drop),
        Command::Update { kind, id, file } => commands::tickets::update(&ctx, kind, id, &file).await,
        Command::Delete { kind, id } => commands::tickets::delete(&ctx, kind, id).await,
        Command::Correlate { trip_id } => commands::tickets::correlate(&ctx, trip_id).await,
    }
}
