//! Read and maintenance commands over single tickets.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context as _, Result};
use chrono::NaiveDateTime;
use clap::Args;
use parkonic_core::{
    parse_datetime, Ticket, TicketFields, TicketId, TicketKind, TicketQuery, TicketRepository,
};
use serde_json::json;

use super::{fields_from_json, print_json, Context};

/// Filters accepted by `search`.
#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    #[arg(long)]
    pub camera_id: Option<i32>,

    #[arg(long)]
    pub plate_number: Option<String>,

    #[arg(long)]
    pub plate_code: Option<String>,

    #[arg(long = "trip-id")]
    pub parkonic_trip_id: Option<i32>,

    #[arg(long)]
    pub zone_name: Option<String>,

    #[arg(long)]
    pub zone_region: Option<String>,

    #[arg(long)]
    pub status: Option<String>,

    /// Earliest entry time, e.g. "2024-05-01 08:00"
    #[arg(long, value_parser = parse_timestamp)]
    pub from: Option<NaiveDateTime>,

    /// Latest entry time
    #[arg(long, value_parser = parse_timestamp)]
    pub until: Option<NaiveDateTime>,

    #[arg(long)]
    pub limit: Option<u32>,

    #[arg(long)]
    pub offset: Option<u32>,
}

impl From<SearchArgs> for TicketQuery {
    fn from(args: SearchArgs) -> Self {
        Self {
            camera_id: args.camera_id,
            plate_number: args.plate_number,
            plate_code: args.plate_code,
            parkonic_trip_id: args.parkonic_trip_id,
            zone_name: args.zone_name,
            zone_region: args.zone_region,
            status: args.status,
            entered_from: args.from,
            entered_until: args.until,
            limit: args.limit,
            offset: args.offset,
        }
    }
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime, String> {
    parse_datetime(value).ok_or_else(|| format!("`{value}` is not a date or datetime"))
}

pub async fn list(ctx: &Context, kind: TicketKind, limit: u32, offset: u32) -> Result<()> {
    let service = ctx.service().await?;
    let tickets = service
        .repository(kind)
        .list(limit, offset)
        .await
        .with_context(|| format!("failed to list {}", kind.table_name()))?;
    print_json(&tickets)
}

pub async fn show(ctx: &Context, kind: TicketKind, id: TicketId) -> Result<()> {
    let service = ctx.service().await?;
    let ticket = fetch(service.repository(kind).as_ref(), kind, id).await?;
    print_json(&ticket)
}

pub async fn search(ctx: &Context, kind: TicketKind, filters: SearchArgs) -> Result<()> {
    let query = TicketQuery::from(filters);
    if query.is_unfiltered() {
        tracing::warn!(table = kind.table_name(), "search without filters scans the whole table");
    }

    let service = ctx.service().await?;
    let tickets = service
        .repository(kind)
        .search(&query)
        .await
        .with_context(|| format!("failed to search {}", kind.table_name()))?;
    print_json(&tickets)
}

/// Inserts one ticket as given, without matching it against stored sessions.
pub async fn create(ctx: &Context, kind: TicketKind, file: &Path) -> Result<Ticket> {
    let fields = read_fields(file)?;
    let service = ctx.service().await?;
    let ticket = service
        .repository(kind)
        .create(&fields)
        .await
        .with_context(|| format!("failed to create {} ticket", kind.table_name()))?;

    tracing::info!(table = kind.table_name(), id = %ticket.id, "ticket created");
    print_json(&ticket)?;
    Ok(ticket)
}

pub async fn update(ctx: &Context, kind: TicketKind, id: TicketId, file: &Path) -> Result<()> {
    let fields = read_fields(file)?;
    let service = ctx.service().await?;
    let repo = service.repository(kind);

    let mut ticket = fetch(repo.as_ref(), kind, id).await?;
    ticket.fields = fields;
    repo.update(&ticket)
        .await
        .with_context(|| format!("failed to update {} {id}", kind.table_name()))?;

    tracing::info!(table = kind.table_name(), %id, "ticket updated");
    print_json(&ticket)
}

pub async fn delete(ctx: &Context, kind: TicketKind, id: TicketId) -> Result<()> {
    let service = ctx.service().await?;
    service
        .repository(kind)
        .delete(id)
        .await
        .with_context(|| format!("failed to delete {} {id}", kind.table_name()))?;

    tracing::info!(table = kind.table_name(), %id, "ticket deleted");
    print_json(&json!({ "table": kind.table_name(), "deleted": id }))
}

pub async fn correlate(ctx: &Context, trip_id: i32) -> Result<()> {
    let service = ctx.service().await?;
    let correlation = service
        .correlate_trip(trip_id)
        .await
        .with_context(|| format!("failed to correlate trip {trip_id}"))?;
    print_json(&correlation)
}

async fn fetch(
    repo: &dyn TicketRepository,
    kind: TicketKind,
    id: TicketId,
) -> Result<Ticket> {
    repo.get(id)
        .await
        .with_context(|| format!("failed to load {} {id}", kind.table_name()))?
        .ok_or_else(|| anyhow!("{} {id} not found", kind.table_name()))
}

fn read_fields(path: &Path) -> Result<TicketFields> {
    let payload =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    fields_from_json(&payload, 1)
        .with_context(|| format!("failed to parse ticket fields in {}", path.display()))
}
