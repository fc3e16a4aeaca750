//! Schema maintenance commands.

use anyhow::{Context as _, Result};
use parkonic_core::TicketKind;
use parkonic_store::{describe_columns, describe_indexes, reset_schema, ColumnInfo, IndexInfo};
use serde::Serialize;

use super::{print_json, Context};

#[derive(Debug, Serialize)]
struct TableDescription {
    table: &'static str,
    columns: Vec<ColumnInfo>,
    indexes: Vec<IndexInfo>,
}

pub async fn migrate(ctx: &Context) -> Result<()> {
    ctx.migrated_pool().await?;
    tracing::info!(database = %ctx.config.database.url, "migrations applied");
    println!("[OK] migrations applied to {}", ctx.config.database.url);
    Ok(())
}

pub async fn reset(ctx: &Context) -> Result<()> {
    let pool = ctx.pool().await?;
    reset_schema(&pool)
        .await
        .context("failed to recreate ticket tables")?;
    tracing::info!(database = %ctx.config.database.url, "ticket tables recreated");
    println!("[OK] ticket tables recreated in {}", ctx.config.database.url);
    Ok(())
}

pub async fn seed(ctx: &Context) -> Result<()> {
    let service = ctx.service().await?;
    let inserted = service
        .seed_samples()
        .await
        .context("failed to insert sample tickets")?;
    println!("[OK] {inserted} sample ticket(s) inserted");
    Ok(())
}

pub async fn describe(ctx: &Context, kind: TicketKind) -> Result<()> {
    let pool = ctx.migrated_pool().await?;
    let description = TableDescription {
        table: kind.table_name(),
        columns: describe_columns(&pool, kind)
            .await
            .with_context(|| format!("failed to read columns of {kind}"))?,
        indexes: describe_indexes(&pool, kind)
            .await
            .with_context(|| format!("failed to read indexes of {kind}"))?,
    };
    print_json(&description)
}
