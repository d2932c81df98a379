//! Subcommand implementations

use std::path::PathBuf;

use airport_catalog::{CatalogAttachment, RemoteSchema};
use airport_duck::DuckMirror;
use airport_flight::ScanOptions;
use anyhow::{anyhow, Context, Result};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use clap::Args;
use futures::{Stream, TryStreamExt};
use tracing::{debug, info};

use crate::config::ScanConfig;

#[derive(Debug, Args)]
pub struct ScanArgs {
    pub schema: String,
    pub table: String,

    /// Concurrent endpoint readers
    #[arg(long)]
    pub workers: Option<usize>,

    /// JSON filter description forwarded to the server
    #[arg(long)]
    pub filters: Option<String>,

    /// Stop after this many rows
    #[arg(long)]
    pub limit: Option<usize>,

    /// Mirror the table into this DuckDB database instead of printing
    #[arg(long)]
    pub duckdb: Option<PathBuf>,
}

pub async fn version(catalog: &CatalogAttachment) -> Result<()> {
    let version = catalog.catalog_version().await?;
    println!(
        "{} version {}{}",
        catalog.catalog(),
        version.version,
        if version.is_fixed { " (fixed)" } else { "" }
    );
    Ok(())
}

pub async fn schemas(catalog: &CatalogAttachment) -> Result<()> {
    for schema in catalog.list_schemas().await? {
        if schema.comment.is_empty() {
            println!("{}", schema.name);
        } else {
            println!("{}\t{}", schema.name, schema.comment);
        }
    }
    Ok(())
}

pub async fn objects(catalog: &CatalogAttachment, schema: &str) -> Result<()> {
    let schema = find_schema(catalog, schema).await?;
    let contents = catalog.schema_items(&schema).await?;

    for table in &contents.tables {
        let columns: Vec<String> = table
            .table
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.logical_type))
            .collect();
        println!("table {}({})", table.info.name, columns.join(", "));
    }
    for function in &contents.scalar_functions {
        let inputs: Vec<String> = function.input_types.iter().map(|t| t.to_string()).collect();
        println!(
            "scalar function {}({}) -> {}",
            function.info.name,
            inputs.join(", "),
            function.return_type
        );
    }
    for function in &contents.table_functions {
        let mut params: Vec<String> = function
            .signature
            .positional
            .iter()
            .map(|p| format!("{} {}", p.name, p.logical_type))
            .collect();
        params.extend(
            function
                .signature
                .named
                .iter()
                .map(|(name, t)| format!("{} := {}", name, t)),
        );
        println!(
            "table function {}({}){}",
            function.info.name,
            params.join(", "),
            if function.is_in_out() { " in-out" } else { "" }
        );
    }
    Ok(())
}

pub async fn scan(catalog: &CatalogAttachment, args: ScanArgs, defaults: &ScanConfig) -> Result<()> {
    let schema = find_schema(catalog, &args.schema).await?;
    let contents = catalog.schema_items(&schema).await?;
    let table = contents
        .table(&args.table)
        .ok_or_else(|| anyhow!("table '{}' not found in schema '{}'", args.table, schema.name))?;

    let mirror = match &args.duckdb {
        Some(path) => {
            let mirror = DuckMirror::open(path)
                .with_context(|| format!("opening DuckDB database {}", path.display()))?;
            mirror.mirror_table(table)?;
            Some(mirror)
        }
        None => None,
    };

    let options = ScanOptions {
        workers: args.workers.unwrap_or(defaults.workers),
        filters: args.filters.clone(),
        channel_capacity: defaults.channel_capacity,
    };
    let mut stream = catalog.scan(table, options).await?;
    let progress = stream.progress();

    let mut printed: Vec<RecordBatch> = Vec::new();
    let rows = take_rows(&mut stream, args.limit, |batch| {
        debug!(rows = batch.num_rows(), progress = progress.percent(), "Received batch");
        match &mirror {
            Some(mirror) => {
                mirror.append_batches(&table.info.schema, &table.info.name, &table.table, [batch])?;
            }
            None => printed.push(batch),
        }
        Ok(())
    })
    .await?;
    drop(stream);

    if mirror.is_none() {
        println!("{}", pretty_format_batches(&printed)?);
    }
    info!(
        schema = %table.info.schema,
        table = %table.info.name,
        rows,
        progress = progress.percent(),
        "Scan complete"
    );
    Ok(())
}

/// Feed batches to `sink` until the stream ends or `limit` rows were taken.
///
/// The stream is not polled again once the limit is reached; the last batch
/// is sliced to fit.
pub async fn take_rows<S, F>(stream: &mut S, limit: Option<usize>, mut sink: F) -> Result<usize>
where
    S: Stream<Item = airport_core::Result<RecordBatch>> + Unpin,
    F: FnMut(RecordBatch) -> Result<()>,
{
    let mut remaining = limit;
    let mut rows = 0;
    while remaining != Some(0) {
        let Some(batch) = stream.try_next().await? else {
            break;
        };
        let batch = match remaining {
            Some(n) => {
                let take = n.min(batch.num_rows());
                remaining = Some(n - take);
                batch.slice(0, take)
            }
            None => batch,
        };
        rows += batch.num_rows();
        sink(batch)?;
    }
    Ok(rows)
}

async fn find_schema(catalog: &CatalogAttachment, name: &str) -> Result<RemoteSchema> {
    catalog
        .list_schemas()
        .await?
        .into_iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| anyhow!("schema '{}' not found in catalog '{}'", name, catalog.catalog()))
}
