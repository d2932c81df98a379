//! Airport catalog command line client
//!
//! Attaches a remote catalog served over Arrow Flight and lists its schemas
//! and objects, reports its version, or scans a table.

use std::path::PathBuf;

use airport_catalog::{AttachParameters, CatalogAttachment};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;

mod commands;
mod config;
mod logging;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "airport", version, about = "Browse and scan Airport Flight catalogs")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Server location, e.g. grpc://localhost:50312
    #[arg(long)]
    location: Option<String>,

    /// Catalog to attach
    #[arg(long)]
    catalog: Option<String>,

    /// Content cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the catalog version
    Version,
    /// List schemas
    Schemas,
    /// List the tables and functions of a schema
    Objects { schema: String },
    /// Scan a table
    Scan(commands::ScanArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets may live in .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(location) = cli.location {
        config.server.location = location;
    }
    if let Some(catalog) = cli.catalog {
        config.catalog.name = catalog;
    }
    if let Some(dir) = cli.cache_dir {
        config.catalog.cache_dir = Some(dir);
    }
    logging::init(&config.logging)?;

    if config.catalog.name.is_empty() {
        bail!("no catalog configured; pass --catalog or set AIRPORT_CATALOG");
    }
    let mut params = AttachParameters::new(&config.server.location, &config.catalog.name)
        .with_auth_token(Config::auth_token());
    if let Some(dir) = &config.catalog.cache_dir {
        params = params.with_cache_dir(dir);
    }
    info!(location = %config.server.location, catalog = %config.catalog.name, "Starting airport");
    let catalog = CatalogAttachment::connect(params)?;

    match cli.command {
        Command::Version => commands::version(&catalog).await,
        Command::Schemas => commands::schemas(&catalog).await,
        Command::Objects { schema } => commands::objects(&catalog, &schema).await,
        Command::Scan(args) => commands::scan(&catalog, args, &config.scan).await,
    }
}
