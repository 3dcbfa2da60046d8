pub mod catalog;
pub mod cli;
pub mod columns;
pub mod config;
pub mod consolidate;
pub mod data;
pub mod error;
pub mod io_utils;
pub mod normalize;
pub mod preview;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod store;
pub mod table;
pub mod transform {
    pub mod string_ops;
}
pub mod workbook;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::Settings,
    store::CanonicalStore,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_cruce", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let settings = Settings::discover(cli.config.as_deref())?;
    debug!("Settings: {settings:?}");
    match cli.command {
        Commands::Consolidate(args) => consolidate::execute(&args, &settings),
        Commands::Reconcile(args) => reconcile::execute(&args, &settings),
        Commands::Columns(args) => columns::execute(&args, &settings),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Catalog(args) => catalog::execute(&args, &settings),
        Commands::Report(args) => report::execute(&args, &settings),
        Commands::Status(args) => handle_status(&args, &settings),
    }
}

fn handle_status(args: &cli::StatusArgs, settings: &Settings) -> Result<()> {
    let store = CanonicalStore::new(
        args.canonical
            .clone()
            .unwrap_or_else(|| settings.canonical_path.clone()),
    );
    info!("Inspecting canonical dataset {:?}", store.path());
    let Some(loaded) = store.load()? else {
        println!("canonical: {} (not created yet)", store.path().display());
        return Ok(());
    };
    println!("canonical: {}", store.path().display());
    println!("rows: {}", loaded.row_count());
    println!("columns: {}", loaded.column_count());
    if let Some(stamp) = store.last_updated()? {
        println!("last updated: {}", stamp.format("%Y-%m-%d %H:%M:%S"));
    }
    Ok(())
}
