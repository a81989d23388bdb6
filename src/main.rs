use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use card_etl::{
    count_rows, pipeline, setup_database, Entity, EtlConfig, InputEncoding, RowErrorPolicy,
    RuleTable,
};

#[derive(Parser)]
#[command(
    name = "card-etl",
    version,
    about = "Load cooperative card extracts into a dimensional schema"
)]
struct Cli {
    /// JSON config file (defaults apply to missing keys)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full load: associado, agencia, transacoes
    Import(ImportArgs),
    /// Create the tables and exit
    InitSchema,
    /// Print row counts per table
    Counts,
}

#[derive(Args)]
struct ImportArgs {
    #[arg(long)]
    associados: Option<PathBuf>,

    #[arg(long)]
    agencias: Option<PathBuf>,

    #[arg(long)]
    transacoes: Option<PathBuf>,

    /// latin1, utf8 or auto
    #[arg(long)]
    encoding: Option<String>,

    /// Rows per committed batch (1 = commit per row)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Log and skip rows that fail to transform instead of aborting
    #[arg(long)]
    skip_invalid_rows: bool,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EtlConfig::from_file(path)?,
        None => EtlConfig::default(),
    };
    if let Some(database) = &cli.database {
        config.database.path = database.clone();
    }

    match cli.command {
        Command::Import(args) => run_import(config, args),
        Command::InitSchema => run_init_schema(&config),
        Command::Counts => run_counts(&config),
    }
}

fn run_import(mut config: EtlConfig, args: ImportArgs) -> Result<()> {
    println!("🗄️  Card ETL: CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    apply_import_args(&mut config, args)?;

    // Rule table and config are checked before touching any file
    let rules = RuleTable::builtin().context("Invalid sanitization rules")?;
    config.validate()?;
    info!(rules = rules.rule_count(), batch_size = config.batch_size, "configuration ok");

    println!("\n💾 Loading extracts into {}...", config.database.path.display());
    let report = pipeline::import(&config, &rules)?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for entity in &report.entities {
        println!(
            "✓ {:<11} loaded: {:>8}  rejected: {:>6}  batches: {:>6}",
            entity.entity.name(),
            entity.loaded,
            entity.rejected,
            entity.batches
        );
    }
    println!("✅ Load complete: {} rows", report.total_loaded());

    Ok(())
}

fn apply_import_args(config: &mut EtlConfig, args: ImportArgs) -> Result<()> {
    if let Some(path) = args.associados {
        config.inputs.associado = path;
    }
    if let Some(path) = args.agencias {
        config.inputs.agencia = path;
    }
    if let Some(path) = args.transacoes {
        config.inputs.transacoes = path;
    }
    if let Some(name) = args.encoding {
        config.encoding = InputEncoding::parse(&name)
            .with_context(|| format!("Unknown encoding '{}'", name))?;
    }
    if let Some(size) = args.batch_size {
        config.batch_size = size;
    }
    if args.skip_invalid_rows {
        config.on_row_error = RowErrorPolicy::Skip;
    }
    Ok(())
}

fn run_init_schema(config: &EtlConfig) -> Result<()> {
    let conn = Connection::open(&config.database.path)
        .with_context(|| format!("Failed to open {}", config.database.path.display()))?;
    setup_database(&conn, config.database.wal)?;
    println!("✓ Schema ready in {}", config.database.path.display());
    Ok(())
}

fn run_counts(config: &EtlConfig) -> Result<()> {
    if !config.database.path.exists() {
        anyhow::bail!(
            "Database not found: {} (run `card-etl import` first)",
            config.database.path.display()
        );
    }

    let conn = Connection::open(&config.database.path)?;
    for entity in Entity::LOAD_ORDER {
        let count = count_rows(&conn, entity)
            .with_context(|| format!("Failed to count {}", entity.table()))?;
        println!("{:<11} {:>10}", entity.table(), count);
    }
    Ok(())
}
