//! # customs-calc
//!
//! Command-line front end of the tax engine.
//!
//! ## Usage
//! ```bash
//! # Check for HS codes without a preferential rate before an A.TR run
//! cargo run -p customs-engine --bin customs-calc -- precheck <CALCULATION_ID>
//!
//! # Compute and persist every item's taxes
//! cargo run -p customs-engine --bin customs-calc -- calculate <CALCULATION_ID>
//!
//! # Declaration code of an origin country
//! cargo run -p customs-engine --bin customs-calc -- country-code CN
//!
//! # Print the effective configuration
//! cargo run -p customs-engine --bin customs-calc -- --config ./customs.toml config
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use customs_db::Database;
use customs_engine::config::DEFAULT_LOG_FILTER;
use customs_engine::{EngineConfig, EngineError, TaxCalculator};
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

enum Command {
    Calculate(String),
    Precheck(String),
    CountryCode(String),
    ShowConfig,
}

struct Args {
    config: Option<PathBuf>,
    db: Option<PathBuf>,
    command: Command,
}

fn print_usage() {
    println!("Customs Tax Calculator");
    println!();
    println!("Usage: customs-calc [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  calculate <ID>       Compute and store the taxes of a calculation");
    println!("  precheck <ID>        List A.TR items whose HS code has no preferential rate");
    println!("  country-code <ISO>   Customs declaration code of a country");
    println!("  config               Print the effective configuration");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>  Config file (default: platform config dir)");
    println!("  -d, --db <PATH>      Database file, overrides the config");
    println!("  -h, --help           Show this help message");
}

/// `None` means usage was printed and there is nothing to run.
fn parse_args(args: &[String]) -> Result<Option<Args>, String> {
    let mut config = None;
    let mut db = None;
    let mut positional = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let path = args.get(i + 1).ok_or("--config needs a path")?;
                config = Some(PathBuf::from(path));
                i += 1;
            }
            "--db" | "-d" => {
                let path = args.get(i + 1).ok_or("--db needs a path")?;
                db = Some(PathBuf::from(path));
                i += 1;
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let command = match (positional.next().as_deref(), positional.next()) {
        (Some("calculate"), Some(id)) => Command::Calculate(id),
        (Some("precheck"), Some(id)) => Command::Precheck(id),
        (Some("country-code"), Some(country)) => Command::CountryCode(country),
        (Some("config"), None) => Command::ShowConfig,
        (Some(name), _) => return Err(format!("unknown or incomplete command '{name}'")),
        (None, _) => return Err("no command given".to_string()),
    };

    Ok(Some(Args { config, db, command }))
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Installs logging before the config is read. `RUST_LOG` wins when set;
/// otherwise the returned handle swaps in the configured filter later.
fn init_tracing() -> Option<FilterHandle> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
            None
        }
        Err(_) => {
            let (filter, handle) = reload::Layer::new(EnvFilter::new(DEFAULT_LOG_FILTER));
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
            Some(handle)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

async fn run(args: Args, filter: Option<FilterHandle>) -> CliResult<()> {
    let mut config = EngineConfig::load(args.config)?;
    if let Some(db) = args.db {
        config.database.path = db;
    }

    if let Some(handle) = filter {
        handle.reload(EnvFilter::new(&config.logging.filter))?;
    }

    match args.command {
        Command::ShowConfig => {
            print!("{}", config.to_toml()?);
        }
        Command::CountryCode(country) => {
            let codes = config.country_codes();
            let code = codes.require_customs_code(&country)?;
            print_json(&serde_json::json!({ "country": country, "customs_code": code }))?;
        }
        Command::Calculate(id) => {
            let calculator = open_calculator(&config).await?;
            let report = calculator.calculate(&id).await?;
            print_json(&report)?;
            calculator.store().close().await;
        }
        Command::Precheck(id) => {
            let calculator = open_calculator(&config).await?;
            let missing = calculator.check_missing_atr_rates(&id).await?;
            print_json(&missing)?;
            calculator.store().close().await;
        }
    }

    Ok(())
}

async fn open_calculator(config: &EngineConfig) -> Result<TaxCalculator<Database>, EngineError> {
    info!(path = ?config.database.path, "Opening database");
    let db = Database::new(config.db_config()).await?;
    Ok(TaxCalculator::new(db, config.exempt_countries()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let raw: Vec<String> = env::args().collect();

    let args = match parse_args(&raw) {
        Ok(Some(args)) => args,
        Ok(None) => return ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("Run 'customs-calc --help' for usage.");
            return ExitCode::from(2);
        }
    };

    let filter = init_tracing();

    match run(args, filter).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
