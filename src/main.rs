//! Mandate Reconciler CLI
//!
//! Reconciles a delimited mandate extract against a store snapshot and
//! prints the run summary.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- mandates.txt --store mandate_store.json --batch-size 200
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity
//! - `MANDATE_ACTOR`: Identity recorded on audit entries (default `system`)

use clap::Parser;
use mandate_reconciler::config::{DEFAULT_ACTOR, DEFAULT_BATCH_SIZE};
use mandate_reconciler::{EngineError, MemoryStore, ReconcileConfig, Reconciler, Result, RunSummary};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "mandate-reconciler")]
#[command(about = "Reconcile a mandate extract against the mandate store", long_about = None)]
struct Cli {
    /// Delimited mandate extract
    input: PathBuf,

    /// JSON store snapshot, created if missing
    #[arg(long, default_value = "mandate_store.json")]
    store: PathBuf,

    /// Records per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Single-character field delimiter
    #[arg(long, default_value_t = '|')]
    delimiter: char,

    /// Identity recorded on audit entries
    #[arg(long, env = "MANDATE_ACTOR", default_value = DEFAULT_ACTOR)]
    actor: String,

    /// Only check the header column count, not the column names
    #[arg(long, default_value_t = false)]
    lenient_header: bool,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(summary) => {
            println!("{}", summary);
            process::exit(summary.outcome().exit_code());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<RunSummary> {
    let delimiter = u8::try_from(cli.delimiter).map_err(|_| {
        EngineError::InvalidConfig(format!("delimiter {:?} is not a single byte", cli.delimiter))
    })?;

    let config = ReconcileConfig::default()
        .with_batch_size(cli.batch_size)
        .with_delimiter(delimiter)
        .with_actor(cli.actor)
        .with_header_name_validation(!cli.lenient_header);

    let store = MemoryStore::load(&cli.store)?;
    let mut engine = Reconciler::new(store, config)?;
    let result = engine.process_file(&cli.input);

    // Committed batches are real even if a later batch aborted the run.
    if result.is_ok() || engine.stats().processed > 0 {
        engine.into_store().save(&cli.store)?;
    }
    result
}
