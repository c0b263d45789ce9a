//! Grimoire CLI - spell record hashing, backfill and store maintenance.

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{backfill, canonicalize, collisions, gc, import, parse, preview, recompute, verify};

#[derive(Parser)]
#[command(name = "grimoire")]
#[command(about = "Spell record canonical hashing, dedup and store maintenance CLI")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Schema JSON file (default: the built-in schema)
    #[arg(long, global = true)]
    schema: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

/// Decision applied to every import conflict.
#[derive(Clone, Copy, ValueEnum)]
pub enum OnConflict {
    /// Leave existing records unchanged
    KeepExisting,
    /// Overwrite existing records with the incoming content
    Replace,
    /// Insert incoming records under a disambiguated name
    KeepBoth,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one legacy field text into its structured form
    Parse {
        /// Field kind (range, duration, casting_time, area, damage, saving_throw, magic_resistance, components)
        kind: String,
        /// Legacy text
        text: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show canonical bytes and content hash for a structured document
    Canonicalize {
        /// Input JSON file (or stdin if not provided)
        input: Option<String>,
        /// Output hash, bytes and hygiene report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show display text and content hash without saving
    Preview {
        /// Input JSON file (or stdin if not provided)
        input: Option<String>,
        /// Treat input as a stored record rather than a structured document
        #[arg(long)]
        record: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Hash every record that has no content hash
    Backfill {
        /// Path to the record store journal
        #[arg(long)]
        store: String,
        /// Vault root to store canonical bytes in
        #[arg(long)]
        vault: Option<String>,
        /// Records per commit
        #[arg(long, default_value_t = 100)]
        chunk_size: usize,
        /// Worker threads (default: available parallelism)
        #[arg(long)]
        workers: Option<usize>,
        /// Output the migration report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recompute every record's hash and rewrite those that changed
    Recompute {
        /// Path to the record store journal
        #[arg(long)]
        store: String,
        /// Vault root to store canonical bytes in
        #[arg(long)]
        vault: Option<String>,
        /// Worker threads (default: available parallelism)
        #[arg(long)]
        workers: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check stored hashes and vault entries
    Verify {
        /// Path to the record store journal
        #[arg(long)]
        store: String,
        /// Vault root to check and repair
        #[arg(long)]
        vault: Option<String>,
        /// Exit with error code if anything needs attention
        #[arg(long)]
        strict: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List records sharing a content hash
    Collisions {
        /// Path to the record store journal
        #[arg(long)]
        store: String,
        /// Exit with error code on a true collision
        #[arg(long)]
        strict: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete vault entries no record refers to
    Gc {
        /// Path to the record store journal
        #[arg(long)]
        store: String,
        /// Vault root
        #[arg(long)]
        vault: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import records from a JSON array file
    Import {
        /// Input JSON file (or stdin if not provided)
        input: Option<String>,
        /// Path to the record store journal
        #[arg(long)]
        store: String,
        /// Vault root to store canonical bytes in
        #[arg(long)]
        vault: Option<String>,
        /// Decision for every conflict
        #[arg(long, value_enum, default_value_t = OnConflict::KeepExisting)]
        on_conflict: OnConflict,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let schema = cli.schema;
    let result = match cli.command {
        Commands::Parse { kind, text, json } => parse::run(kind, text, json),
        Commands::Canonicalize { input, json } => canonicalize::run(schema, input, json),
        Commands::Preview {
            input,
            record,
            json,
        } => preview::run(schema, input, record, json),
        Commands::Backfill {
            store,
            vault,
            chunk_size,
            workers,
            json,
        } => backfill::run(schema, store, vault, chunk_size, workers, json),
        Commands::Recompute {
            store,
            vault,
            workers,
            json,
        } => recompute::run(schema, store, vault, workers, json),
        Commands::Verify {
            store,
            vault,
            strict,
            json,
        } => verify::run(schema, store, vault, strict, json),
        Commands::Collisions {
            store,
            strict,
            json,
        } => collisions::run(store, strict, json),
        Commands::Gc { store, vault, json } => gc::run(store, vault, json),
        Commands::Import {
            input,
            store,
            vault,
            on_conflict,
            json,
        } => import::run(schema, input, store, vault, on_conflict, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
