use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use miette::{Context, IntoDiagnostic, Result};

use intkv::{Database, DatabaseConfig, Format};

#[derive(Parser, Debug)]
#[command(name = "intkv", version, about, long_about = None)]
struct Cli {
    /// Path to the database directory (defaults to $HOME/.intkv)
    #[arg(global = true, short, long)]
    dir: Option<PathBuf>,

    /// On-disk storage layout
    #[arg(global = true, short, long, value_enum, default_value_t = CliFormat::Sorted)]
    format: CliFormat,

    /// Memtable capacity in entries before a flush is triggered
    #[arg(global = true, long, default_value_t = 1024)]
    memtable_capacity: usize,

    /// Buffer pool capacity in pages
    #[arg(global = true, long, default_value_t = 256)]
    buffer_pool_capacity: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFormat {
    Sorted,
    Bsst,
    Lsm,
}

impl From<CliFormat> for Format {
    fn from(f: CliFormat) -> Self {
        match f {
            CliFormat::Sorted => Format::Sorted,
            CliFormat::Bsst => Format::Bsst,
            CliFormat::Lsm => Format::Lsm,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Insert or overwrite a key-value pair
    #[command(alias = "p")]
    Put { key: i64, value: i64 },

    /// Get a value by key
    #[command(alias = "g")]
    Get { key: i64 },

    /// Update a value by key (equivalent to `put`)
    #[command(alias = "u")]
    Update { key: i64, value: i64 },

    /// Delete a key (writes a tombstone)
    #[command(alias = "rm")]
    Delete { key: i64 },

    /// Scan an inclusive key range, ascending by key
    #[command(alias = "s")]
    Scan { lo: i64, hi: i64 },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let dir = cli.dir.unwrap_or_else(default_dir);
    let config = DatabaseConfig::new(cli.memtable_capacity, cli.buffer_pool_capacity, cli.format.into());

    let mut db = Database::open(&dir, config)
        .into_diagnostic()
        .wrap_err_with(|| format!("could not open database at {:?}", dir))?;

    match cli.command {
        Command::Put { key, value } => {
            db.put(key, value)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to put key={key}"))?;
            success(&format!("put: {key} = {value}"));
        }
        Command::Get { key } => match db.get(key).into_diagnostic().wrap_err_with(|| format!("failed to get key={key}"))? {
            -1 => warn(&format!("key not found: {key}")),
            value => info(&format!("{key} = {value}")),
        },
        Command::Update { key, value } => {
            db.update(key, value)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to update key={key}"))?;
            success(&format!("update: {key} = {value}"));
        }
        Command::Delete { key } => {
            db.delete(key)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to delete key={key}"))?;
            success(&format!("deleted: {key}"));
        }
        Command::Scan { lo, hi } => {
            let entries = db
                .scan(lo, hi)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to scan [{lo}, {hi}]"))?;
            if entries.is_empty() {
                warn(&format!("no entries in [{lo}, {hi}]"));
            } else {
                for (k, v) in &entries {
                    info(&format!("{k} = {v}"));
                }
                success(&format!("{} entries", entries.len()));
            }
        }
    }

    db.close().into_diagnostic().wrap_err("failed to close database")?;

    Ok(())
}

/// Resolves a default database directory depending on OS.
fn default_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".intkv"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn success(msg: &str) {
    println!("{} {}", "✔".bright_green().bold(), msg.normal());
}

fn warn(msg: &str) {
    eprintln!("{} {}", "⚠".bright_yellow().bold(), msg.yellow());
}

fn info(msg: &str) {
    println!("{} {}", "➤".bright_cyan().bold(), msg.cyan());
}
