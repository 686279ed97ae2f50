//! 'main' for the HYPE balance snapshot process

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{Case, Config, Environment, File};
use hypesnap_common::configuration::{
    CONFIG_KEY_INPUT_PATH, CONFIG_KEY_OUTPUT_PATH, CONFIG_KEY_TOP_N,
};
use hypesnap_common::{build_merkle, run, SnapshotConfig};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hypesnap")]
#[command(about = "Extract, rank and distribute HYPE balances from an exchange state dump")]
struct Args {
    /// Configuration files, applied in order over the defaults
    #[arg(long, value_name = "PATH")]
    config: Vec<String>,

    /// State dump to read
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Balances file to write
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Number of top balances to keep
    #[arg(long)]
    top_n: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Default, Subcommand)]
enum Command {
    /// Write the ranked top-N balances file (default)
    #[default]
    Balances,
    /// Build the Merkle root and proofs from an existing balances file
    Merkle,
    /// Run `balances` then `merkle`
    All,
}

fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Snapshot run failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    info!(
        "HYPE balance snapshot: {} -> {} (top {})",
        config.input_path.display(),
        config.output_path.display(),
        config.top_n
    );

    match args.command.unwrap_or_default() {
        Command::Balances => write_balances(&config),
        Command::Merkle => write_merkle(&config),
        Command::All => {
            write_balances(&config)?;
            write_merkle(&config)
        }
    }
}

fn load_config(args: &Args) -> Result<SnapshotConfig> {
    let mut builder = Config::builder();
    for file in &args.config {
        builder = builder.add_source(File::with_name(file));
    }
    builder = builder.add_source(
        Environment::with_prefix("HYPESNAP").convert_case(Case::Kebab).try_parsing(true),
    );

    if let Some(input) = &args.input {
        builder = builder.set_override(CONFIG_KEY_INPUT_PATH, input.display().to_string())?;
    }
    if let Some(output) = &args.output {
        builder = builder.set_override(CONFIG_KEY_OUTPUT_PATH, output.display().to_string())?;
    }
    if let Some(top_n) = args.top_n {
        builder = builder.set_override(CONFIG_KEY_TOP_N, top_n)?;
    }

    let config = builder.build().context("Failed to read configuration")?;
    SnapshotConfig::try_load(&config).context("Invalid configuration")
}

fn write_balances(config: &SnapshotConfig) -> Result<()> {
    let summary = run(config).with_context(|| {
        format!(
            "Balance snapshot of {} failed",
            config.input_path.display()
        )
    })?;

    println!(
        "Processing complete. Saved top {} entries (from {} total) to {}",
        summary.written,
        summary.qualifying,
        summary.output.display()
    );
    Ok(())
}

fn write_merkle(config: &SnapshotConfig) -> Result<()> {
    let summary = build_merkle(config).with_context(|| {
        format!(
            "Merkle distribution of {} failed",
            config.output_path.display()
        )
    })?;

    println!(
        "Merkle root {} over {} addresses saved to {}",
        summary.merkle_root,
        summary.leaves,
        config.merkle.root_path.display()
    );
    Ok(())
}
