//! Manifest File Listing CLI
//!
//! Prints the `;`-separated list of headers a generation run produces, for
//! build systems that need the output list up front.

use std::path::PathBuf;

use anyhow::Context;
use busgen::manifest::expected_output_files;
use busgen::CompilerConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "manifest-files")]
#[command(about = "List the generated files described by a persisted manifest")]
struct Cli {
    /// Configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Manifest directory (defaults to the configured one)
    #[arg(short, long)]
    manifest_dir: Option<PathBuf>,

    /// Generated include directory (defaults to the configured one)
    #[arg(short, long)]
    include_dir: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CompilerConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    let manifest_dir = cli.manifest_dir.unwrap_or_else(|| config.manifest_dir());
    let include_dir = cli.include_dir.unwrap_or_else(|| config.cpp_include_dir());

    // nothing generated yet
    if !include_dir.is_dir() {
        println!("{}", include_dir.display());
        return Ok(());
    }

    let files = expected_output_files(&manifest_dir, &include_dir)?;
    let joined: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
    println!("{}", joined.join(";"));
    Ok(())
}
