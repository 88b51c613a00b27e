//! Schema Compiler CLI
//!
//! Validates, links and generates code for a bus message schema set.

use std::path::PathBuf;

use anyhow::Context;
use busgen::codegen::{ConstructBackend, CppBackend, EmitContext, Generator, ManifestBackend};
use busgen::{compile, CompilerConfig};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "busgen")]
#[command(about = "Compile bus message schemas into C++ headers, Python constructs and a linked manifest")]
struct Cli {
    /// Configuration file (layered over busgen.toml and BUSGEN__* variables)
    #[arg(short, long)]
    config: Option<String>,

    /// Directory holding the three schema documents
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// Output root
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Dry run - report files without writing them
    #[arg(long)]
    dry_run: bool,

    /// Skip the C++ backend
    #[arg(long)]
    no_cpp: bool,

    /// Skip the Python construct backend
    #[arg(long)]
    no_python: bool,

    /// Skip manifest persistence
    #[arg(long)]
    no_manifest: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = CompilerConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = &cli.input_dir {
        config = config.with_input_dir(dir);
    }
    if let Some(dir) = &cli.output_dir {
        config = config.with_output_root(dir);
    }

    info!("Validating schemas:");
    let manifest = compile(&config)?;

    let mut generator = Generator::new(manifest);
    if !cli.no_cpp {
        generator.register(CppBackend::new(&config)?);
    }
    if !cli.no_python {
        generator.register(ConstructBackend::new(&config)?);
    }
    if !cli.no_manifest {
        generator.register(ManifestBackend::new());
    }

    let mut ctx = EmitContext::new(&config).with_dry_run(cli.dry_run);
    generator.run(&mut ctx)?;

    info!(files = ctx.written().len(), root = %config.output.root.display(), "generation complete");
    Ok(())
}
