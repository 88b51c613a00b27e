//! CRC Utility CLI
//!
//! Generates the C++ lookup table and checks that every table derivation
//! agrees.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use busgen::checksum::{
    check_conformance, generate_table, render_cpp_table, Crc32, Polynomial, TableMethod, REFERENCE_BUFFER,
    REFERENCE_CHECKSUM,
};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crc-util")]
#[command(about = "CRC-32 lookup table generation and conformance checks")]
struct Cli {
    /// 32-bit polynomial in explicit-top-bit hex notation (e.g. 0x1F1922815)
    #[arg(long)]
    poly: String,

    /// Print the C++ lookup table
    #[arg(long)]
    gen_table: bool,

    /// Write the generated table here instead of stdout
    #[arg(long, requires = "gen_table")]
    output: Option<PathBuf>,

    /// Compare every table derivation over the reference buffer
    #[arg(long)]
    test: bool,

    /// Check the checksum of the reference buffer
    #[arg(long)]
    reference_test: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error! {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let poly = Polynomial::parse(&cli.poly)?;

    if cli.gen_table {
        info!("Generating table for poly {}", poly);
        let table = generate_table(poly, TableMethod::Library);
        let cpp = render_cpp_table(poly, &table);
        match &cli.output {
            Some(path) => {
                fs::write(path, &cpp).with_context(|| format!("failed to write {}", path.display()))?;
                info!("Wrote lookup table to {}", path.display());
            }
            None => {
                println!("----------------------[COPY BELOW]----------------------");
                print!("{}", cpp);
                println!("----------------------[COPY ABOVE]----------------------");
            }
        }
    }

    if cli.test {
        let report = check_conformance(poly, &REFERENCE_BUFFER);
        print!("{}", report);
        if !report.is_conformant() {
            bail!("CRC derivations disagree for poly {}", poly);
        }
    }

    if cli.reference_test {
        let crc = Crc32::new(poly).checksum(&REFERENCE_BUFFER);
        println!("crc = 0x{:08X}", crc);
        if poly == Polynomial::DEFAULT && crc != REFERENCE_CHECKSUM {
            bail!("expected 0x{:08X} but got 0x{:08X}", REFERENCE_CHECKSUM, crc);
        }
    }

    Ok(())
}
