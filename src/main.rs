//! # theftcast command-line entry point
//!
//! ```bash
//! theftcast train --input thefts.csv --output-dir output
//! theftcast profile --input thefts.csv
//! theftcast predict --artifact output/best_model.json --input '{"BIKE_COST": 500}'
//! ```
//!
//! Set `RUST_LOG=debug` to see per-pair and per-tree detail.

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)] // The CLI reports results on stdout

mod cli;

use anyhow::Result;
use clap::Parser as _;
use theftcast::logging;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::init(cli.log_dir.as_deref())?;

    if let Err(e) = cli::run_command(cli.command) {
        tracing::error!("{e:#}");
        return Err(e);
    }
    Ok(())
}
