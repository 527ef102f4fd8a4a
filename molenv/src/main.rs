//! Molecule environment command-line interface
//!
//! Reads a YAML molecule description, builds the libcint atm/bas/env tables
//! and writes the requested checkpoints.

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use std::fs;
use tracing::info;

mod config;
mod io;

use config::{Args, Config};
use io::{log_summary, make_loader, setup_output, write_checkpoints};

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_output(args.output.as_deref())?;

    info!("Reading configuration from: {}", args.config_file);
    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;

    let config: Config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults()
        .apply_args(&args)
        .wrap_err("Invalid command-line override")?;

    info!("Configuration loaded:\n{:?}", config);

    let loader = make_loader(config.basis_dir.as_deref());
    let mut mol = config.to_mole();
    mol.build_with(loader.as_ref())
        .wrap_err("Failed to build molecule")?;

    log_summary(&mol);
    write_checkpoints(&mol, &config.checkpoint())?;

    Ok(())
}
