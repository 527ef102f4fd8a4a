//! Command-line arguments for building molecule environments

use clap::Parser;

/// Build libcint atm/bas/env tables from a YAML molecule description
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "mol.yaml")]
    pub config_file: String,

    /// Override output file: (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Write the built molecule as JSON
    #[arg(long)]
    pub dump: Option<String>,

    /// Write the built molecule as a pickle
    #[arg(long)]
    pub pickle: Option<String>,

    /// Write the atm/bas/env tables as text
    #[arg(long)]
    pub tables: Option<String>,

    /// Directory of `<name>.<element>.nwchem` basis files
    #[arg(long)]
    pub basis_dir: Option<String>,

    /// Molecular charge (overrides config file)
    #[arg(long)]
    pub charge: Option<i32>,

    /// 2S = N(alpha) - N(beta) (overrides config file)
    #[arg(long)]
    pub spin: Option<i32>,

    /// Coordinate unit, e.g. "angstrom", "bohr" (overrides config file)
    #[arg(long)]
    pub unit: Option<String>,

    /// Nuclear model for every atom: "gaussian", "point" or an integer switch
    /// (overrides the config file default)
    #[arg(long)]
    pub nucmod: Option<String>,

    /// Use Cartesian GTOs
    #[arg(long)]
    pub cart: bool,
}
