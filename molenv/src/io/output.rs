//! Output formatting and logging utilities

use color_eyre::eyre::{eyre, Result, WrapErr};
use mole::Mole;
use std::fs::File;
use std::io::Write;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::Uptime;

/// Send log records to `output_path`, or to stdout when none is given.
/// Timestamps count seconds since the program started.
pub fn setup_output(output_path: Option<&str>) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_timer(Uptime::default())
        .with_target(false);
    match output_path {
        Some(path) => {
            let log = File::create(path).wrap_err_with(|| format!("Could not create output file: {}", path))?;
            builder
                .with_writer(Mutex::new(log))
                .with_ansi(false)
                .try_init()
                .map_err(|e| eyre!("Could not install logger: {}", e))?;
            info!("Output will be written to: {}", path);
        }
        None => {
            builder
                .with_writer(std::io::stdout)
                .try_init()
                .map_err(|e| eyre!("Could not install logger: {}", e))?;
        }
    }
    Ok(())
}

/// Log the size of the built environment and any build warnings
pub fn log_summary(mol: &Mole) {
    info!("Molecule summary:");
    info!("  Atoms: {}", mol.natm());
    for (ia, atom) in mol.atoms().iter().enumerate() {
        info!(
            "    {:3} {:<8} [{:12.6}, {:12.6}, {:12.6}] bohr",
            ia + 1,
            atom.symbol.raw,
            atom.coord.x,
            atom.coord.y,
            atom.coord.z
        );
    }
    let (na, nb) = mol.nelec();
    info!("  Shells: {} (ECP records: {})", mol.nbas(), mol.ecpbas().len());
    info!("  AOs: {} (cartesian {}, spinor {})", mol.nao_nr(), mol.nao_cart(), mol.nao_2c());
    info!("  Electrons: {} (alpha {}, beta {})", mol.nelectron(), na, nb);
    info!("  Nuclear repulsion: {:.10} au", mol.energy_nuc());
    if let Ok(zmat) = mol.zmatrix() {
        info!("  Z-matrix (bohr, degrees):");
        for line in zmat.lines() {
            info!("    {}", line);
        }
    }
    info!("  env length: {}", mol.env().len());
    for w in mol.warnings() {
        warn!("  {}", w);
    }
}

/// Print the atm, bas, ecpbas and env tables to a writer
pub fn print_tables<W: Write>(writer: &mut W, mol: &Mole) -> Result<()> {
    writeln!(writer, "atm ({} x 6):", mol.natm())?;
    for rec in mol.atm() {
        writeln!(writer, "  {:?}", rec)?;
    }
    writeln!(writer, "bas ({} x 8):", mol.nbas())?;
    for rec in mol.bas() {
        writeln!(writer, "  {:?}", rec)?;
    }
    if mol.has_ecp() {
        writeln!(writer, "ecpbas ({} x 8):", mol.ecpbas().len())?;
        for rec in mol.ecpbas() {
            writeln!(writer, "  {:?}", rec)?;
        }
    }
    writeln!(writer, "env ({}):", mol.env().len())?;
    for (i, v) in mol.env().iter().enumerate() {
        writeln!(writer, "  {:5} {:.16e}", i, v)?;
    }
    Ok(())
}
