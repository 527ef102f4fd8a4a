//! Checkpoint files of a built molecule

use crate::config::CheckpointParams;
use crate::io::print_tables;
use color_eyre::eyre::{Result, WrapErr};
use mole::Mole;
use std::fs::{self, File};
use tracing::info;

pub fn write_checkpoints(mol: &Mole, checkpoint: &CheckpointParams) -> Result<()> {
    if let Some(path) = &checkpoint.json {
        let json = mol.dumps().wrap_err("Failed to serialize molecule to JSON")?;
        fs::write(path, json).wrap_err_with(|| format!("Unable to write {}", path))?;
        info!("Molecule written to {}", path);
    }
    if let Some(path) = &checkpoint.pickle {
        mol.save_pickle(path)
            .wrap_err_with(|| format!("Unable to write pickle {}", path))?;
        info!("Molecule pickled to {}", path);
    }
    if let Some(path) = &checkpoint.tables {
        let mut file = File::create(path).wrap_err_with(|| format!("Unable to create {}", path))?;
        print_tables(&mut file, mol)?;
        info!("Tables written to {}", path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mole::{BasisInput, BasisSpec, ShellSpec};

    #[test]
    fn test_write_and_reload_checkpoints() {
        let dir = std::env::temp_dir().join(format!("molenv-ckpt-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let json = dir.join("h2.json");
        let pickle = dir.join("h2.pkl");

        let basis = BasisInput::Global(BasisSpec::from(vec![ShellSpec::new(0, vec![vec![1.0, 1.0]])]));
        let mut mol = Mole::new("H 0 0 0; H 0 0 0.74", basis);
        mol.build().unwrap();

        let checkpoint = CheckpointParams {
            json: Some(json.display().to_string()),
            pickle: Some(pickle.display().to_string()),
            tables: None,
        };
        write_checkpoints(&mol, &checkpoint).unwrap();

        let from_json = Mole::loads(&fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(from_json.env(), mol.env());
        let from_pickle = Mole::load_pickle(&pickle).unwrap();
        assert_eq!(from_pickle.bas(), mol.bas());

        fs::remove_dir_all(&dir).unwrap();
    }
}
