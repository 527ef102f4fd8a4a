//! Integration tests for the molenv binary
//!
//! These tests run the CLI on the example YAML files and read back the
//! checkpoints it writes.

use std::path::PathBuf;
use std::process::Command;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use mole::Mole;

    /// Helper function to get the path to example files
    fn example_path(filename: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("example")
            .join(filename)
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("molenv-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_h2o_dump() {
        let config_path = example_path("h2o.yaml");
        let dir = scratch_dir("h2o");
        let json = dir.join("h2o.json");
        let log = dir.join("h2o.log");

        let status = Command::new(env!("CARGO_BIN_EXE_molenv"))
            .arg("--config-file")
            .arg(&config_path)
            .arg("--output")
            .arg(&log)
            .arg("--dump")
            .arg(&json)
            .status()
            .unwrap();
        assert!(status.success());

        let mol = Mole::loads(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert!(mol.is_built());
        assert_eq!(mol.natm(), 3);
        assert_eq!(mol.nbas(), 5);
        assert_eq!(mol.nao_nr(), 7);
        assert_eq!(mol.nelectron(), 10);
        assert!(mol.energy_nuc() > 9.0 && mol.energy_nuc() < 9.3);

        let log_text = std::fs::read_to_string(&log).unwrap();
        assert!(log_text.contains("Nuclear repulsion"));
        assert!(log_text.contains("Z-matrix"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_nucmod_override() {
        let dir = scratch_dir("nucmod");
        let json = dir.join("h2o.json");
        let status = Command::new(env!("CARGO_BIN_EXE_molenv"))
            .arg("--config-file")
            .arg(example_path("h2o.yaml"))
            .arg("--output")
            .arg(dir.join("nucmod.log"))
            .arg("--dump")
            .arg(&json)
            .arg("--nucmod")
            .arg("gaussian")
            .status()
            .unwrap();
        assert!(status.success());

        let mol = Mole::loads(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert!(mol.atm().iter().all(|a| a[mole::consts::NUC_MOD_OF] == mole::consts::NUC_GAUSS));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_spin_override_rejected() {
        let dir = scratch_dir("spin");
        let status = Command::new(env!("CARGO_BIN_EXE_molenv"))
            .arg("--config-file")
            .arg(example_path("h2o.yaml"))
            .arg("--output")
            .arg(dir.join("spin.log"))
            .arg("--spin")
            .arg("1")
            .status()
            .unwrap();
        assert!(!status.success());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
