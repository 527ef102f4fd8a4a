//! Configuration management for molecule builds
//!
//! This module handles the YAML configuration structures, their defaults,
//! and the merge with command-line overrides.

mod args;

pub use args::Args;

use mole::{AtomInput, BasisInput, EcpInput, Mole, MoleResult, NucModSpec, NucModel, Unit};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub geometry: AtomInput,
    pub unit: Option<Unit>,
    pub basis: BasisInput,
    pub ecp: Option<EcpInput>,
    pub nucmod: Option<NucModSpec>,
    pub charge: Option<i32>,
    pub spin: Option<i32>,
    pub cart: Option<bool>,
    pub basis_dir: Option<String>,
    pub checkpoint: Option<CheckpointParams>,
}

/// Files written after a successful build
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct CheckpointParams {
    pub json: Option<String>,
    pub pickle: Option<String>,
    pub tables: Option<String>,
}

impl Config {
    /// Apply default values to any missing parameters
    pub fn with_defaults(mut self) -> Self {
        if self.unit.is_none() {
            self.unit = Some(Unit::Angstrom);
        }
        if self.ecp.is_none() {
            self.ecp = Some(EcpInput::default());
        }
        if self.nucmod.is_none() {
            self.nucmod = Some(NucModSpec::default());
        }
        if self.charge.is_none() {
            self.charge = Some(0);
        }
        if self.spin.is_none() {
            self.spin = Some(0);
        }
        if self.cart.is_none() {
            self.cart = Some(false);
        }
        if self.checkpoint.is_none() {
            self.checkpoint = Some(CheckpointParams::default());
        }
        self
    }

    /// Command-line values take precedence over the file.
    pub fn apply_args(mut self, args: &Args) -> MoleResult<Self> {
        if let Some(charge) = args.charge {
            self.charge = Some(charge);
        }
        if let Some(spin) = args.spin {
            self.spin = Some(spin);
        }
        if let Some(unit) = &args.unit {
            self.unit = Some(unit.parse()?);
        }
        if let Some(model) = &args.nucmod {
            let mut nucmod = self.nucmod.take().unwrap_or_default();
            nucmod.default = Some(model.parse::<NucModel>()?);
            self.nucmod = Some(nucmod);
        }
        if args.cart {
            self.cart = Some(true);
        }
        if args.basis_dir.is_some() {
            self.basis_dir = args.basis_dir.clone();
        }
        let mut checkpoint = self.checkpoint.take().unwrap_or_default();
        if args.dump.is_some() {
            checkpoint.json = args.dump.clone();
        }
        if args.pickle.is_some() {
            checkpoint.pickle = args.pickle.clone();
        }
        if args.tables.is_some() {
            checkpoint.tables = args.tables.clone();
        }
        self.checkpoint = Some(checkpoint);
        Ok(self)
    }

    /// Unbuilt molecule described by this configuration
    pub fn to_mole(&self) -> Mole {
        Mole::new(self.geometry.clone(), self.basis.clone())
            .with_unit(self.unit.unwrap_or_default())
            .with_ecp(self.ecp.clone().unwrap_or_default())
            .with_nucmod(self.nucmod.clone().unwrap_or_default())
            .with_charge(self.charge.unwrap_or(0))
            .with_spin(self.spin.unwrap_or(0))
            .with_cart(self.cart.unwrap_or(false))
    }

    pub fn checkpoint(&self) -> CheckpointParams {
        self.checkpoint.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use mole::{BasisSpec, NucWidth};

    const WATER: &str = r#"
geometry: |
  O 0 0 0.1173
  H 0 0.7572 -0.4692
  H 0 -0.7572 -0.4692
unit: Angstrom
basis:
  O: sto-3g
  H:
    - l: 0
      primitives:
        - [3.42525091, 0.15432897]
        - [0.62391373, 0.53532814]
        - [0.16885540, 0.44463454]
nucmod:
  default: Gaussian
checkpoint:
  json: water.json
"#;

    #[test]
    fn test_parse_yaml_config() {
        let config: Config = serde_yml::from_str::<Config>(WATER).unwrap().with_defaults();
        assert!(matches!(config.geometry, AtomInput::Text(_)));
        assert_eq!(config.unit, Some(Unit::Angstrom));
        match &config.basis {
            BasisInput::PerAtom(map) => {
                assert_eq!(map["O"], BasisSpec::Named("sto-3g".to_string()));
                assert!(matches!(map["H"], BasisSpec::Items(_)));
            }
            other => panic!("expected per-atom basis, got {:?}", other),
        }
        assert_eq!(config.nucmod.as_ref().and_then(|n| n.default), Some(NucModel::Gaussian));
        assert_eq!(config.charge, Some(0));
        assert_eq!(config.checkpoint().json.as_deref(), Some("water.json"));
        assert_eq!(config.checkpoint().pickle, None);
    }

    #[test]
    fn test_args_override_config() {
        let config: Config = serde_yml::from_str::<Config>(WATER).unwrap().with_defaults();
        let args = Args::parse_from(["molenv", "--charge", "1", "--spin", "1", "--unit", "bohr", "--pickle", "w.pkl"]);
        let config = config.apply_args(&args).unwrap();
        assert_eq!(config.charge, Some(1));
        assert_eq!(config.spin, Some(1));
        assert_eq!(config.unit, Some(Unit::Bohr));
        assert_eq!(config.checkpoint().json.as_deref(), Some("water.json"));
        assert_eq!(config.checkpoint().pickle.as_deref(), Some("w.pkl"));

        let mol = config.to_mole();
        assert_eq!(mol.charge, 1);
        assert_eq!(mol.unit, Unit::Bohr);
    }

    #[test]
    fn test_nucmod_switch() {
        let config: Config = serde_yml::from_str::<Config>(WATER).unwrap().with_defaults();
        let args = Args::parse_from(["molenv", "--nucmod", "point"]);
        let config = config.apply_args(&args).unwrap();
        assert_eq!(config.nucmod.as_ref().and_then(|n| n.default), Some(NucModel::Point));

        let config: Config = serde_yml::from_str::<Config>(WATER).unwrap();
        let args = Args::parse_from(["molenv", "--nucmod", "2"]);
        let mol = config.apply_args(&args).unwrap().to_mole();
        assert_eq!(mol.nucmod.default, Some(NucModel::Gaussian));
    }

    #[test]
    fn test_nucmod_from_yaml() {
        let yaml = "geometry: H 0 0 0; H 0 0 0.74\nbasis: sto-3g\nnucmod:\n  by_atom:\n    1: Gaussian\n  width: Filatov\n";
        let config: Config = serde_yml::from_str(yaml).unwrap();
        let nucmod = config.nucmod.unwrap();
        assert_eq!(nucmod.by_atom.get(&1), Some(&NucModel::Gaussian));
        assert_eq!(nucmod.width, NucWidth::Filatov);
        assert_eq!(nucmod.default, None);
    }

    #[test]
    fn test_bad_unit_rejected() {
        let config: Config = serde_yml::from_str::<Config>(WATER).unwrap();
        let args = Args::parse_from(["molenv", "--unit", "furlong"]);
        assert!(config.apply_args(&args).is_err());
    }
}
