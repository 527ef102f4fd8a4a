//! Nuclear charge distribution models.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::{LIGHT_SPEED, NUC_GAUSS, NUC_POINT};
use crate::element::{canonical_key, AtomSymbol};
use crate::error::MoleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NucModel {
    #[default]
    Point,
    Gaussian,
}

impl NucModel {
    /// Value stored in the `NUC_MOD_OF` slot.
    pub fn tag(self) -> i32 {
        match self {
            NucModel::Point => NUC_POINT,
            NucModel::Gaussian => NUC_GAUSS,
        }
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            NUC_POINT => Some(NucModel::Point),
            NUC_GAUSS => Some(NucModel::Gaussian),
            _ => None,
        }
    }

    /// Integer switch: zero selects the point model, anything else the Gaussian one.
    pub fn from_switch(v: i64) -> Self {
        if v != 0 {
            NucModel::Gaussian
        } else {
            NucModel::Point
        }
    }
}

impl FromStr for NucModel {
    type Err = MoleError;

    /// Any string mentioning "G" ("G", "gauss", "gaussian_nuc") selects the
    /// Gaussian model.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(v) = s.parse::<i64>() {
            return Ok(NucModel::from_switch(v));
        }
        if s.to_uppercase().contains('G') {
            Ok(NucModel::Gaussian)
        } else {
            Ok(NucModel::Point)
        }
    }
}

/// Formula for the Gaussian nuclear width stored in every atom slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NucWidth {
    /// From the atomic mass, see [`dyall_nuc_mod`].
    #[default]
    Dyall,
    /// From the nuclear charge, see [`filatov_nuc_mod`].
    Filatov,
}

impl NucWidth {
    /// Ghost atoms have no nucleus; they keep the mass based value.
    pub fn zeta(self, symbol: &AtomSymbol) -> f64 {
        match self {
            NucWidth::Filatov if symbol.charge() > 0 => filatov_nuc_mod(symbol.charge()),
            _ => dyall_nuc_mod(symbol.mass()),
        }
    }
}

/// Per-build nuclear model selection.
///
/// Precedence: atom number, exact label, element-only label, global default.
/// Atom numbers count from 1, so `by_atom[1]` is the first atom.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NucModSpec {
    #[serde(default)]
    pub default: Option<NucModel>,
    #[serde(default)]
    pub by_atom: BTreeMap<usize, NucModel>,
    #[serde(default)]
    pub by_label: BTreeMap<String, NucModel>,
    #[serde(default)]
    pub width: NucWidth,
}

impl NucModSpec {
    pub fn all(model: NucModel) -> Self {
        NucModSpec {
            default: Some(model),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_atom.is_empty() && self.by_label.is_empty()
    }

    /// Same selection with label keys in canonical form.
    pub fn canonical(&self) -> Self {
        NucModSpec {
            default: self.default,
            by_atom: self.by_atom.clone(),
            by_label: self
                .by_label
                .iter()
                .map(|(k, v)| (canonical_key(k), *v))
                .collect(),
            width: self.width,
        }
    }

    /// Model of the atom at position `index` (0-based) of the geometry.
    /// Expects a spec already passed through [`NucModSpec::canonical`].
    pub fn resolve(&self, index: usize, symbol: &AtomSymbol) -> NucModel {
        if let Some(m) = self.by_atom.get(&(index + 1)) {
            return *m;
        }
        if let Some(m) = self.by_label.get(&symbol.label()) {
            return *m;
        }
        if let Some(m) = self.by_label.get(&symbol.pure_label()) {
            return *m;
        }
        self.default.unwrap_or_default()
    }
}

/// Gaussian nuclear width parameter zeta for rho(r) = Z Norm exp(-zeta r^2).
///
/// Ref. L. Visscher and K. Dyall, At. Data Nucl. Data Tables, 67, 207 (1997)
pub fn dyall_nuc_mod(mass: f64) -> f64 {
    let r = (0.836 * mass.powf(1.0 / 3.0) + 0.570) / 52917.7249;
    1.5 / (r * r)
}

/// Ref. M. Filatov and D. Cremer, Theor. Chem. Acc. 108, 168 (2002)
pub fn filatov_nuc_mod(nuc_charge: i32) -> f64 {
    filatov_nuc_mod_with(nuc_charge, LIGHT_SPEED)
}

pub fn filatov_nuc_mod_with(nuc_charge: i32, c: f64) -> f64 {
    let z = nuc_charge as f64;
    let r = (-0.263188 * z + 106.016974 + 138.985999 / z) / (c * c);
    1.0 / (r * r)
}
