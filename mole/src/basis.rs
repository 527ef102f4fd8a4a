//! Basis-set input.
//!
//! Users describe a basis either globally (one name or shell list for every
//! atom) or per atom label. Both forms are resolved once, at the start of a
//! build, into a uniform map `label -> Vec<ShellSpec>`.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ecp::EcpData;
use crate::element::{canonical_key, AtomSymbol};
use crate::error::{MoleError, MoleResult};
use crate::nwchem::{parse_nwchem, parse_nwchem_ecp};

/// One basis entry: a shell of angular momentum `l` sharing one set of
/// primitive exponents. Each primitive row is `[exponent, c_1, c_2, ...]`,
/// one coefficient per contracted function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellSpec {
    pub l: i32,
    #[serde(default)]
    pub kappa: i32,
    pub primitives: Vec<Vec<f64>>,
}

impl ShellSpec {
    pub fn new(l: i32, primitives: Vec<Vec<f64>>) -> Self {
        ShellSpec { l, kappa: 0, primitives }
    }

    pub fn with_kappa(mut self, kappa: i32) -> Self {
        self.kappa = kappa;
        self
    }

    /// Build from separate exponents and an `nprim x nctr` coefficient matrix.
    pub fn from_matrix(l: i32, exps: &[f64], coeffs: &DMatrix<f64>) -> Self {
        let primitives = exps
            .iter()
            .enumerate()
            .map(|(p, &e)| {
                let mut row = Vec::with_capacity(coeffs.ncols() + 1);
                row.push(e);
                row.extend(coeffs.row(p).iter().copied());
                row
            })
            .collect();
        ShellSpec::new(l, primitives)
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn nprim(&self) -> usize {
        self.primitives.len()
    }

    pub fn nctr(&self) -> usize {
        self.primitives.first().map(|r| r.len().saturating_sub(1)).unwrap_or(0)
    }

    pub fn exponents(&self) -> Vec<f64> {
        self.primitives.iter().map(|r| r[0]).collect()
    }

    /// `nprim x nctr` coefficient matrix. Call [`ShellSpec::validate`] first.
    pub fn coeff_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.nprim(), self.nctr(), |p, i| self.primitives[p][i + 1])
    }

    /// Reject shapes that cannot form a coefficient matrix: rows without a
    /// coefficient, rows of different length, non-positive exponents.
    pub fn validate(&self, symbol: &str) -> MoleResult<()> {
        if self.l < 0 {
            return Err(MoleError::InvalidAngularMomentum(self.l));
        }
        let width = match self.primitives.first() {
            Some(row) => row.len(),
            None => return Ok(()),
        };
        if width < 2 {
            return Err(MoleError::MalformedBasis {
                symbol: symbol.to_string(),
                reason: format!("l = {} primitive row has no contraction coefficient", self.l),
            });
        }
        for (p, row) in self.primitives.iter().enumerate() {
            if row.len() != width {
                return Err(MoleError::MalformedBasis {
                    symbol: symbol.to_string(),
                    reason: format!(
                        "l = {} primitive {} has {} columns, expected {}",
                        self.l,
                        p,
                        row.len(),
                        width
                    ),
                });
            }
            if !(row[0] > 0.0) || !row.iter().all(|v| v.is_finite()) {
                return Err(MoleError::MalformedBasis {
                    symbol: symbol.to_string(),
                    reason: format!("l = {} primitive {} has invalid values {:?}", self.l, p, row),
                });
            }
        }
        Ok(())
    }
}

/// Split every primitive into its own single-coefficient shell.
pub fn uncontract_basis(shells: &[ShellSpec]) -> Vec<ShellSpec> {
    shells
        .iter()
        .flat_map(|s| {
            s.primitives
                .iter()
                .map(move |p| ShellSpec::new(s.l, vec![vec![p[0], 1.0]]).with_kappa(s.kappa))
        })
        .collect()
}

/// Even-tempered shells with exponents alpha * beta^i, i = n-1 .. 0.
pub fn expand_etb(l: i32, n: usize, alpha: f64, beta: f64) -> Vec<ShellSpec> {
    (0..n)
        .rev()
        .map(|i| ShellSpec::new(l, vec![vec![alpha * beta.powi(i as i32), 1.0]]))
        .collect()
}

pub fn expand_etbs(etbs: &[(i32, usize, f64, f64)]) -> Vec<ShellSpec> {
    etbs.iter()
        .flat_map(|&(l, n, alpha, beta)| expand_etb(l, n, alpha, beta))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BasisItem {
    Named(String),
    Shell(ShellSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BasisSpec {
    Named(String),
    Items(Vec<BasisItem>),
}

impl From<&str> for BasisSpec {
    fn from(name: &str) -> Self {
        BasisSpec::Named(name.to_string())
    }
}

impl From<Vec<ShellSpec>> for BasisSpec {
    fn from(shells: Vec<ShellSpec>) -> Self {
        BasisSpec::Items(shells.into_iter().map(BasisItem::Shell).collect())
    }
}

/// The key of a per-atom map that applies to every atom without its own entry.
pub const DEFAULT_KEY: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BasisInput {
    Global(BasisSpec),
    PerAtom(BTreeMap<String, BasisSpec>),
}

impl Default for BasisInput {
    fn default() -> Self {
        BasisInput::PerAtom(BTreeMap::new())
    }
}

/// Source of named basis sets (and ECPs).
pub trait BasisLoader: Send + Sync {
    fn load(&self, name: &str, element: &str) -> MoleResult<Option<Vec<ShellSpec>>>;

    fn load_ecp(&self, _name: &str, _element: &str) -> MoleResult<Option<EcpData>> {
        Ok(None)
    }
}

/// Loader that knows no named basis: only explicit shells can be used.
pub struct NoLoader;

impl BasisLoader for NoLoader {
    fn load(&self, _name: &str, _element: &str) -> MoleResult<Option<Vec<ShellSpec>>> {
        Ok(None)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// In-memory basis and ECP library keyed by (name, element).
#[derive(Debug, Default, Clone)]
pub struct InlineLibrary {
    basis: HashMap<(String, String), Vec<ShellSpec>>,
    ecp: HashMap<(String, String), EcpData>,
}

impl InlineLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, element: &str, shells: Vec<ShellSpec>) -> &mut Self {
        self.basis.insert((normalize_name(name), element.to_string()), shells);
        self
    }

    pub fn insert_ecp(&mut self, name: &str, element: &str, ecp: EcpData) -> &mut Self {
        self.ecp.insert((normalize_name(name), element.to_string()), ecp);
        self
    }

    /// Register every element found in an NWChem formatted text, orbital
    /// basis and ECP sections alike.
    pub fn add_nwchem(&mut self, name: &str, text: &str) -> MoleResult<&mut Self> {
        for (element, shells) in parse_nwchem(text)? {
            self.insert(name, &element, shells);
        }
        for (element, ecp) in parse_nwchem_ecp(text)? {
            self.insert_ecp(name, &element, ecp);
        }
        Ok(self)
    }
}

impl BasisLoader for InlineLibrary {
    fn load(&self, name: &str, element: &str) -> MoleResult<Option<Vec<ShellSpec>>> {
        Ok(self.basis.get(&(normalize_name(name), element.to_string())).cloned())
    }

    fn load_ecp(&self, name: &str, element: &str) -> MoleResult<Option<EcpData>> {
        Ok(self.ecp.get(&(normalize_name(name), element.to_string())).cloned())
    }
}

/// Reads `<dir>/<name>.<element>.nwchem`, e.g. `basis_sets/6-31g.h.nwchem`.
pub struct NwchemDirLoader {
    pub dir: PathBuf,
}

impl NwchemDirLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        NwchemDirLoader { dir: dir.into() }
    }
}

impl NwchemDirLoader {
    fn read(&self, name: &str, element: &str) -> MoleResult<Option<String>> {
        let path = self
            .dir
            .join(format!("{}.{}.nwchem", normalize_name(name), element.to_lowercase()));
        if !path.exists() {
            debug!("No basis file at {}", path.display());
            return Ok(None);
        }
        info!("Loading {} for {} from {}", name, element, path.display());
        Ok(Some(fs::read_to_string(&path)?))
    }
}

impl BasisLoader for NwchemDirLoader {
    fn load(&self, name: &str, element: &str) -> MoleResult<Option<Vec<ShellSpec>>> {
        match self.read(name, element)? {
            Some(text) => Ok(parse_nwchem(&text)?.remove(element)),
            None => Ok(None),
        }
    }

    fn load_ecp(&self, name: &str, element: &str) -> MoleResult<Option<EcpData>> {
        match self.read(name, element)? {
            Some(text) => Ok(parse_nwchem_ecp(&text)?.remove(element)),
            None => Ok(None),
        }
    }
}

fn load_named(name: &str, element: &str, loader: &dyn BasisLoader) -> MoleResult<Vec<ShellSpec>> {
    let lower = normalize_name(name);
    let (base, uncontract) = match lower.strip_prefix("unc") {
        Some(rest) => (rest.trim_start_matches(['-', '_']).to_string(), true),
        None => (lower.clone(), false),
    };
    let shells = loader
        .load(&base, element)?
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MoleError::BasisNotFound {
            name: name.to_string(),
            symbol: element.to_string(),
        })?;
    Ok(if uncontract { uncontract_basis(&shells) } else { shells })
}

fn expand_spec(spec: &BasisSpec, label: &str, loader: &dyn BasisLoader) -> MoleResult<Vec<ShellSpec>> {
    // Named sets are looked up by the bare element, ghost prefix and tags dropped.
    let element = AtomSymbol::parse(label)
        .map(|s| s.element)
        .map_err(|_| MoleError::UnknownElement(label.to_string()))?;

    let shells = match spec {
        BasisSpec::Named(name) => load_named(name, &element, loader)?,
        BasisSpec::Items(items) => {
            let mut shells = Vec::new();
            for item in items {
                match item {
                    BasisItem::Named(name) => shells.extend(load_named(name, &element, loader)?),
                    BasisItem::Shell(s) => shells.push(s.clone()),
                }
            }
            shells
        }
    };

    if shells.is_empty() {
        return Err(MoleError::BasisNotFound {
            name: format!("{:?}", spec),
            symbol: label.to_string(),
        });
    }
    for s in &shells {
        s.validate(label)?;
    }
    Ok(shells)
}

/// Resolve the user basis input into `canonical label -> shells`.
///
/// `labels` are the canonical labels of the atoms of the molecule; a global
/// basis (or a per-atom `default`) is expanded for each of them.
pub fn resolve_basis(
    input: &BasisInput,
    labels: &[String],
    loader: &dyn BasisLoader,
) -> MoleResult<BTreeMap<String, Vec<ShellSpec>>> {
    let mut resolved = BTreeMap::new();
    match input {
        BasisInput::Global(spec) => {
            for label in labels {
                if !resolved.contains_key(label) {
                    resolved.insert(label.clone(), expand_spec(spec, label, loader)?);
                }
            }
        }
        BasisInput::PerAtom(map) => {
            if let Some(default) = map.get(DEFAULT_KEY) {
                for label in labels {
                    if !resolved.contains_key(label) {
                        resolved.insert(label.clone(), expand_spec(default, label, loader)?);
                    }
                }
            }
            for (key, spec) in map.iter().filter(|(k, _)| k.as_str() != DEFAULT_KEY) {
                let label = canonical_key(key);
                resolved.insert(label.clone(), expand_spec(spec, &label, loader)?);
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sto3g_h() -> Vec<ShellSpec> {
        vec![ShellSpec::new(
            0,
            vec![
                vec![3.42525091, 0.15432897],
                vec![0.62391373, 0.53532814],
                vec![0.16885540, 0.44463454],
            ],
        )]
    }

    #[test]
    fn test_shell_shape() {
        let s = ShellSpec::new(1, vec![vec![1.0, 0.1, 0.2], vec![0.5, 0.3, 0.4]]);
        assert_eq!(s.nprim(), 2);
        assert_eq!(s.nctr(), 2);
        assert_eq!(s.exponents(), vec![1.0, 0.5]);
        let m = s.coeff_matrix();
        assert_eq!(m[(1, 0)], 0.3);
        assert_eq!(m[(0, 1)], 0.2);
        assert!(s.validate("C").is_ok());
        assert_eq!(ShellSpec::from_matrix(1, &s.exponents(), &m), s);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let s = ShellSpec::new(0, vec![vec![1.0, 0.1, 0.2], vec![0.5, 0.3]]);
        match s.validate("O1") {
            Err(MoleError::MalformedBasis { symbol, .. }) => assert_eq!(symbol, "O1"),
            other => panic!("expected MalformedBasis, got {:?}", other),
        }
        let s = ShellSpec::new(0, vec![vec![1.0]]);
        assert!(s.validate("O").is_err());
        let s = ShellSpec::new(-1, vec![vec![1.0, 1.0]]);
        assert!(matches!(s.validate("O"), Err(MoleError::InvalidAngularMomentum(-1))));
    }

    #[test]
    fn test_uncontract() {
        let u = uncontract_basis(&sto3g_h());
        assert_eq!(u.len(), 3);
        assert_eq!(u[1].primitives, vec![vec![0.62391373, 1.0]]);
    }

    #[test]
    fn test_expand_etb() {
        let shells = expand_etb(1, 3, 1.5, 2.0);
        let exps: Vec<f64> = shells.iter().map(|s| s.primitives[0][0]).collect();
        assert_eq!(exps, vec![6.0, 3.0, 1.5]);
        assert!(shells.iter().all(|s| s.l == 1));

        let shells = expand_etbs(&[(0, 2, 1.5, 2.0), (1, 2, 1.0, 2.0)]);
        assert_eq!(shells.len(), 4);
        assert_eq!(shells[3].primitives[0][0], 1.0);
    }

    #[test]
    fn test_resolve_global_named() {
        let mut lib = InlineLibrary::new();
        lib.insert("STO-3G", "H", sto3g_h());
        let input = BasisInput::Global("sto-3g".into());
        let labels = vec!["H".to_string(), "H1".to_string(), "GHOST-H".to_string()];
        let resolved = resolve_basis(&input, &labels, &lib).unwrap();
        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved["GHOST-H"], sto3g_h());

        let input = BasisInput::Global("unc-sto-3g".into());
        let resolved = resolve_basis(&input, &labels[..1], &lib).unwrap();
        assert_eq!(resolved["H"].len(), 3);
    }

    #[test]
    fn test_resolve_missing_named_basis() {
        let input = BasisInput::Global("cc-pvdz".into());
        match resolve_basis(&input, &["H".to_string()], &NoLoader) {
            Err(MoleError::BasisNotFound { name, symbol }) => {
                assert_eq!(name, "cc-pvdz");
                assert_eq!(symbol, "H");
            }
            other => panic!("expected BasisNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_per_atom_with_default() {
        let mut lib = InlineLibrary::new();
        lib.insert("sto-3g", "H", sto3g_h());
        lib.insert("sto-3g", "O", sto3g_h());
        let mut map = BTreeMap::new();
        map.insert(DEFAULT_KEY.to_string(), BasisSpec::from("sto-3g"));
        map.insert(
            "h1".to_string(),
            BasisSpec::from(vec![ShellSpec::new(0, vec![vec![1.0, 1.0]])]),
        );
        let labels = vec!["O".to_string(), "H1".to_string()];
        let resolved = resolve_basis(&BasisInput::PerAtom(map), &labels, &lib).unwrap();
        assert_eq!(resolved["O"], sto3g_h());
        assert_eq!(resolved["H1"].len(), 1);
        assert_eq!(resolved["H1"][0].primitives[0][0], 1.0);
    }

    #[test]
    fn test_basis_input_from_yaml_like_json() {
        let json = r#"{"default": "sto-3g", "H": [{"l": 0, "primitives": [[1.0, 1.0]]}, "sto-3g"]}"#;
        let input: BasisInput = serde_json::from_str(json).unwrap();
        match input {
            BasisInput::PerAtom(map) => {
                assert_eq!(map[DEFAULT_KEY], BasisSpec::Named("sto-3g".to_string()));
                match &map["H"] {
                    BasisSpec::Items(items) => assert_eq!(items.len(), 2),
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
        let input: BasisInput = serde_json::from_str(r#""6-31g""#).unwrap();
        assert_eq!(input, BasisInput::Global(BasisSpec::Named("6-31g".to_string())));
    }
}
