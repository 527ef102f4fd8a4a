//! Effective core potentials.
//!
//! An ECP replaces `nelec` core electrons of an atom. Its data is a list of
//! blocks, one per projector angular momentum (`-1` for the local term),
//! each holding `(exponent, coefficient)` terms grouped by radial power.
//! Every non-empty radial group becomes one record of the `ecpbas` table:
//!
//! ```text
//! [ATOM_OF, l, nterms, radial power, 0, PTR_EXP, PTR_COEFF, 0]
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::basis::{BasisLoader, DEFAULT_KEY};
use crate::consts::*;
use crate::element::{canonical_key, AtomSymbol};
use crate::env::{slot, EnvWriter};
use crate::error::{BuildWarning, MoleError, MoleResult};
use crate::geometry::FormattedAtom;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcpBlock {
    pub l: i32,
    /// `terms[r]` are the `(exponent, coefficient)` pairs multiplying `r^r`.
    pub terms: Vec<Vec<(f64, f64)>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EcpData {
    pub nelec: i32,
    pub blocks: Vec<EcpBlock>,
}

impl EcpData {
    /// Number of `ecpbas` records this data produces.
    pub fn nrecords(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.terms.iter().filter(|t| !t.is_empty()).count())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EcpSpec {
    Named(String),
    Data(EcpData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EcpInput {
    Global(String),
    PerAtom(BTreeMap<String, EcpSpec>),
}

impl Default for EcpInput {
    fn default() -> Self {
        EcpInput::PerAtom(BTreeMap::new())
    }
}

impl EcpInput {
    pub fn is_empty(&self) -> bool {
        match self {
            EcpInput::Global(name) => name.trim().is_empty(),
            EcpInput::PerAtom(map) => map.is_empty(),
        }
    }
}

fn load_named(
    name: &str,
    label: &str,
    element: &str,
    loader: &dyn BasisLoader,
    warnings: &mut Vec<BuildWarning>,
) -> MoleResult<Option<EcpData>> {
    match loader.load_ecp(name, element)? {
        Some(data) => Ok(Some(data)),
        None => {
            let w = BuildWarning::EcpNotFound {
                name: name.to_string(),
                label: label.to_string(),
            };
            warn!("{}", w);
            warnings.push(w);
            Ok(None)
        }
    }
}

fn expand_for_all(
    name: &str,
    symbols: &[AtomSymbol],
    loader: &dyn BasisLoader,
    resolved: &mut BTreeMap<String, EcpData>,
    warnings: &mut Vec<BuildWarning>,
) -> MoleResult<()> {
    for sym in symbols.iter().filter(|s| !s.is_ghost) {
        if resolved.contains_key(&sym.element) {
            continue;
        }
        if let Some(data) = load_named(name, &sym.element, &sym.element, loader, warnings)? {
            resolved.insert(sym.element.clone(), data);
        }
    }
    Ok(())
}

/// Resolve the ECP input into `canonical label -> data`. Ghost atoms are
/// never assigned an ECP.
pub fn resolve_ecp(
    input: &EcpInput,
    symbols: &[AtomSymbol],
    loader: &dyn BasisLoader,
) -> MoleResult<(BTreeMap<String, EcpData>, Vec<BuildWarning>)> {
    let mut resolved = BTreeMap::new();
    let mut warnings = Vec::new();

    match input {
        EcpInput::Global(name) => {
            if !name.trim().is_empty() {
                expand_for_all(name, symbols, loader, &mut resolved, &mut warnings)?;
            }
        }
        EcpInput::PerAtom(map) => {
            if let Some(EcpSpec::Named(name)) = map.get(DEFAULT_KEY) {
                expand_for_all(name, symbols, loader, &mut resolved, &mut warnings)?;
            }
            for (key, spec) in map.iter().filter(|(k, _)| k.as_str() != DEFAULT_KEY) {
                let label = canonical_key(key);
                let sym = AtomSymbol::parse(&label)?;
                if sym.is_ghost {
                    debug!("ECP entry {} ignored for ghost atom", key);
                    continue;
                }
                let data = match spec {
                    EcpSpec::Data(d) => Some(d.clone()),
                    EcpSpec::Named(name) => load_named(name, &label, &sym.element, loader, &mut warnings)?,
                };
                if let Some(d) = data {
                    resolved.insert(label, d);
                }
            }
        }
    }
    Ok((resolved, warnings))
}

fn ecp_lookup<'a>(symbol: &AtomSymbol, ecp: &'a BTreeMap<String, EcpData>) -> Option<(String, &'a EcpData)> {
    symbol
        .ecp_candidates()
        .into_iter()
        .find_map(|k| ecp.get(&k).map(|d| (k, d)))
}

/// Records and env data of one ECP, laid out from `ptr`. Within a radial
/// group terms keep their input order.
fn encode_ecp(data: &EcpData, ptr: usize) -> MoleResult<(Vec<BasRecord>, Vec<f64>)> {
    let mut recs = Vec::with_capacity(data.nrecords());
    let mut env = Vec::new();
    for block in &data.blocks {
        for (rorder, terms) in block.terms.iter().enumerate() {
            if terms.is_empty() {
                continue;
            }
            let ptr_exp = ptr + env.len();
            env.extend(terms.iter().map(|t| t.0));
            let ptr_coeff = ptr + env.len();
            env.extend(terms.iter().map(|t| t.1));

            let mut rec: BasRecord = [0; BAS_SLOTS];
            rec[ANG_OF] = block.l;
            rec[NPRIM_OF] = slot(terms.len(), "NPRIM_OF")?;
            rec[RADI_POWER] = slot(rorder, "RADI_POWER")?;
            rec[PTR_EXP] = slot(ptr_exp, "PTR_EXP")?;
            rec[PTR_COEFF] = slot(ptr_coeff, "PTR_COEFF")?;
            recs.push(rec);
        }
    }
    Ok((recs, env))
}

/// Append ECP data to `env` and return the `ecpbas` table.
///
/// Each matched atom has its `CHARGE_OF` reduced by the number of core
/// electrons the ECP replaces. Data is written once per ECP label, in order
/// of first use.
pub fn make_ecp_env(
    atm: &mut [AtmRecord],
    atoms: &[FormattedAtom],
    ecp: &BTreeMap<String, EcpData>,
    writer: &mut EnvWriter,
) -> MoleResult<Vec<BasRecord>> {
    if atm.len() != atoms.len() {
        return Err(MoleError::InvalidParameter {
            name: "atm",
            reason: format!("{} atom records for {} atoms", atm.len(), atoms.len()),
        });
    }
    let mut templates: HashMap<String, Vec<BasRecord>> = HashMap::new();
    let mut ecpbas = Vec::new();

    for (ia, atom) in atoms.iter().enumerate() {
        let Some((key, data)) = ecp_lookup(&atom.symbol, ecp) else {
            continue;
        };
        let z = atom.symbol.atomic_number();
        if data.nelec < 0 || data.nelec > z {
            return Err(MoleError::InvalidParameter {
                name: "nelec",
                reason: format!("ECP of {} removes {} electrons from Z = {}", key, data.nelec, z),
            });
        }
        atm[ia][CHARGE_OF] = z - data.nelec;

        if !templates.contains_key(&key) {
            let (recs, env) = encode_ecp(data, writer.ptr())?;
            writer.push_slice(&env);
            templates.insert(key.clone(), recs);
        }
        let atom_of = slot(ia, "ATOM_OF")?;
        if let Some(recs) = templates.get(&key) {
            ecpbas.extend(recs.iter().map(|r| {
                let mut r = *r;
                r[ATOM_OF] = atom_of;
                r
            }));
        }
    }
    Ok(ecpbas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{InlineLibrary, NoLoader};
    use nalgebra::Vector3;

    fn na_ecp() -> EcpData {
        EcpData {
            nelec: 10,
            blocks: vec![
                EcpBlock {
                    l: ECP_LOCAL,
                    terms: vec![vec![], vec![], vec![(1.0, 0.0)]],
                },
                EcpBlock {
                    l: 0,
                    terms: vec![vec![(2.0, -3.3), (8.9, -18.4)], vec![], vec![(0.5, 1.2)]],
                },
            ],
        }
    }

    fn atoms(labels: &[&str]) -> Vec<FormattedAtom> {
        labels
            .iter()
            .enumerate()
            .map(|(i, l)| FormattedAtom {
                symbol: AtomSymbol::parse(l).unwrap(),
                coord: Vector3::new(i as f64, 0.0, 0.0),
            })
            .collect()
    }

    #[test]
    fn test_make_ecp_env() {
        let atoms = atoms(&["Na", "H", "Na1"]);
        let mut atm: Vec<AtmRecord> = vec![[11, 20, 1, 23, 0, 0], [1, 24, 1, 27, 0, 0], [11, 28, 1, 31, 0, 0]];
        let mut ecp = BTreeMap::new();
        ecp.insert("Na".to_string(), na_ecp());
        let mut writer = EnvWriter::new(&[0.0; 32]);
        let ecpbas = make_ecp_env(&mut atm, &atoms, &ecp, &mut writer).unwrap();

        assert_eq!(atm[0][CHARGE_OF], 1);
        assert_eq!(atm[1][CHARGE_OF], 1);
        assert_eq!(atm[2][CHARGE_OF], 1);
        assert_eq!(ecpbas.len(), 6);
        assert_eq!(ecpbas[0], [0, -1, 1, 2, 0, 32, 33, 0]);
        assert_eq!(ecpbas[1], [0, 0, 2, 0, 0, 34, 36, 0]);
        assert_eq!(ecpbas[2], [0, 0, 1, 2, 0, 38, 39, 0]);
        assert_eq!(ecpbas[3][ATOM_OF], 2);
        assert_eq!(ecpbas[3][PTR_EXP], 32);
        // input order, not sorted by exponent
        assert_eq!(&writer.env()[34..38], &[2.0, 8.9, -3.3, -18.4]);
        assert_eq!(writer.ptr(), 40);
    }

    #[test]
    fn test_ecp_too_many_core_electrons() {
        let atoms = atoms(&["H"]);
        let mut atm: Vec<AtmRecord> = vec![[1, 20, 1, 23, 0, 0]];
        let mut ecp = BTreeMap::new();
        ecp.insert("H".to_string(), na_ecp());
        let mut writer = EnvWriter::new(&[]);
        assert!(make_ecp_env(&mut atm, &atoms, &ecp, &mut writer).is_err());
    }

    #[test]
    fn test_resolve_ecp() {
        let mut lib = InlineLibrary::new();
        lib.insert_ecp("lanl2dz", "Na", na_ecp());
        let symbols: Vec<AtomSymbol> = ["Na", "GHOST-Na", "H"]
            .iter()
            .map(|s| AtomSymbol::parse(s).unwrap())
            .collect();

        let (resolved, warnings) = resolve_ecp(&EcpInput::Global("LANL2DZ".to_string()), &symbols, &lib).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["Na"].nelec, 10);
        assert_eq!(
            warnings,
            vec![BuildWarning::EcpNotFound { name: "LANL2DZ".to_string(), label: "H".to_string() }]
        );

        let mut map = BTreeMap::new();
        map.insert("na1".to_string(), EcpSpec::Data(na_ecp()));
        map.insert("ghost-na".to_string(), EcpSpec::Data(na_ecp()));
        let (resolved, warnings) = resolve_ecp(&EcpInput::PerAtom(map), &symbols, &NoLoader).unwrap();
        assert_eq!(resolved.keys().collect::<Vec<_>>(), vec!["Na1"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_ecp_input_from_json() {
        let input: EcpInput = serde_json::from_str(r#""lanl2dz""#).unwrap();
        assert_eq!(input, EcpInput::Global("lanl2dz".to_string()));
        let json = r#"{"Cu": {"nelec": 10, "blocks": [{"l": -1, "terms": [[], [[1.5, 2.0]]]}]}}"#;
        let input: EcpInput = serde_json::from_str(json).unwrap();
        match input {
            EcpInput::PerAtom(map) => match &map["Cu"] {
                EcpSpec::Data(d) => assert_eq!(d.nrecords(), 1),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        assert!(EcpInput::default().is_empty());
    }
}
