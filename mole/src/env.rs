//! Assembly of the `atm`, `bas` and `env` tables.
//!
//! All writes into `env` go through one [`EnvWriter`], so every pointer
//! stored in a record is the writer position at the time its slice was
//! appended. The buffer only grows during a build.

use std::collections::{BTreeMap, HashMap};

use nalgebra::Vector3;
use tracing::{debug, warn};

use crate::basis::ShellSpec;
use crate::consts::*;
use crate::element::AtomSymbol;
use crate::error::{BuildWarning, MoleError, MoleResult};
use crate::geometry::FormattedAtom;
use crate::gto::normalize_contracted;
use crate::nucmod::{NucModSpec, NucWidth};

/// Append-only `env` buffer with its running pointer.
#[derive(Debug, Clone)]
pub struct EnvWriter {
    env: Vec<f64>,
}

impl EnvWriter {
    /// Start from a header; short headers are zero padded to `PTR_ENV_START`.
    pub fn new(pre_env: &[f64]) -> Self {
        let mut env = pre_env.to_vec();
        if env.len() < PTR_ENV_START {
            env.resize(PTR_ENV_START, 0.0);
        }
        EnvWriter { env }
    }

    /// Fresh header: light speed set, everything else zero.
    pub fn with_default_header() -> Self {
        let mut writer = EnvWriter::new(&[]);
        writer.env[PTR_LIGHT_SPEED] = LIGHT_SPEED;
        writer
    }

    pub fn ptr(&self) -> usize {
        self.env.len()
    }

    /// Append `data`, returning the offset it starts at.
    pub fn push_slice(&mut self, data: &[f64]) -> usize {
        let start = self.env.len();
        self.env.extend_from_slice(data);
        start
    }

    /// Set a header slot. Only the header region can be patched in place.
    pub fn set_header(&mut self, index: usize, value: f64) -> MoleResult<()> {
        if index >= PTR_ENV_START {
            return Err(MoleError::OutOfRange {
                what: "env header",
                index,
                len: PTR_ENV_START,
            });
        }
        self.env[index] = value;
        Ok(())
    }

    pub fn env(&self) -> &[f64] {
        &self.env
    }

    pub fn into_env(self) -> Vec<f64> {
        self.env
    }
}

/// Store an offset or count in an `i32` slot.
pub(crate) fn slot(value: usize, name: &'static str) -> MoleResult<i32> {
    i32::try_from(value).map_err(|_| MoleError::InvalidParameter {
        name,
        reason: format!("{} does not fit in an i32 slot", value),
    })
}

/// Atom record and its `[x, y, z, zeta]` slice for an atom whose slice
/// starts at `ptr`.
///
/// The record always carries `NUC_POINT`; callers overriding the nuclear
/// model patch `NUC_MOD_OF` afterwards. The Gaussian width is written either
/// way, computed with `width`.
pub fn make_atm_env(
    symbol: &AtomSymbol,
    coord: &Vector3<f64>,
    width: NucWidth,
    ptr: usize,
) -> MoleResult<(AtmRecord, [f64; 4])> {
    let mut atm: AtmRecord = [0; ATM_SLOTS];
    atm[CHARGE_OF] = symbol.charge();
    atm[PTR_COORD] = slot(ptr, "PTR_COORD")?;
    atm[NUC_MOD_OF] = NUC_POINT;
    atm[PTR_ZETA] = slot(ptr + 3, "PTR_ZETA")?;
    let env = [coord.x, coord.y, coord.z, width.zeta(symbol)];
    Ok((atm, env))
}

/// Shell records for one basis, with their exponent and coefficient data
/// laid out from `ptr`.
///
/// Each shell contributes its exponents followed by its normalized
/// coefficients, contraction-major: all primitives of the first contracted
/// function, then the second. Shells without primitives are skipped.
pub fn make_bas_env(
    shells: &[ShellSpec],
    atom_id: usize,
    ptr: usize,
    label: &str,
) -> MoleResult<(Vec<BasRecord>, Vec<f64>, Vec<BuildWarning>)> {
    let mut bas = Vec::with_capacity(shells.len());
    let mut env = Vec::new();
    let mut warnings = Vec::new();
    let atom_of = slot(atom_id, "ATOM_OF")?;

    for shell in shells {
        if shell.is_empty() {
            let w = BuildWarning::EmptyShell {
                label: label.to_string(),
                l: shell.l,
            };
            warn!("{}", w);
            warnings.push(w);
            continue;
        }
        shell.validate(label)?;
        let exps = shell.exponents();
        let cs = normalize_contracted(shell.l, &exps, &shell.coeff_matrix())?;

        let ptr_exp = ptr + env.len();
        env.extend_from_slice(&exps);
        let ptr_coeff = ptr + env.len();
        // column-major storage of an nprim x nctr matrix is contraction-major
        env.extend_from_slice(cs.as_slice());

        let mut rec: BasRecord = [0; BAS_SLOTS];
        rec[ATOM_OF] = atom_of;
        rec[ANG_OF] = shell.l;
        rec[NPRIM_OF] = slot(shell.nprim(), "NPRIM_OF")?;
        rec[NCTR_OF] = slot(shell.nctr(), "NCTR_OF")?;
        rec[KAPPA_OF] = shell.kappa;
        rec[PTR_EXP] = slot(ptr_exp, "PTR_EXP")?;
        rec[PTR_COEFF] = slot(ptr_coeff, "PTR_COEFF")?;
        bas.push(rec);
    }
    Ok((bas, env, warnings))
}

/// Find the basis entry of an atom. See [`AtomSymbol::basis_candidates`].
pub fn lookup_label<'a, T>(symbol: &AtomSymbol, table: &'a BTreeMap<String, T>) -> Option<(String, &'a T)> {
    symbol
        .basis_candidates()
        .into_iter()
        .find_map(|key| table.get(&key).map(|v| (key, v)))
}

/// Tables produced by [`make_env`]; `env` stays in the writer.
#[derive(Debug, Clone, Default)]
pub struct AtmBasTables {
    pub atm: Vec<AtmRecord>,
    pub bas: Vec<BasRecord>,
    pub warnings: Vec<BuildWarning>,
}

/// Encode atoms and their basis functions.
///
/// Atom slices come first, in input order. Basis data is then written once
/// per basis label in order of first use, and every atom receives a copy of
/// its label's records with `ATOM_OF` set, so shells are grouped by atom.
pub fn make_env(
    atoms: &[FormattedAtom],
    basis: &BTreeMap<String, Vec<ShellSpec>>,
    nucmod: &NucModSpec,
    writer: &mut EnvWriter,
) -> MoleResult<AtmBasTables> {
    let nucmod = nucmod.canonical();
    let mut tables = AtmBasTables::default();

    for (ia, atom) in atoms.iter().enumerate() {
        let (mut rec, slice) = make_atm_env(&atom.symbol, &atom.coord, nucmod.width, writer.ptr())?;
        writer.push_slice(&slice);
        rec[NUC_MOD_OF] = nucmod.resolve(ia, &atom.symbol).tag();
        tables.atm.push(rec);
    }

    let mut templates: HashMap<String, Vec<BasRecord>> = HashMap::new();
    let mut per_atom: Vec<Option<String>> = Vec::with_capacity(atoms.len());
    for (ia, atom) in atoms.iter().enumerate() {
        let Some((key, shells)) = lookup_label(&atom.symbol, basis) else {
            let w = BuildWarning::BasisNotFound {
                atom: ia,
                label: atom.symbol.raw.clone(),
            };
            warn!("{}", w);
            tables.warnings.push(w);
            per_atom.push(None);
            continue;
        };
        if !templates.contains_key(&key) {
            let (recs, data, warnings) = make_bas_env(shells, 0, writer.ptr(), &key)?;
            writer.push_slice(&data);
            debug!("basis {}: {} shells, {} env slots", key, recs.len(), data.len());
            tables.warnings.extend(warnings);
            templates.insert(key.clone(), recs);
        }
        per_atom.push(Some(key));
    }

    for (ia, key) in per_atom.iter().enumerate() {
        let Some(recs) = key.as_ref().and_then(|k| templates.get(k)) else {
            continue;
        };
        let atom_of = slot(ia, "ATOM_OF")?;
        tables.bas.extend(recs.iter().map(|r| {
            let mut r = *r;
            r[ATOM_OF] = atom_of;
            r
        }));
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nucmod::NucModel;

    fn atom(label: &str, x: f64) -> FormattedAtom {
        FormattedAtom {
            symbol: AtomSymbol::parse(label).unwrap(),
            coord: Vector3::new(x, 0.0, 0.0),
        }
    }

    fn s_shell(e: f64) -> ShellSpec {
        ShellSpec::new(0, vec![vec![e, 1.0]])
    }

    #[test]
    fn test_writer_header() {
        let w = EnvWriter::with_default_header();
        assert_eq!(w.ptr(), PTR_ENV_START);
        assert_eq!(w.env()[PTR_LIGHT_SPEED], LIGHT_SPEED);
        let mut w = EnvWriter::new(&[1.0, 2.0]);
        assert_eq!(w.env()[1], 2.0);
        assert_eq!(w.push_slice(&[5.0, 6.0]), PTR_ENV_START);
        assert_eq!(w.ptr(), PTR_ENV_START + 2);
        assert!(w.set_header(PTR_ENV_START, 1.0).is_err());
        w.set_header(PTR_RINV_ZETA, 3.0).unwrap();
        assert_eq!(w.env()[PTR_RINV_ZETA], 3.0);
    }

    #[test]
    fn test_make_atm_env() {
        let sym = AtomSymbol::parse("O").unwrap();
        let (rec, slice) = make_atm_env(&sym, &Vector3::new(0.1, 0.2, 0.3), NucWidth::Dyall, 20).unwrap();
        assert_eq!(rec, [8, 20, NUC_POINT, 23, 0, 0]);
        assert_eq!(&slice[..3], &[0.1, 0.2, 0.3]);
        assert!(slice[3] > 1e8);

        let ghost = AtomSymbol::parse("GHOST-O").unwrap();
        let (rec, _) = make_atm_env(&ghost, &Vector3::zeros(), NucWidth::Dyall, 40).unwrap();
        assert_eq!(rec[CHARGE_OF], 0);

        let (_, filatov) = make_atm_env(&sym, &Vector3::zeros(), NucWidth::Filatov, 0).unwrap();
        assert_eq!(filatov[3], crate::nucmod::filatov_nuc_mod(8));
        assert!(filatov[3] != slice[3]);
    }

    #[test]
    fn test_make_bas_env_layout() {
        let shells = vec![
            ShellSpec::new(1, vec![vec![2.0, 0.5, 0.1], vec![0.5, 0.5, 0.9]]),
            ShellSpec::new(2, vec![]),
            s_shell(1.0),
        ];
        let (bas, env, warnings) = make_bas_env(&shells, 3, 100, "C").unwrap();
        assert_eq!(bas.len(), 2);
        assert_eq!(warnings, vec![BuildWarning::EmptyShell { label: "C".to_string(), l: 2 }]);
        assert_eq!(bas[0], [3, 1, 2, 2, 0, 100, 102, 0]);
        // 2 exps + 4 coefficients, then 1 exp + 1 coefficient
        assert_eq!(bas[1], [3, 0, 1, 1, 0, 106, 107, 0]);
        assert_eq!(env.len(), 8);
        assert_eq!(&env[..2], &[2.0, 0.5]);

        // coefficients are contraction-major
        let cs = normalize_contracted(1, &[2.0, 0.5], &shells[0].coeff_matrix()).unwrap();
        assert_eq!(&env[2..6], &[cs[(0, 0)], cs[(1, 0)], cs[(0, 1)], cs[(1, 1)]]);
    }

    #[test]
    fn test_make_env_shares_basis_data() {
        let atoms = vec![atom("H", 0.0), atom("H", 1.4), atom("He", 3.0)];
        let mut basis = BTreeMap::new();
        basis.insert("H".to_string(), vec![s_shell(1.0), s_shell(0.2)]);
        basis.insert("He".to_string(), vec![s_shell(2.0)]);
        let mut writer = EnvWriter::with_default_header();
        let tables = make_env(&atoms, &basis, &NucModSpec::default(), &mut writer).unwrap();

        assert_eq!(tables.atm.len(), 3);
        assert_eq!(tables.atm[1][PTR_COORD], 24);
        assert_eq!(tables.bas.len(), 5);
        let owners: Vec<i32> = tables.bas.iter().map(|b| b[ATOM_OF]).collect();
        assert_eq!(owners, vec![0, 0, 1, 1, 2]);
        // both hydrogens point at the same data
        assert_eq!(tables.bas[0][PTR_EXP], tables.bas[2][PTR_EXP]);
        // 20 header + 3*4 atoms + H (2 * 2) + He (2)
        assert_eq!(writer.ptr(), 20 + 12 + 4 + 2);
        assert!(tables.warnings.is_empty());
    }

    #[test]
    fn test_make_env_label_fallback_and_missing() {
        let atoms = vec![atom("H1", 0.0), atom("GHOST-H2", 1.0), atom("Li", 2.0)];
        let mut basis = BTreeMap::new();
        basis.insert("H".to_string(), vec![s_shell(1.0)]);
        basis.insert("H1".to_string(), vec![s_shell(3.0)]);
        let mut writer = EnvWriter::with_default_header();
        let tables = make_env(&atoms, &basis, &NucModSpec::default(), &mut writer).unwrap();

        assert_eq!(tables.bas.len(), 2);
        let env = writer.env();
        assert_eq!(env[tables.bas[0][PTR_EXP] as usize], 3.0);
        assert_eq!(env[tables.bas[1][PTR_EXP] as usize], 1.0);
        assert_eq!(tables.atm[1][CHARGE_OF], 0);
        assert_eq!(
            tables.warnings,
            vec![BuildWarning::BasisNotFound { atom: 2, label: "Li".to_string() }]
        );
    }

    #[test]
    fn test_make_env_nucmod() {
        let atoms = vec![atom("H", 0.0), atom("O", 1.0)];
        let mut nucmod = NucModSpec::default();
        nucmod.by_label.insert("o".to_string(), NucModel::Gaussian);
        let mut writer = EnvWriter::with_default_header();
        let tables = make_env(&atoms, &BTreeMap::new(), &nucmod, &mut writer).unwrap();
        assert_eq!(tables.atm[0][NUC_MOD_OF], NUC_POINT);
        assert_eq!(tables.atm[1][NUC_MOD_OF], NUC_GAUSS);
        assert_eq!(tables.warnings.len(), 2);
    }
}
