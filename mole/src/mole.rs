/* Molecule description and its libcint environment.

   A `Mole` holds the user input (geometry, basis, ECP, nuclear models,
   charge and spin) and, after `build`, the atm/bas/ecpbas/env tables
   derived from it.
*/

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::ops::Range;
use std::path::Path;

use nalgebra::{DMatrix, Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ao;
use crate::basis::{resolve_basis, BasisInput, BasisLoader, NoLoader, ShellSpec};
use crate::conc::energy_nuc;
use crate::consts::*;
use crate::ecp::{make_ecp_env, resolve_ecp, EcpData, EcpInput};
use crate::env::{make_env, EnvWriter};
use crate::error::{BuildWarning, MoleError, MoleResult};
use crate::geometry::{cart2zmat, format_atom, AtomInput, FormattedAtom, Unit};
use crate::gto::unnormalize_primitives;
use crate::nucmod::NucModSpec;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mole {
    pub atom: AtomInput,
    #[serde(default)]
    pub unit: Unit,
    #[serde(default)]
    pub basis: BasisInput,
    #[serde(default)]
    pub ecp: EcpInput,
    #[serde(default)]
    pub nucmod: NucModSpec,
    #[serde(default)]
    pub charge: i32,
    /// 2S = N(alpha) - N(beta)
    #[serde(default)]
    pub spin: i32,
    #[serde(default)]
    pub cart: bool,

    // derived by build
    #[serde(default)]
    pub(crate) atoms: Vec<FormattedAtom>,
    #[serde(default)]
    pub(crate) basis_tab: BTreeMap<String, Vec<ShellSpec>>,
    #[serde(default)]
    pub(crate) ecp_tab: BTreeMap<String, EcpData>,
    #[serde(default)]
    pub(crate) atm: Vec<AtmRecord>,
    #[serde(default)]
    pub(crate) bas: Vec<BasRecord>,
    #[serde(default)]
    pub(crate) ecpbas: Vec<BasRecord>,
    #[serde(default)]
    pub(crate) env: Vec<f64>,
    #[serde(default)]
    pub(crate) built: bool,
    #[serde(skip)]
    pub(crate) warnings: Vec<BuildWarning>,
}

fn check_index(what: &'static str, index: usize, len: usize) -> MoleResult<()> {
    if index < len {
        Ok(())
    } else {
        Err(MoleError::OutOfRange { what, index, len })
    }
}

fn table_count(what: &'static str, value: i32) -> MoleResult<usize> {
    usize::try_from(value).map_err(|_| MoleError::InvalidParameter {
        name: what,
        reason: format!("{} is negative", value),
    })
}

/// Env range of `n` values starting at a table pointer.
fn env_range(what: &'static str, ptr: i32, n: usize, len: usize) -> MoleResult<Range<usize>> {
    let start = table_count(what, ptr)?;
    let end = start + n;
    if end <= len {
        Ok(start..end)
    } else {
        Err(MoleError::OutOfRange { what, index: end, len })
    }
}

fn non_negative(name: &'static str, value: f64) -> MoleResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(MoleError::InvalidParameter {
            name,
            reason: format!("{} must be a finite value >= 0", value),
        })
    }
}

impl Mole {
    pub fn new(atom: impl Into<AtomInput>, basis: BasisInput) -> Self {
        Mole {
            atom: atom.into(),
            basis,
            ..Default::default()
        }
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_charge(mut self, charge: i32) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_spin(mut self, spin: i32) -> Self {
        self.spin = spin;
        self
    }

    pub fn with_ecp(mut self, ecp: EcpInput) -> Self {
        self.ecp = ecp;
        self
    }

    pub fn with_nucmod(mut self, nucmod: NucModSpec) -> Self {
        self.nucmod = nucmod;
        self
    }

    pub fn with_cart(mut self, cart: bool) -> Self {
        self.cart = cart;
        self
    }

    /// Build using explicit shells only; named basis sets need a loader.
    pub fn build(&mut self) -> MoleResult<&mut Self> {
        self.build_with(&NoLoader)
    }

    /// Parse the input and regenerate every table from a fresh header.
    ///
    /// On error the molecule is left unbuilt.
    pub fn build_with(&mut self, loader: &dyn BasisLoader) -> MoleResult<&mut Self> {
        self.built = false;
        let atoms = format_atom(&self.atom, &Vector3::zeros(), &Matrix3::identity(), self.unit)?;
        let symbols: Vec<_> = atoms.iter().map(|a| a.symbol.clone()).collect();
        let mut labels: Vec<String> = Vec::new();
        for s in &symbols {
            let label = s.label();
            if !labels.contains(&label) {
                labels.push(label);
            }
        }

        let basis_tab = resolve_basis(&self.basis, &labels, loader)?;
        let (ecp_tab, ecp_warnings) = resolve_ecp(&self.ecp, &symbols, loader)?;

        let mut writer = EnvWriter::with_default_header();
        let mut tables = make_env(&atoms, &basis_tab, &self.nucmod, &mut writer)?;
        let ecpbas = make_ecp_env(&mut tables.atm, &atoms, &ecp_tab, &mut writer)?;
        writer.set_header(PTR_ECPBAS_OFFSET, tables.bas.len() as f64)?;
        writer.set_header(PTR_NECPBAS, ecpbas.len() as f64)?;

        let nelectron: i32 = tables.atm.iter().map(|a| a[CHARGE_OF]).sum::<i32>() - self.charge;
        if (nelectron + self.spin).rem_euclid(2) != 0 {
            return Err(MoleError::ElectronSpinMismatch {
                nelectron,
                spin: self.spin,
            });
        }

        let mut warnings = ecp_warnings;
        warnings.extend(tables.warnings);

        self.atoms = atoms;
        self.basis_tab = basis_tab;
        self.ecp_tab = ecp_tab;
        self.atm = tables.atm;
        self.bas = tables.bas;
        self.ecpbas = ecpbas;
        self.env = writer.into_env();
        self.warnings = warnings;
        self.built = true;

        info!(
            "Built molecule: natm = {}, nbas = {}, necpbas = {}, nao = {}, nelectron = {}",
            self.natm(),
            self.nbas(),
            self.ecpbas.len(),
            self.nao_nr(),
            nelectron
        );
        debug!("env length = {}", self.env.len());
        Ok(self)
    }

    /// Replace the geometry and rebuild.
    pub fn set_geom(&mut self, atom: AtomInput, unit: Unit, loader: &dyn BasisLoader) -> MoleResult<&mut Self> {
        self.atom = atom;
        self.unit = unit;
        self.build_with(loader)?;
        for (ia, a) in self.atoms.iter().enumerate() {
            info!(
                " {:3} {:<4} {:16.12} {:16.12} {:16.12}",
                ia + 1,
                a.symbol.raw,
                a.coord.x,
                a.coord.y,
                a.coord.z
            );
        }
        Ok(self)
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    fn ensure_built(&self) -> MoleResult<()> {
        if self.built {
            Ok(())
        } else {
            Err(MoleError::NotBuilt)
        }
    }

    // ─── raw tables ────────────────────────────────────────────────────────

    pub fn atm(&self) -> &[AtmRecord] {
        &self.atm
    }

    pub fn bas(&self) -> &[BasRecord] {
        &self.bas
    }

    pub fn ecpbas(&self) -> &[BasRecord] {
        &self.ecpbas
    }

    pub fn env(&self) -> &[f64] {
        &self.env
    }

    /// `atm` as one contiguous row-major buffer.
    pub fn atm_flat(&self) -> Vec<i32> {
        self.atm.iter().flatten().copied().collect()
    }

    pub fn bas_flat(&self) -> Vec<i32> {
        self.bas.iter().flatten().copied().collect()
    }

    pub fn ecpbas_flat(&self) -> Vec<i32> {
        self.ecpbas.iter().flatten().copied().collect()
    }

    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    /// Parsed atoms in Bohr.
    pub fn atoms(&self) -> &[FormattedAtom] {
        &self.atoms
    }

    pub fn basis_table(&self) -> &BTreeMap<String, Vec<ShellSpec>> {
        &self.basis_tab
    }

    pub fn ecp_table(&self) -> &BTreeMap<String, EcpData> {
        &self.ecp_tab
    }

    // ─── atoms ─────────────────────────────────────────────────────────────

    pub fn natm(&self) -> usize {
        self.atm.len()
    }

    pub fn nbas(&self) -> usize {
        self.bas.len()
    }

    pub fn has_ecp(&self) -> bool {
        !self.ecpbas.is_empty()
    }

    /// Sum of the effective nuclear charges minus the molecular charge.
    pub fn tot_electrons(&self) -> i32 {
        self.atm.iter().map(|a| a[CHARGE_OF]).sum::<i32>() - self.charge
    }

    pub fn nelectron(&self) -> i32 {
        self.tot_electrons()
    }

    /// (N alpha, N beta)
    pub fn nelec(&self) -> (i32, i32) {
        let nalpha = (self.nelectron() + self.spin).div_euclid(2);
        (nalpha, nalpha - self.spin)
    }

    fn formatted(&self, atm_id: usize) -> MoleResult<&FormattedAtom> {
        check_index("atom", atm_id, self.atoms.len())?;
        Ok(&self.atoms[atm_id])
    }

    /// Label as given in the input, e.g. "H^2" or "GHOST-C".
    pub fn atom_symbol(&self, atm_id: usize) -> MoleResult<&str> {
        Ok(&self.formatted(atm_id)?.symbol.raw)
    }

    /// Element symbol, e.g. "H".
    pub fn atom_pure_symbol(&self, atm_id: usize) -> MoleResult<&str> {
        Ok(&self.formatted(atm_id)?.symbol.element)
    }

    pub fn atom_charge(&self, atm_id: usize) -> MoleResult<i32> {
        check_index("atom", atm_id, self.natm())?;
        Ok(self.atm[atm_id][CHARGE_OF])
    }

    pub fn atom_charges(&self) -> Vec<i32> {
        self.atm.iter().map(|a| a[CHARGE_OF]).collect()
    }

    /// Core electrons replaced by an ECP.
    pub fn atom_nelec_core(&self, atm_id: usize) -> MoleResult<i32> {
        let formatted = self.formatted(atm_id)?;
        Ok(formatted.symbol.charge() - self.atom_charge(atm_id)?)
    }

    fn env_slice(&self, what: &'static str, ptr: i32, n: usize) -> MoleResult<&[f64]> {
        let range = env_range(what, ptr, n, self.env.len())?;
        Ok(&self.env[range])
    }

    pub fn atom_coord(&self, atm_id: usize) -> MoleResult<Vector3<f64>> {
        check_index("atom", atm_id, self.natm())?;
        let coord = self.env_slice("PTR_COORD", self.atm[atm_id][PTR_COORD], 3)?;
        Ok(Vector3::from_column_slice(coord))
    }

    /// Coordinates of every atom. Tables are checked on build and on load,
    /// so no atom is left out.
    pub fn atom_coords(&self) -> Vec<Vector3<f64>> {
        (0..self.natm())
            .filter_map(|ia| self.atom_coord(ia).ok())
            .collect()
    }

    pub fn atom_shell_ids(&self, atm_id: usize) -> MoleResult<Vec<usize>> {
        check_index("atom", atm_id, self.natm())?;
        Ok(self
            .bas
            .iter()
            .enumerate()
            .filter(|(_, b)| b[ATOM_OF] as usize == atm_id)
            .map(|(ib, _)| ib)
            .collect())
    }

    pub fn atom_nshells(&self, atm_id: usize) -> MoleResult<usize> {
        Ok(self.atom_shell_ids(atm_id)?.len())
    }

    /// First shell of atom `atm_id` with angular momentum `l`.
    pub fn search_shell_id(&self, atm_id: usize, l: i32) -> Option<usize> {
        self.bas
            .iter()
            .position(|b| b[ATOM_OF] as usize == atm_id && b[ANG_OF] == l)
    }

    // ─── shells ────────────────────────────────────────────────────────────

    fn shell(&self, bas_id: usize) -> MoleResult<&BasRecord> {
        check_index("shell", bas_id, self.nbas())?;
        Ok(&self.bas[bas_id])
    }

    pub fn bas_atom(&self, bas_id: usize) -> MoleResult<usize> {
        Ok(self.shell(bas_id)?[ATOM_OF] as usize)
    }

    pub fn bas_coord(&self, bas_id: usize) -> MoleResult<Vector3<f64>> {
        self.atom_coord(self.bas_atom(bas_id)?)
    }

    pub fn bas_angular(&self, bas_id: usize) -> MoleResult<i32> {
        Ok(self.shell(bas_id)?[ANG_OF])
    }

    pub fn bas_nctr(&self, bas_id: usize) -> MoleResult<usize> {
        Ok(self.shell(bas_id)?[NCTR_OF] as usize)
    }

    pub fn bas_nprim(&self, bas_id: usize) -> MoleResult<usize> {
        Ok(self.shell(bas_id)?[NPRIM_OF] as usize)
    }

    pub fn bas_kappa(&self, bas_id: usize) -> MoleResult<i32> {
        Ok(self.shell(bas_id)?[KAPPA_OF])
    }

    pub fn bas_exp(&self, bas_id: usize) -> MoleResult<&[f64]> {
        let b = self.shell(bas_id)?;
        let nprim = table_count("NPRIM_OF", b[NPRIM_OF])?;
        self.env_slice("PTR_EXP", b[PTR_EXP], nprim)
    }

    /// Coefficients as stored for the integral library, `nprim x nctr`.
    fn libcint_ctr_coeff(&self, bas_id: usize) -> MoleResult<DMatrix<f64>> {
        let b = self.shell(bas_id)?;
        let nprim = table_count("NPRIM_OF", b[NPRIM_OF])?;
        let nctr = table_count("NCTR_OF", b[NCTR_OF])?;
        let coeff = self.env_slice("PTR_COEFF", b[PTR_COEFF], nprim * nctr)?;
        Ok(DMatrix::from_column_slice(nprim, nctr, coeff))
    }

    /// Contraction coefficients without the primitive normalization,
    /// `nprim x nctr`.
    pub fn bas_ctr_coeff(&self, bas_id: usize) -> MoleResult<DMatrix<f64>> {
        let l = self.bas_angular(bas_id)?;
        let es = self.bas_exp(bas_id)?;
        unnormalize_primitives(l, es, &self.libcint_ctr_coeff(bas_id)?)
    }

    pub fn bas_len_spinor(&self, bas_id: usize) -> MoleResult<usize> {
        let b = self.shell(bas_id)?;
        Ok(ao::len_spinor(b[ANG_OF], b[KAPPA_OF]))
    }

    pub fn bas_len_cart(&self, bas_id: usize) -> MoleResult<usize> {
        Ok(ao::len_cart(self.shell(bas_id)?[ANG_OF]))
    }

    // ─── AO bookkeeping ────────────────────────────────────────────────────

    pub fn npgto_nr(&self) -> usize {
        ao::npgto_nr(&self.bas, self.cart)
    }

    /// Contracted functions, Cartesian when `cart` is set.
    pub fn nao_nr(&self) -> usize {
        ao::nao_nr(&self.bas, self.cart)
    }

    pub fn nao_cart(&self) -> usize {
        ao::nao_cart(&self.bas)
    }

    pub fn nao_2c(&self) -> usize {
        ao::nao_2c(&self.bas)
    }

    pub fn nao_nr_range(&self, bas_id0: usize, bas_id1: usize) -> (usize, usize) {
        ao::nao_nr_range(&self.bas, bas_id0, bas_id1, self.cart)
    }

    pub fn nao_2c_range(&self, bas_id0: usize, bas_id1: usize) -> (usize, usize) {
        ao::nao_2c_range(&self.bas, bas_id0, bas_id1)
    }

    pub fn ao_loc_nr(&self) -> Vec<usize> {
        ao::ao_loc_nr(&self.bas, self.cart)
    }

    pub fn ao_loc_2c(&self) -> Vec<usize> {
        ao::ao_loc_2c(&self.bas)
    }

    pub fn aoslice_by_atom(&self) -> Vec<[usize; 4]> {
        ao::aoslice_by_atom(&self.bas, self.natm(), &self.ao_loc_nr())
    }

    pub fn time_reversal_map(&self) -> Vec<i32> {
        ao::time_reversal_map(&self.bas)
    }

    // ─── derived quantities ────────────────────────────────────────────────

    /// Nuclear repulsion using the effective (ECP-reduced) charges.
    pub fn energy_nuc(&self) -> f64 {
        let charges: Vec<f64> = self.atm.iter().map(|a| a[CHARGE_OF] as f64).collect();
        energy_nuc(&charges, &self.atom_coords())
    }

    fn weighted_center(&self, weights: &[f64]) -> MoleResult<Vector3<f64>> {
        let total: f64 = weights.iter().sum();
        if total == 0.0 {
            return Err(MoleError::InvalidGeometry(String::from(
                "total weight is zero, center undefined",
            )));
        }
        let coords = self.atom_coords();
        let sum = weights
            .iter()
            .zip(&coords)
            .fold(Vector3::zeros(), |acc, (w, c)| acc + c * *w);
        Ok(sum / total)
    }

    fn nuclear_charges(&self) -> Vec<f64> {
        self.atoms.iter().map(|a| a.symbol.charge() as f64).collect()
    }

    pub fn charge_center(&self) -> MoleResult<Vector3<f64>> {
        self.weighted_center(&self.nuclear_charges())
    }

    pub fn mass_center(&self) -> MoleResult<Vector3<f64>> {
        let masses: Vec<f64> = self.atoms.iter().map(|a| a.symbol.mass()).collect();
        self.weighted_center(&masses)
    }

    /// Charge-weighted second moment about the charge center.
    pub fn inertia_moment(&self) -> MoleResult<Matrix3<f64>> {
        let charges = self.nuclear_charges();
        let center = self.weighted_center(&charges)?;
        let total: f64 = charges.iter().sum();
        let im = charges
            .iter()
            .zip(self.atom_coords())
            .fold(Matrix3::zeros(), |acc, (q, c)| {
                let d = c - center;
                acc + d * d.transpose() * *q
            });
        Ok(im / total)
    }

    /// Z-matrix of the built geometry in Bohr, one labelled line per atom.
    pub fn zmatrix(&self) -> MoleResult<String> {
        self.ensure_built()?;
        let zmat = cart2zmat(&self.atom_coords());
        Ok(self
            .atoms
            .iter()
            .zip(zmat.lines())
            .map(|(a, line)| format!("{} {}", a.symbol.raw, line))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    // ─── header setters ────────────────────────────────────────────────────

    fn set_env3(&mut self, ptr: usize, name: &'static str, coord: [f64; 3]) -> MoleResult<&mut Self> {
        self.ensure_built()?;
        if !coord.iter().all(|v| v.is_finite()) {
            return Err(MoleError::InvalidParameter {
                name,
                reason: format!("{:?} is not finite", coord),
            });
        }
        self.env[ptr..ptr + 3].copy_from_slice(&coord);
        Ok(self)
    }

    /// Gauge origin (Bohr).
    pub fn set_common_orig(&mut self, coord: [f64; 3]) -> MoleResult<&mut Self> {
        self.set_env3(PTR_COMMON_ORIG, "common_orig", coord)
    }

    /// Origin of the 1/|r-R| operator (Bohr).
    pub fn set_rinv_orig(&mut self, coord: [f64; 3]) -> MoleResult<&mut Self> {
        self.set_env3(PTR_RINV_ORIG, "rinv_orig", coord)
    }

    /// Width of a Gaussian charge at the rinv origin. Zero restores a point
    /// charge; reset it after use since every rinv integral depends on it.
    pub fn set_rinv_zeta(&mut self, zeta: f64) -> MoleResult<&mut Self> {
        self.ensure_built()?;
        self.env[PTR_RINV_ZETA] = non_negative("rinv_zeta", zeta)?;
        Ok(self)
    }

    /// Long-range erf(omega r12)/r12 Coulomb for all 2e integrals; 0 turns
    /// it off.
    pub fn set_range_coulomb(&mut self, omega: f64) -> MoleResult<&mut Self> {
        self.ensure_built()?;
        self.env[PTR_RANGE_OMEGA] = non_negative("range_omega", omega)?;
        Ok(self)
    }

    pub fn set_f12_zeta(&mut self, zeta: f64) -> MoleResult<&mut Self> {
        self.ensure_built()?;
        self.env[PTR_F12_ZETA] = non_negative("f12_zeta", zeta)?;
        Ok(self)
    }

    /// Overwrite the Gaussian nuclear width of one atom. The model tag in
    /// `NUC_MOD_OF` is not touched.
    pub fn set_nuc_mod(&mut self, atm_id: usize, zeta: f64) -> MoleResult<&mut Self> {
        self.ensure_built()?;
        check_index("atom", atm_id, self.natm())?;
        if !(zeta.is_finite() && zeta > 0.0) {
            return Err(MoleError::InvalidParameter {
                name: "zeta",
                reason: format!("{} must be a finite value > 0", zeta),
            });
        }
        let range = env_range("PTR_ZETA", self.atm[atm_id][PTR_ZETA], 1, self.env.len())?;
        self.env[range.start] = zeta;
        Ok(self)
    }

    // ─── persistence ───────────────────────────────────────────────────────

    /// JSON form. The derived tables are included; warnings are not.
    pub fn dumps(&self) -> MoleResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON dump. Loaded tables are checked against `env` before
    /// the molecule is returned.
    pub fn loads(s: &str) -> MoleResult<Self> {
        let mol: Mole = serde_json::from_str(s)?;
        mol.validate_tables()?;
        Ok(mol)
    }

    pub fn to_pickle(&self) -> MoleResult<Vec<u8>> {
        let options = serde_pickle::SerOptions::new();
        Ok(serde_pickle::to_vec(self, options)?)
    }

    pub fn from_pickle(bytes: &[u8]) -> MoleResult<Self> {
        let options = serde_pickle::DeOptions::new();
        let mol: Mole = serde_pickle::from_slice(bytes, options)?;
        mol.validate_tables()?;
        Ok(mol)
    }

    /// Every atm, bas and ecpbas pointer must stay inside `env`, and every
    /// shell must refer to an existing atom.
    fn validate_tables(&self) -> MoleResult<()> {
        let len = self.env.len();
        if self.built && self.atoms.len() != self.atm.len() {
            return Err(MoleError::InvalidParameter {
                name: "atm",
                reason: format!("{} records for {} atoms", self.atm.len(), self.atoms.len()),
            });
        }
        if self.built && len < PTR_ENV_START {
            return Err(MoleError::OutOfRange {
                what: "env header",
                index: PTR_ENV_START,
                len,
            });
        }
        for a in &self.atm {
            env_range("PTR_COORD", a[PTR_COORD], 3, len)?;
            env_range("PTR_ZETA", a[PTR_ZETA], 1, len)?;
        }
        for b in &self.bas {
            check_index("atom", table_count("ATOM_OF", b[ATOM_OF])?, self.atm.len())?;
            let nprim = table_count("NPRIM_OF", b[NPRIM_OF])?;
            let nctr = table_count("NCTR_OF", b[NCTR_OF])?;
            env_range("PTR_EXP", b[PTR_EXP], nprim, len)?;
            env_range("PTR_COEFF", b[PTR_COEFF], nprim * nctr, len)?;
        }
        for b in &self.ecpbas {
            check_index("atom", table_count("ATOM_OF", b[ATOM_OF])?, self.atm.len())?;
            let nprim = table_count("NPRIM_OF", b[NPRIM_OF])?;
            env_range("PTR_EXP", b[PTR_EXP], nprim, len)?;
            env_range("PTR_COEFF", b[PTR_COEFF], nprim, len)?;
        }
        Ok(())
    }

    pub fn save_pickle(&self, path: impl AsRef<Path>) -> MoleResult<()> {
        let serialized = self.to_pickle()?;
        let mut file = File::create(path)?;
        file.write_all(&serialized)?;
        Ok(())
    }

    pub fn load_pickle(path: impl AsRef<Path>) -> MoleResult<Self> {
        let mut file = File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Self::from_pickle(&buffer)
    }
}
