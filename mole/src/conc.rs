//! Joining two systems into one environment, e.g. for cross integrals
//! <mu|nu> with mu in A and nu in B.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector, Vector3};

use crate::basis::{BasisInput, BasisSpec};
use crate::consts::*;
use crate::ecp::{EcpInput, EcpSpec};
use crate::env::slot;
use crate::error::{MoleError, MoleResult};
use crate::geometry::{AtomInput, AtomItem, Unit};
use crate::mole::Mole;
use crate::nucmod::{NucModSpec, NucModel};

/// Shift the atom and env references of shell records.
pub fn offset_bas(bas: &[BasRecord], natm_off: i32, env_off: i32) -> Vec<BasRecord> {
    bas.iter()
        .map(|b| {
            let mut b = *b;
            b[ATOM_OF] += natm_off;
            b[PTR_EXP] += env_off;
            b[PTR_COEFF] += env_off;
            b
        })
        .collect()
}

/// Shift the env references of atom records.
pub fn offset_atm(atm: &[AtmRecord], env_off: i32) -> Vec<AtmRecord> {
    atm.iter()
        .map(|a| {
            let mut a = *a;
            a[PTR_COORD] += env_off;
            a[PTR_ZETA] += env_off;
            a
        })
        .collect()
}

/// Concatenate two (atm, bas, env) triples. Records of the second system
/// are rebased onto the end of the first environment.
#[allow(clippy::type_complexity)]
pub fn conc_env(
    atm1: &[AtmRecord],
    bas1: &[BasRecord],
    env1: &[f64],
    atm2: &[AtmRecord],
    bas2: &[BasRecord],
    env2: &[f64],
) -> MoleResult<(Vec<AtmRecord>, Vec<BasRecord>, Vec<f64>)> {
    let off = slot(env1.len() + env2.len(), "env length").map(|_| env1.len() as i32)?;
    let natm_off = slot(atm1.len() + atm2.len(), "natm").map(|_| atm1.len() as i32)?;

    let mut atm = atm1.to_vec();
    atm.extend(offset_atm(atm2, off));
    let mut bas = bas1.to_vec();
    bas.extend(offset_bas(bas2, natm_off, off));
    let mut env = env1.to_vec();
    env.extend_from_slice(env2);
    Ok((atm, bas, env))
}

/// Molecule made of the atoms of `mol1` followed by those of `mol2`.
///
/// Charge and spin are summed; basis and ECP tables are merged with
/// `mol1` entries taking precedence. The input fields describe the joined
/// system (Bohr geometry, explicit shells, per-atom nuclear models) so that
/// a rebuild reproduces it.
pub fn conc_mol(mol1: &Mole, mol2: &Mole) -> MoleResult<Mole> {
    if !mol1.built || !mol2.built {
        return Err(MoleError::NotBuilt);
    }
    let (atm, bas, mut env) = conc_env(&mol1.atm, &mol1.bas, &mol1.env, &mol2.atm, &mol2.bas, &mol2.env)?;
    let off = mol1.env.len() as i32;
    let natm_off = mol1.atm.len() as i32;
    let mut ecpbas = mol1.ecpbas.clone();
    ecpbas.extend(offset_bas(&mol2.ecpbas, natm_off, off));
    env[PTR_ECPBAS_OFFSET] = bas.len() as f64;
    env[PTR_NECPBAS] = ecpbas.len() as f64;

    let mut atoms = mol1.atoms.clone();
    atoms.extend(mol2.atoms.iter().cloned());

    let mut basis_tab = mol2.basis_tab.clone();
    basis_tab.extend(mol1.basis_tab.clone());
    let mut ecp_tab = mol2.ecp_tab.clone();
    ecp_tab.extend(mol1.ecp_tab.clone());

    let atom = AtomInput::List(
        atoms
            .iter()
            .map(|a| AtomItem::Entry(a.symbol.raw.clone(), [a.coord.x, a.coord.y, a.coord.z]))
            .collect(),
    );
    let basis = BasisInput::PerAtom(
        basis_tab
            .iter()
            .map(|(k, v)| (k.clone(), BasisSpec::from(v.clone())))
            .collect(),
    );
    let ecp = EcpInput::PerAtom(
        ecp_tab
            .iter()
            .map(|(k, v)| (k.clone(), EcpSpec::Data(v.clone())))
            .collect(),
    );
    let by_atom: BTreeMap<usize, NucModel> = atm
        .iter()
        .enumerate()
        .filter_map(|(ia, a)| NucModel::from_tag(a[NUC_MOD_OF]).map(|m| (ia + 1, m)))
        .collect();

    let mut warnings = mol1.warnings.clone();
    warnings.extend(mol2.warnings.iter().cloned());

    Ok(Mole {
        atom,
        unit: Unit::Bohr,
        basis,
        ecp,
        nucmod: NucModSpec {
            by_atom,
            width: mol1.nucmod.width,
            ..Default::default()
        },
        charge: mol1.charge + mol2.charge,
        spin: mol1.spin + mol2.spin,
        cart: mol1.cart && mol2.cart,
        atoms,
        basis_tab,
        ecp_tab,
        atm,
        bas,
        ecpbas,
        env,
        built: true,
        warnings,
    })
}

/// Nuclear repulsion (or static Coulomb) energy 1/2 sum_{i != j} q_i q_j / r_ij.
///
/// Pair distances come from the Gram matrix G = R R^T:
/// r_ij^2 = G_ii + G_jj - 2 G_ij.
pub fn energy_nuc(charges: &[f64], coords: &[Vector3<f64>]) -> f64 {
    let n = charges.len().min(coords.len());
    if n == 0 {
        return 0.0;
    }
    let r = DMatrix::from_fn(n, 3, |i, x| coords[i][x]);
    let gram = &r * r.transpose();
    let d = gram.diagonal();
    let ones = DVector::from_element(n, 1.0);
    let mut rr = (&d * ones.transpose() + &ones * d.transpose() - gram * 2.0).map(|x| x.max(0.0));
    rr.fill_diagonal(1e-60);
    let q = DVector::from_column_slice(&charges[..n]);
    let mut qq = &q * q.transpose();
    qq.fill_diagonal(0.0);
    qq.component_div(&rr.map(f64::sqrt)).sum() * 0.5
}
