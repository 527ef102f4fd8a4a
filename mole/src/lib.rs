// Molecule input and libcint atm/bas/env table construction

pub mod ao;
pub mod basis;
pub mod conc;
pub mod consts;
pub mod ecp;
pub mod element;
pub mod env;
pub mod error;
pub mod geometry;
pub mod gto;
pub mod mole;
pub mod nucmod;
pub mod nwchem;

#[cfg(test)]
mod helper;

use rayon::prelude::*;

pub use basis::{BasisInput, BasisLoader, BasisSpec, InlineLibrary, NoLoader, NwchemDirLoader, ShellSpec};
pub use conc::{conc_env, conc_mol, energy_nuc};
pub use consts::{AtmRecord, BasRecord};
pub use ecp::{EcpBlock, EcpData, EcpInput, EcpSpec};
pub use element::AtomSymbol;
pub use error::{BuildWarning, MoleError, MoleResult};
pub use geometry::{AtomInput, AtomItem, FormattedAtom, Unit};
pub use mole::Mole;
pub use nucmod::{NucModSpec, NucModel, NucWidth};

/// Build independent molecules in parallel. Results keep the input order.
pub fn build_all(mols: &mut [Mole], loader: &dyn BasisLoader) -> Vec<MoleResult<()>> {
    mols.par_iter_mut()
        .map(|m| m.build_with(loader).map(|_| ()))
        .collect()
}
