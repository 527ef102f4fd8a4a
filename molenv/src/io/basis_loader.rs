//! Basis set loading utilities

use mole::{BasisLoader, NoLoader, NwchemDirLoader};
use std::path::Path;
use tracing::info;

/// Directory searched when no basis directory is configured
const DEFAULT_BASIS_DIR: &str = "basis_sets";

/// Loader for named basis sets: NWChem files from `basis_dir`, or from
/// `./basis_sets` when it exists. Without either, only inline shells work.
pub fn make_loader(basis_dir: Option<&str>) -> Box<dyn BasisLoader> {
    match basis_dir {
        Some(dir) => {
            info!("Loading named basis sets from {}", dir);
            Box::new(NwchemDirLoader::new(dir))
        }
        None if Path::new(DEFAULT_BASIS_DIR).is_dir() => {
            info!("Loading named basis sets from ./{}", DEFAULT_BASIS_DIR);
            Box::new(NwchemDirLoader::new(DEFAULT_BASIS_DIR))
        }
        None => {
            info!("No basis directory, using inline basis data only");
            Box::new(NoLoader)
        }
    }
}
