//! Input/Output operations
//!
//! This module handles logging setup, basis loader selection and checkpoints.

mod basis_loader;
mod checkpoint;
mod output;

pub use basis_loader::make_loader;
pub use checkpoint::write_checkpoints;
pub use output::{log_summary, print_tables, setup_output};
