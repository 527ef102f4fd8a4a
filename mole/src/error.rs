use std::fmt;

use thiserror::Error;

/// Failures that terminate a build or a caller request.
#[derive(Debug, Error)]
pub enum MoleError {
    #[error("Electron number {nelectron} and spin {spin} are not consistent (spin = 2S = Nalpha - Nbeta)")]
    ElectronSpinMismatch { nelectron: i32, spin: i32 },

    #[error("Invalid angular momentum l = {0}; l must be >= 0")]
    InvalidAngularMomentum(i32),

    #[error("Unknown element symbol: {0}")]
    UnknownElement(String),

    #[error("Malformed basis for {symbol}: {reason}")]
    MalformedBasis { symbol: String, reason: String },

    #[error("Basis '{name}' not found for {symbol}")]
    BasisNotFound { name: String, symbol: String },

    #[error("Invalid geometry input: {0}")]
    InvalidGeometry(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Index {index} out of range for {what} (len {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Molecule has not been built")]
    NotBuilt,

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl From<serde_json::Error> for MoleError {
    fn from(e: serde_json::Error) -> Self {
        MoleError::Serialization(e.to_string())
    }
}

impl From<serde_pickle::Error> for MoleError {
    fn from(e: serde_pickle::Error) -> Self {
        MoleError::Serialization(e.to_string())
    }
}

pub type MoleResult<T> = Result<T, MoleError>;

/// Conditions a build recovers from locally. They are logged and kept on the
/// molecule so that callers can inspect them after the fact.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildWarning {
    /// A basis entry with no primitives was skipped.
    EmptyShell { label: String, l: i32 },
    /// No basis entry resolved for this atom; it contributes zero shells.
    BasisNotFound { atom: usize, label: String },
    /// A named ECP had no data for this symbol; the atom keeps its full charge.
    EcpNotFound { name: String, label: String },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::EmptyShell { label, l } => {
                write!(f, "Empty shell (l = {}) skipped in basis of {}", l, label)
            }
            BuildWarning::BasisNotFound { atom, label } => {
                write!(f, "Basis not found for atom {} {}", atom, label)
            }
            BuildWarning::EcpNotFound { name, label } => {
                write!(f, "ECP {} not found for {}", name, label)
            }
        }
    }
}
