//! Error taxonomy for the mapper core.
//!
//! Only [`MapperError::PreCondition`] is ever recovered locally (the
//! mapper skips the offending seed); every other variant is fatal and
//! propagates to the caller.

use thiserror::Error;

/// Errors surfaced by the mapper core.
#[derive(Error, Debug)]
pub enum MapperError {
    /// A hashtable or reference binary violated its format contract.
    #[error("invalid binary: {0}")]
    InvalidBinary(String),

    /// A precondition of a local operation was violated (e.g. seed
    /// extension past read bounds). Callers within the mapper catch
    /// this and skip the seed; it should not reach the CLI boundary.
    #[error("precondition violated: {0}")]
    PreCondition(String),

    /// A caller-supplied parameter was out of range or unsupported.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An allocation or capacity limit was exceeded.
    #[error("memory error: {0}")]
    Memory(String),

    /// Mapping or reading the reference/hashtable binaries failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the mapper core.
pub type Result<T> = std::result::Result<T, MapperError>;
