//! Error kinds for the query engine.
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by [`crate::query`].
///
/// `RegexParse` and `IndexLoad` are fatal to a query and returned directly.
/// `BinIo` is recorded per-bin and never propagated out of the verifier.
/// `Cancelled` unwinds the driver cleanly via early return.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("malformed regular expression: {reason}")]
    RegexParse { reason: String },

    #[error("failed to load index: {reason}")]
    IndexLoad { reason: String },

    #[error("failed to read bin {bin} at {path:?}: {source}")]
    BinIo {
        bin: u32,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("query cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, QueryError>;
