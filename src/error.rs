use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostics::ResolveError;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop one model from turning into a `Protocol`.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed JSON or an unrecognized `kind` discriminator.
    #[error("at JSON path {path} → {message}")]
    Decode { path: String, message: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
