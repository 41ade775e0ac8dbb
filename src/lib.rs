//! Meta-model resolver: decodes a JSON protocol meta-model and turns it into
//! a fully resolved, dependency-ordered IR for code emission.
pub mod cli;
pub mod diagnostics;
pub mod docs;
pub mod error;
pub mod ir;
pub mod meta;
pub mod path_de;
pub mod resolve;
pub mod text;

use std::path::Path;

pub use diagnostics::ResolveError;
pub use error::{Error, Result};
pub use ir::Protocol;
pub use resolve::resolve;

/// Decode and resolve a meta-model held in memory.
pub fn resolve_str(src: &str) -> Result<Protocol> {
    let model: meta::MetaModel = src.parse()?;
    Ok(resolve(&model)?)
}

/// Read, decode and resolve the meta-model at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<Protocol> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
    let model = meta::MetaModel::from_slice(&bytes)?;
    Ok(resolve(&model)?)
}
