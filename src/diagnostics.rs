//! Resolution diagnostics: a stack of context frames and the error that
//! carries a snapshot of it.
//!
//! Resolution is fail-fast. The first failure becomes a `ResolveError` that
//! is propagated with `?`, so nothing after it can overwrite or add to it.
use std::fmt;

use thiserror::Error;

use crate::ir::DeclKind;

// ————————————————————————————————————————————————————————————————————————————
// FRAMES
// ————————————————————————————————————————————————————————————————————————————

/// One step of resolution context, e.g. "resolving property 'range'".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Model,
    MetaData,
    Enumeration(String),
    EnumerationEntry(String),
    Structure(String),
    /// synthesized nested structure, by qualified name
    StructureLiteral(String),
    Property(String),
    TypeAlias(String),
    Request(String),
    Notification(String),
    References,
    MapKeys,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Model => write!(f, "resolving model"),
            Frame::MetaData => write!(f, "resolving metadata"),
            Frame::Enumeration(name) => write!(f, "resolving enumeration '{name}'"),
            Frame::EnumerationEntry(name) => write!(f, "resolving enumeration entry '{name}'"),
            Frame::Structure(name) => write!(f, "resolving structure '{name}'"),
            Frame::StructureLiteral(name) => write!(f, "resolving structure literal '{name}'"),
            Frame::Property(name) => write!(f, "resolving property '{name}'"),
            Frame::TypeAlias(name) => write!(f, "resolving type alias '{name}'"),
            Frame::Request(method) => write!(f, "resolving request '{method}'"),
            Frame::Notification(method) => write!(f, "resolving notification '{method}'"),
            Frame::References => write!(f, "resolving references"),
            Frame::MapKeys => write!(f, "checking map key types"),
        }
    }
}

/// LIFO stack of frames. Pushed on entry to a resolution step, popped on exit.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Outermost first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.frames.len()
    }

    /// An error for `kind`, with the current frames as context.
    pub fn error(&self, kind: ErrorKind) -> ResolveError {
        ResolveError::new(kind, self.frames.clone())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ERRORS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("duplicate definition for '{name}'. {duplicate} and {existing}")]
    DuplicateDefinition { name: String, duplicate: DeclKind, existing: DeclKind },

    #[error("referenced type '{name}' not found")]
    UnresolvedReference { name: String },

    #[error("invalid message direction '{0}'")]
    InvalidMessageDirection(String),

    #[error("invalid base type '{0}'")]
    InvalidBaseType(String),

    #[error("structure literal used outside of a structure property")]
    OrphanStructureLiteral,

    #[error("invalid map key type {found}: keys must be string-like or integer-like")]
    InvalidMapKey { found: String },
}

/// The first resolution failure, with the frames that were active when it
/// happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    kind: ErrorKind,
    context: Vec<Frame>,
}

impl ResolveError {
    pub fn new(kind: ErrorKind, context: Vec<Frame>) -> Self {
        Self { kind, context }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Outermost first; `Display` renders them innermost first.
    pub fn context(&self) -> &[Frame] {
        &self.context
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for frame in self.context.iter().rev() {
            write!(f, "\nwhile {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolveError {}
