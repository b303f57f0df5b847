use std::path::PathBuf;

use oasgen_spec::{LoadError, ReferenceError, ResolveError, ValidationError};
use thiserror::Error;

/// Failures writing generated artifacts (E1030–E1031).
#[derive(Debug, Error)]
pub enum EmitError {
    /// E1030: The output directory could not be created.
    #[error("E1030: cannot create output directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// E1031: An artifact could not be written.
    #[error("E1031: cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors produced during generation, tagged with the step that failed.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Reading or decoding the document failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The document violates a top-level invariant.
    #[error(transparent)]
    Validate(#[from] ValidationError),

    /// A `$ref` could not be resolved.
    #[error("{context}: {source}")]
    Resolve {
        context: String,
        #[source]
        source: ResolveError,
    },

    /// Writing an artifact failed.
    #[error(transparent)]
    Emit(#[from] EmitError),

    /// Generator configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

impl From<ReferenceError> for GenerateError {
    fn from(err: ReferenceError) -> Self {
        GenerateError::Resolve {
            context: err.location,
            source: err.source,
        }
    }
}
