use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while reading and decoding a document (E1001–E1003).
#[derive(Debug, Error)]
pub enum LoadError {
    /// E1001: The document file could not be read.
    #[error("E1001: cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// E1002: YAML decode error (includes malformed `type` fields).
    #[error("E1002: YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// E1003: JSON decode error (includes malformed `type` fields).
    #[error("E1003: JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Document-level invariant violations (E1010–E1012).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// E1010: A required top-level field is missing or empty.
    #[error("E1010: missing required field '{0}'")]
    MissingField(&'static str),

    /// E1011: The `openapi` version is not a 3.x version.
    #[error("E1011: unsupported OpenAPI version: {0} (only 3.x supported)")]
    UnsupportedVersion(String),

    /// E1012: Neither `paths` nor `components` is present.
    #[error("E1012: document declares neither 'paths' nor 'components'")]
    Empty,
}

/// Errors produced while resolving a `$ref` pointer (E1020–E1024).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// E1020: The pointer is not rooted at the document itself.
    #[error("E1020: external reference not supported: {0}")]
    External(String),

    /// E1021: The pointer does not have the `#/components/<kind>/<name>` shape.
    #[error("E1021: unsupported reference shape: {0}")]
    UnsupportedPointer(String),

    /// E1022: The pointer names a component that does not exist.
    #[error("E1022: unresolved reference: {0}")]
    Missing(String),

    /// E1023: The pointer designates a different kind of component than its context requires.
    #[error("E1023: reference {pointer} is not a {expected}")]
    KindMismatch {
        pointer: String,
        expected: &'static str,
    },

    /// E1024: A component that is itself a reference leads back to itself.
    #[error("E1024: reference cycle through {0}")]
    Cycle(String),
}

/// A failed reference together with the document location that holds it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{location}: {source}")]
pub struct ReferenceError {
    /// Human-readable location, e.g. `GET /pets/{petId} parameter #0`.
    pub location: String,
    #[source]
    pub source: ResolveError,
}
