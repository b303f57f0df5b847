use std::path::Path;

use crate::error::LoadError;
use crate::model::Document;

/// Surface syntax of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    Yaml,
    Json,
}

impl Syntax {
    /// Select the syntax from a file extension.
    ///
    /// `.json` selects JSON; everything else is read as YAML, which also
    /// accepts JSON input.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => Syntax::Json,
            _ => Syntax::Yaml,
        }
    }
}

/// Decode a document from raw bytes.
///
/// The returned document is not normalized; see [`crate::normalize`].
pub fn load(bytes: &[u8], syntax: Syntax) -> Result<Document, LoadError> {
    let document = match syntax {
        Syntax::Yaml => serde_yaml::from_slice(bytes)?,
        Syntax::Json => serde_json::from_slice(bytes)?,
    };
    Ok(document)
}

/// Decode a document from a string.
pub fn load_str(input: &str, syntax: Syntax) -> Result<Document, LoadError> {
    load(input.as_bytes(), syntax)
}

/// Read and decode a document file, choosing the syntax by extension.
pub fn load_file(path: &Path) -> Result<Document, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let syntax = Syntax::from_path(path);
    tracing::debug!(path = %path.display(), ?syntax, bytes = bytes.len(), "read document");
    load(&bytes, syntax)
}
