//! Generator configuration (`oasgen.yaml`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GenerateError;

/// Settings for one generation run.
///
/// Every field may be given in a YAML file; command-line flags take
/// precedence over file values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Module name recorded in the generated `mod.rs`.
    pub package: String,
    /// Directory artifacts are written to.
    pub output: PathBuf,
    /// Emit `security.rs` when the document declares security schemes.
    pub emit_security: bool,
    /// Emit `webhooks.rs` when the document declares webhooks.
    pub emit_webhooks: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            package: "api".to_string(),
            output: PathBuf::from("./generated"),
            emit_security: true,
            emit_webhooks: true,
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a YAML file.
    pub fn load(path: &Path) -> Result<Self, GenerateError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GenerateError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        Self::parse(&content, path)
    }

    /// Parse a config from YAML content.
    pub fn parse(content: &str, path: &Path) -> Result<Self, GenerateError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| {
            GenerateError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_emit_security(mut self, enabled: bool) -> Self {
        self.emit_security = enabled;
        self
    }

    pub fn with_emit_webhooks(mut self, enabled: bool) -> Self {
        self.emit_webhooks = enabled;
        self
    }
}
