//! Pipeline coordinator: load, normalize, validate, emit, write.

use std::fs;
use std::path::{Path, PathBuf};

use oasgen_spec::{check_references, load_file, normalize, validate, Document, Resolver};
use oasgen_telemetry::{
    log_artifact_emitted, log_artifact_written, log_document_loaded, log_document_normalized,
    log_document_validated, log_generation_completed, log_generation_failed, log_load_started,
};
use serde::Serialize;

use crate::config::GeneratorConfig;
use crate::emit::{ModuleEmitter, SecurityEmitter, ServerEmitter, TypesEmitter, WebhooksEmitter};
use crate::error::{EmitError, GenerateError};
use crate::mapper::TypeMapper;

/// One generated source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Module stem, e.g. `types`.
    pub module: &'static str,
    pub contents: String,
}

impl Artifact {
    pub fn new(module: &'static str, contents: String) -> Self {
        Self { module, contents }
    }

    pub fn file_name(&self) -> String {
        format!("{}.rs", self.module)
    }
}

/// Counts reported by `oasgen validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub title: String,
    pub version: String,
    pub openapi: String,
    pub paths: usize,
    pub operations: usize,
    pub schemas: usize,
    pub security_schemes: usize,
    pub webhooks: usize,
    pub references: usize,
}

impl DocumentSummary {
    pub fn of(document: &Document, references: usize) -> Self {
        Self {
            title: document.info.title.clone(),
            version: document.info.version.clone(),
            openapi: document.openapi.clone(),
            paths: document.paths.as_ref().map_or(0, |p| p.len()),
            operations: document.operations().count(),
            schemas: document.schemas().count(),
            security_schemes: document.security_schemes().map_or(0, |s| s.len()),
            webhooks: document.webhooks.len(),
            references,
        }
    }
}

/// Load a document from disk and bring it into canonical, validated form.
pub fn load_document(path: &Path) -> Result<(Document, usize), GenerateError> {
    log_load_started!(path = %path.display());
    let mut document = load_file(path)?;
    log_document_loaded!(
        path = %path.display(),
        openapi = %document.openapi,
        title = %document.info.title
    );
    let references = prepare(&mut document)?;
    Ok((document, references))
}

/// Normalize and validate a loaded document in place.
///
/// Returns the number of `$ref` pointers checked.
pub fn prepare(document: &mut Document) -> Result<usize, GenerateError> {
    let visited = normalize(document);
    log_document_normalized!(schemas = visited);

    validate(document)?;
    let resolver = Resolver::new(document);
    let references = check_references(document, &resolver)?;
    log_document_validated!(references, cached = resolver.cached());
    Ok(references)
}

/// Write artifacts into `dir`, creating it if needed.
///
/// Files are written one after another; a failure leaves earlier files in
/// place.
pub fn write_artifacts(dir: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>, EmitError> {
    fs::create_dir_all(dir).map_err(|source| EmitError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = dir.join(artifact.file_name());
        fs::write(&path, &artifact.contents).map_err(|source| EmitError::Write {
            path: path.clone(),
            source,
        })?;
        log_artifact_written!(path = %path.display(), bytes = artifact.contents.len());
        written.push(path);
    }
    Ok(written)
}

/// Drives one generation run.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Render every applicable artifact for a prepared document.
    ///
    /// `types` and `server` are always produced, `security` only when a
    /// scheme is declared, `webhooks` only when a webhook is declared, and
    /// `mod` last.
    pub fn generate(&self, document: &Document) -> Result<Vec<Artifact>, GenerateError> {
        let resolver = Resolver::new(document);
        let mapper = TypeMapper::new(&resolver);
        let mut artifacts = Vec::new();

        artifacts.push(Artifact::new("types", TypesEmitter::new(&mapper).emit()));
        artifacts.push(Artifact::new("server", ServerEmitter::new(&mapper).emit()?));

        if self.config.emit_security {
            if let Some(contents) = SecurityEmitter::new(document).emit() {
                artifacts.push(Artifact::new("security", contents));
            }
        }
        if self.config.emit_webhooks {
            if let Some(contents) = WebhooksEmitter::new(&mapper).emit()? {
                artifacts.push(Artifact::new("webhooks", contents));
            }
        }

        let modules: Vec<&str> = artifacts.iter().map(|a| a.module).collect();
        let index = ModuleEmitter::new(document, &self.config.package).emit(&modules);
        artifacts.push(Artifact::new("mod", index));

        for artifact in &artifacts {
            log_artifact_emitted!(artifact = artifact.module, bytes = artifact.contents.len());
        }
        Ok(artifacts)
    }

    /// Load, prepare and render the document at `input`.
    pub fn generate_file(&self, input: &Path) -> Result<Vec<Artifact>, GenerateError> {
        let (document, _) = load_document(input)?;
        self.generate(&document)
    }

    /// Full run: generate from `input` and write into the configured output.
    pub fn run(&self, input: &Path) -> Result<Vec<PathBuf>, GenerateError> {
        let result = self
            .generate_file(input)
            .and_then(|artifacts| Ok(write_artifacts(&self.config.output, &artifacts)?));

        match &result {
            Ok(paths) => log_generation_completed!(
                input = %input.display(),
                output = %self.config.output.display(),
                artifacts = paths.len()
            ),
            Err(e) => log_generation_failed!(input = %input.display(), error = %e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oasgen_spec::{load_str, Syntax};

    const PETSTORE: &str = r#"
openapi: 3.0.3
info: { title: Petstore, version: "1.0.0" }
security:
  - apiKey: []
paths:
  /pets/{petId}:
    get:
      parameters:
        - { name: petId, in: path, required: true, schema: { type: integer, format: int64 } }
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: { $ref: '#/components/schemas/Pet' }
components:
  securitySchemes:
    apiKey: { type: apiKey, in: header, name: X-API-Key }
  schemas:
    Pet:
      type: object
      properties:
        id: { type: integer, format: int64 }
"#;

    fn prepared(yaml: &str) -> Document {
        let mut doc = load_str(yaml, Syntax::Yaml).unwrap();
        prepare(&mut doc).unwrap();
        doc
    }

    fn modules(artifacts: &[Artifact]) -> Vec<&str> {
        artifacts.iter().map(|a| a.module).collect()
    }

    #[test]
    fn emits_security_only_when_declared() {
        let generator = Generator::default();
        let with = generator.generate(&prepared(PETSTORE)).unwrap();
        assert_eq!(modules(&with), ["types", "server", "security", "mod"]);

        let without = generator
            .generate(&prepared("openapi: 3.1.0\ninfo: {title: T, version: '1'}\npaths: {}\n"))
            .unwrap();
        assert_eq!(modules(&without), ["types", "server", "mod"]);
    }

    #[test]
    fn switches_suppress_optional_artifacts() {
        let generator = Generator::new(GeneratorConfig::new().with_emit_security(false));
        let artifacts = generator.generate(&prepared(PETSTORE)).unwrap();
        assert_eq!(modules(&artifacts), ["types", "server", "mod"]);
        assert!(!artifacts[2].contents.contains("pub mod security;"));
    }

    #[test]
    fn module_index_lists_emitted_files() {
        let generator = Generator::new(GeneratorConfig::new().with_package("petstore"));
        let artifacts = generator.generate(&prepared(PETSTORE)).unwrap();
        let index = &artifacts.last().unwrap().contents;
        assert!(index.contains("pub mod security;"));
        assert!(index.contains("pub const PACKAGE: &str = \"petstore\";"));
    }

    #[test]
    fn generation_is_deterministic() {
        let generator = Generator::default();
        let doc = prepared(PETSTORE);
        assert_eq!(generator.generate(&doc).unwrap(), generator.generate(&doc).unwrap());
    }

    #[test]
    fn type_arrays_match_scalar_types_across_all_artifacts() {
        let generator = Generator::default();
        let scalar = generator.generate(&prepared(PETSTORE)).unwrap();
        let list = generator
            .generate(&prepared(
                &PETSTORE
                    .replace("openapi: 3.0.3", "openapi: 3.1.0")
                    .replace("type: integer", "type: [integer]")
                    .replace("type: object", "type: [object]"),
            ))
            .unwrap();
        assert_eq!(scalar, list);
    }

    #[test]
    fn dangling_reference_fails_before_emission() {
        let mut doc = load_str(
            &PETSTORE.replace("#/components/schemas/Pet'", "#/components/schemas/Missing'"),
            Syntax::Yaml,
        )
        .unwrap();
        let err = prepare(&mut doc).unwrap_err();
        assert!(matches!(err, GenerateError::Resolve { .. }));
        assert!(err.to_string().contains("E1022"), "{err}");
    }

    #[test]
    fn missing_input_is_a_load_error() {
        let err = Generator::default()
            .generate_file(Path::new("does-not-exist.yaml"))
            .unwrap_err();
        assert!(matches!(err, GenerateError::Load(_)));
        assert!(err.to_string().starts_with("E1001"), "{err}");
    }

    #[test]
    fn run_writes_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("petstore.yaml");
        fs::write(&input, PETSTORE).unwrap();
        let output = dir.path().join("out/api");

        let generator = Generator::new(GeneratorConfig::new().with_output(&output));
        let written = generator.run(&input).unwrap();

        assert_eq!(written.len(), 4);
        for name in ["types.rs", "server.rs", "security.rs", "mod.rs"] {
            let contents = fs::read_to_string(output.join(name)).unwrap();
            assert!(contents.starts_with("// Code generated by oasgen "), "{name}");
        }
    }

    #[test]
    fn write_into_a_file_path_fails_with_create_dir() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = write_artifacts(&file.path().join("sub"), &[Artifact::new("mod", String::new())])
            .unwrap_err();
        assert!(err.to_string().starts_with("E1030"), "{err}");
    }

    #[test]
    fn summary_counts_document_parts() {
        let mut doc = load_str(PETSTORE, Syntax::Yaml).unwrap();
        let references = prepare(&mut doc).unwrap();
        let summary = DocumentSummary::of(&doc, references);
        assert_eq!(summary.title, "Petstore");
        assert_eq!(summary.operations, 1);
        assert_eq!(summary.schemas, 1);
        assert_eq!(summary.security_schemes, 1);
        assert_eq!(summary.references, 1);
    }
}
