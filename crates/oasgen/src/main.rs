//! oasgen command line.
//!
//! Generates typed Rust server code from an OpenAPI 3.x document, or
//! validates documents without generating anything.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use oasgen_codegen::{load_document, DocumentSummary, GenerateError, Generator, GeneratorConfig};
use oasgen_spec::{Document, RefOr, Resolver};
use oasgen_telemetry::{init_logging, LogFormat, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "oasgen", about = "OpenAPI 3.x to Rust code generator", version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, env = "OASGEN_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Log format (pretty or json).
    #[arg(long, global = true, env = "OASGEN_LOG_FORMAT", default_value = "pretty")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate Rust sources from an OpenAPI document.
    Generate {
        /// Input document (YAML or JSON).
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory [default: ./generated].
        #[arg(short, long, env = "OASGEN_OUTPUT")]
        output: Option<PathBuf>,

        /// Package name recorded in the generated mod.rs [default: api].
        #[arg(short, long, env = "OASGEN_PACKAGE")]
        package: Option<String>,

        /// Generator configuration file (YAML). Flags override its values.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Load, normalize and validate document(s) without generating.
    ///
    /// Checks top-level fields (E1010-E1012) and every `$ref` (E1020-E1023).
    Validate {
        /// Input document(s) (YAML or JSON).
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Output format (text or json).
        #[arg(long, default_value = "text")]
        format: String,
    },
}

/// Validation result for a single document.
#[derive(serde::Serialize)]
struct ValidationResult {
    file: String,
    valid: bool,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<DocumentSummary>,
}

#[derive(serde::Serialize)]
struct ValidationIssue {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

impl ValidationIssue {
    /// Split a coded message (`E1022: ...`) into its code and text.
    fn coded(message: String, location: Option<String>) -> Self {
        match message.split_once(": ") {
            Some((code, rest)) if code.starts_with('E') || code.starts_with('W') => Self {
                code: code.to_string(),
                message: rest.to_string(),
                location,
            },
            _ => Self {
                code: "E1000".to_string(),
                message,
                location,
            },
        }
    }

    fn from_error(err: &GenerateError) -> Self {
        match err {
            GenerateError::Resolve { context, source } => {
                Self::coded(source.to_string(), Some(context.clone()))
            }
            other => Self::coded(other.to_string(), None),
        }
    }
}

/// Non-fatal findings: things generation handles, but maybe not as expected.
fn warnings(document: &Document) -> Vec<ValidationIssue> {
    let resolver = Resolver::new(document);
    let mut warnings = Vec::new();

    for (path, method, _, operation) in document.operations() {
        let location = Some(format!("{} {}", method.as_str(), path));
        if operation.operation_id.is_none() {
            warnings.push(ValidationIssue {
                code: "W1001".to_string(),
                message: "no operationId; handler name derived from the path".to_string(),
                location: location.clone(),
            });
        }

        let body = match &operation.request_body {
            Some(RefOr::Item(body)) => Some(body),
            Some(RefOr::Ref { reference }) => resolver.resolve_request_body(reference).ok(),
            None => None,
        };
        if let Some(body) = body {
            if !body.content.is_empty() && body.json().is_none() {
                warnings.push(ValidationIssue {
                    code: "W1002".to_string(),
                    message: "request body has no JSON media type and is not decoded".to_string(),
                    location,
                });
            }
        }
    }

    warnings
}

/// Run the validate command.
fn run_validate(inputs: &[PathBuf], output_format: &str) -> ExitCode {
    let mut results = Vec::new();

    for input in inputs {
        let file = input.display().to_string();
        let result = match load_document(input) {
            Ok((document, references)) => ValidationResult {
                file,
                valid: true,
                errors: Vec::new(),
                warnings: warnings(&document),
                document: Some(DocumentSummary::of(&document, references)),
            },
            Err(e) => ValidationResult {
                file,
                valid: false,
                errors: vec![ValidationIssue::from_error(&e)],
                warnings: Vec::new(),
                document: None,
            },
        };
        results.push(result);
    }

    let has_errors = results.iter().any(|r| !r.valid);

    if output_format == "json" {
        let output = serde_json::json!({
            "results": results,
            "summary": {
                "total": results.len(),
                "valid": results.iter().filter(|r| r.valid).count(),
                "invalid": results.iter().filter(|r| !r.valid).count(),
            }
        });
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(1);
            }
        }
    } else {
        for result in &results {
            if result.valid && result.warnings.is_empty() {
                eprintln!("✓ {} is valid", result.file);
            } else if result.valid {
                eprintln!("✓ {} is valid (with {} warning(s))", result.file, result.warnings.len());
            } else {
                eprintln!("✗ {} has {} error(s)", result.file, result.errors.len());
            }

            for err in &result.errors {
                if let Some(loc) = &err.location {
                    eprintln!("  {} [{}]: {}", err.code, loc, err.message);
                } else {
                    eprintln!("  {}: {}", err.code, err.message);
                }
            }

            for warn in &result.warnings {
                if let Some(loc) = &warn.location {
                    eprintln!("  {} [{}]: {} (warning)", warn.code, loc, warn.message);
                } else {
                    eprintln!("  {}: {} (warning)", warn.code, warn.message);
                }
            }
        }

        let valid_count = results.iter().filter(|r| r.valid).count();
        let total = results.len();
        eprintln!();
        eprintln!(
            "validated {} document(s): {} valid, {} invalid",
            total,
            valid_count,
            total - valid_count
        );
    }

    if has_errors {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

/// Merge the optional config file with command line overrides.
fn generator_config(
    config: Option<&Path>,
    output: Option<PathBuf>,
    package: Option<String>,
) -> Result<GeneratorConfig, GenerateError> {
    let mut config = match config {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    };
    if let Some(output) = output {
        config = config.with_output(output);
    }
    if let Some(package) = package {
        config = config.with_package(package);
    }
    Ok(config)
}

/// Run the generate command.
fn run_generate(
    input: &Path,
    output: Option<PathBuf>,
    package: Option<String>,
    config: Option<&Path>,
) -> ExitCode {
    let config = match generator_config(config, output, package) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };

    let generator = Generator::new(config);
    match generator.run(input) {
        Ok(written) => {
            for path in &written {
                println!("{}", path.display());
            }
            eprintln!(
                "generated {} file(s) in {}",
                written.len(),
                generator.config().output.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(log_format) = LogFormat::parse(&cli.log_format) else {
        eprintln!("error: invalid log format '{}' (expected pretty or json)", cli.log_format);
        return ExitCode::from(1);
    };
    let telemetry = TelemetryConfig::new()
        .with_log_level(cli.log_level.as_str())
        .with_log_format(log_format);
    if let Err(e) = init_logging(&telemetry) {
        eprintln!("error: {e}");
        return ExitCode::from(1);
    }
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), command = ?cli.command, "oasgen starting");

    match cli.command {
        Commands::Generate {
            input,
            output,
            package,
            config,
        } => run_generate(&input, output, package, config.as_deref()),
        Commands::Validate { input, format } => run_validate(&input, &format),
    }
}
