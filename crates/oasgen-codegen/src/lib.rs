//! Turns an OpenAPI 3.x document into Rust source.
//!
//! The pipeline loads and validates a document, maps its schemas onto
//! Rust type shapes, and renders `types.rs`, `server.rs`, `security.rs`,
//! `webhooks.rs` and a `mod.rs` index. Emitted code targets
//! `oasgen-runtime`.

pub mod config;
pub mod emit;
pub mod error;
pub mod mapper;
pub mod naming;
pub mod pipeline;

/// Version stamped into every generated file header.
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use config::GeneratorConfig;
pub use error::{EmitError, GenerateError};
pub use mapper::{Field, TypeDescriptor, TypeMapper};
pub use naming::{
    constant_name, operation_name, to_exported_name, to_field_name, type_name, variant_name,
};
pub use pipeline::{load_document, prepare, write_artifacts, Artifact, DocumentSummary, Generator};
