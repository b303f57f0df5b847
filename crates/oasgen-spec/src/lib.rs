//! OpenAPI 3.x document model.
//!
//! Loads YAML/JSON documents into a typed model, folds the schema-type
//! conventions of 3.0, 3.1 and 3.2 into one canonical shape, resolves
//! internal `$ref` pointers and checks document-level invariants.

pub mod error;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod resolver;
pub mod validate;

pub use error::{LoadError, ReferenceError, ResolveError, ValidationError};
pub use loader::{load, load_file, load_str, Syntax};
pub use model::{
    AdditionalProperties, ApiKeyLocation, Components, Document, HttpMethod, Info, MediaType,
    Operation, Parameter, ParameterLocation, PathItem, RefOr, RequestBody, Response, Schema,
    SchemaRef, SecurityRequirement, SecurityScheme,
};
pub use normalize::{canonicalize_types, normalize, NULL_TYPE};
pub use resolver::{pointer_name, Component, ComponentKind, Resolver};
pub use validate::{check_references, validate};
