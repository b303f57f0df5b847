use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::normalize::{deserialize_type_names, NULL_TYPE};

/// A parsed OpenAPI 3.x document.
///
/// Fields the validator checks are defaulted during decoding so that a
/// missing `openapi` or `info.title` surfaces as a [`crate::ValidationError`]
/// rather than a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Document {
    /// The `openapi` version string (e.g. "3.1.0").
    #[serde(default)]
    pub openapi: String,
    #[serde(default)]
    pub info: Info,
    /// Path table, keyed by path template. `None` when the field is absent.
    #[serde(default)]
    pub paths: Option<BTreeMap<String, PathItem>>,
    /// Webhook table (OpenAPI 3.1+), keyed by webhook name.
    #[serde(default)]
    pub webhooks: BTreeMap<String, PathItem>,
    #[serde(default)]
    pub components: Option<Components>,
    /// Document-level security requirements. `None` when absent.
    #[serde(default)]
    pub security: Option<Vec<SecurityRequirement>>,
}

impl Document {
    /// Iterate every operation in sorted path order and verb precedence.
    pub fn operations(&self) -> impl Iterator<Item = (&str, HttpMethod, &PathItem, &Operation)> {
        self.paths.iter().flatten().flat_map(|(path, item)| {
            item.operations()
                .map(move |(method, op)| (path.as_str(), method, item, op))
        })
    }

    /// Named security schemes declared in `components.securitySchemes`.
    pub fn security_schemes(&self) -> Option<&BTreeMap<String, SecurityScheme>> {
        self.components
            .as_ref()
            .map(|c| &c.security_schemes)
            .filter(|s| !s.is_empty())
    }

    /// Named schemas declared in `components.schemas`.
    pub fn schemas(&self) -> impl Iterator<Item = (&String, &SchemaRef)> {
        self.components.iter().flat_map(|c| c.schemas.iter())
    }
}

/// The `info` block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// HTTP verbs, in the precedence used for intra-path ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Head,
    Trace,
}

impl HttpMethod {
    /// All verbs in emission precedence.
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Trace,
    ];

    /// Upper-case wire name (`GET`).
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Lower-case name as used for path-item keys (`get`).
    pub fn key(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Trace => "trace",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A path item: at most one operation per verb plus shared parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub get: Option<Operation>,
    #[serde(default)]
    pub put: Option<Operation>,
    #[serde(default)]
    pub post: Option<Operation>,
    #[serde(default)]
    pub delete: Option<Operation>,
    #[serde(default)]
    pub options: Option<Operation>,
    #[serde(default)]
    pub head: Option<Operation>,
    #[serde(default)]
    pub patch: Option<Operation>,
    #[serde(default)]
    pub trace: Option<Operation>,
    /// Parameters inherited by every operation of this path.
    #[serde(default)]
    pub parameters: Vec<RefOr<Parameter>>,
}

impl PathItem {
    /// The operation declared for `method`, if any.
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
            HttpMethod::Trace => self.trace.as_ref(),
        }
    }

    pub(crate) fn operation_mut(&mut self, method: HttpMethod) -> Option<&mut Operation> {
        match method {
            HttpMethod::Get => self.get.as_mut(),
            HttpMethod::Post => self.post.as_mut(),
            HttpMethod::Put => self.put.as_mut(),
            HttpMethod::Patch => self.patch.as_mut(),
            HttpMethod::Delete => self.delete.as_mut(),
            HttpMethod::Options => self.options.as_mut(),
            HttpMethod::Head => self.head.as_mut(),
            HttpMethod::Trace => self.trace.as_mut(),
        }
    }

    /// Declared operations in verb precedence order.
    pub fn operations(&self) -> impl Iterator<Item = (HttpMethod, &Operation)> {
        HttpMethod::ALL
            .into_iter()
            .filter_map(move |m| self.operation(m).map(|op| (m, op)))
    }
}

/// A single operation (one verb on one path).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<RefOr<Parameter>>,
    #[serde(default)]
    pub request_body: Option<RefOr<RequestBody>>,
    /// Responses keyed by status code (`"200"`, `"4XX"`, `"default"`).
    #[serde(default)]
    pub responses: BTreeMap<String, RefOr<Response>>,
    /// Operation-level security.
    ///
    /// `None` inherits the document-level list; `Some(vec![])` is the
    /// explicit "no authentication" marker.
    #[serde(default)]
    pub security: Option<Vec<SecurityRequirement>>,
    #[serde(default)]
    pub deprecated: bool,
}

/// Either a `$ref` pointer or an inline value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RefOr<T> {
    Ref {
        #[serde(rename = "$ref")]
        reference: String,
    },
    Item(T),
}

impl<T> RefOr<T> {
    /// The reference pointer, if this is a `$ref` entry.
    pub fn reference(&self) -> Option<&str> {
        match self {
            RefOr::Ref { reference } => Some(reference),
            RefOr::Item(_) => None,
        }
    }
}

/// Location of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
    /// OpenAPI 3.2 whole-query-string parameter.
    #[serde(rename = "querystring")]
    QueryString,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
            ParameterLocation::QueryString => "querystring",
        }
    }
}

/// An operation parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub schema: Option<SchemaRef>,
}

/// A media type entry in a `content` map.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaType {
    #[serde(default)]
    pub schema: Option<SchemaRef>,
}

/// Pick the JSON media type out of a `content` map.
///
/// Exact `application/json` wins, then `application/json; ...`, then the
/// first structured-syntax `+json` type.
pub fn json_media(content: &BTreeMap<String, MediaType>) -> Option<&MediaType> {
    content
        .get("application/json")
        .or_else(|| {
            content
                .iter()
                .find(|(k, _)| k.starts_with("application/json"))
                .map(|(_, v)| v)
        })
        .or_else(|| {
            content
                .iter()
                .find(|(k, _)| k.ends_with("+json"))
                .map(|(_, v)| v)
        })
}

/// A request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
    #[serde(default)]
    pub required: bool,
}

impl RequestBody {
    pub fn json(&self) -> Option<&MediaType> {
        json_media(&self.content)
    }
}

/// A response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
}

impl Response {
    pub fn json(&self) -> Option<&MediaType> {
        json_media(&self.content)
    }
}

/// A reference-or-inline schema.
///
/// When a non-empty `$ref` is present it is the semantic value; any sibling
/// keywords decoded alongside it are kept in `schema` but never consulted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaRef {
    reference: Option<String>,
    schema: Box<Schema>,
}

impl SchemaRef {
    /// A reference to `pointer`.
    pub fn reference_to(pointer: impl Into<String>) -> Self {
        Self {
            reference: Some(pointer.into()).filter(|p: &String| !p.is_empty()),
            schema: Box::default(),
        }
    }

    /// An inline schema.
    pub fn inline(schema: Schema) -> Self {
        Self {
            reference: None,
            schema: Box::new(schema),
        }
    }

    /// The reference pointer, if any.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// The inline schema, unless a reference takes precedence.
    pub fn as_inline(&self) -> Option<&Schema> {
        match self.reference {
            Some(_) => None,
            None => Some(&self.schema),
        }
    }

    pub(crate) fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }
}

impl<'de> Deserialize<'de> for SchemaRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut schema = Schema::deserialize(deserializer)?;
        let reference = schema.reference.take().filter(|r| !r.is_empty());
        Ok(Self {
            reference,
            schema: Box::new(schema),
        })
    }
}

/// `additionalProperties`: a boolean switch or a value schema.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(SchemaRef),
}

/// A JSON Schema node, restricted to the keywords code generation uses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Raw `$ref`; moved into [`SchemaRef`] during decoding.
    #[serde(default, rename = "$ref")]
    pub(crate) reference: Option<String>,
    /// Type names, always in list form. After normalization `"null"`, if
    /// present, is last.
    #[serde(default, rename = "type", deserialize_with = "deserialize_type_names")]
    pub types: Vec<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, SchemaRef>,
    #[serde(default)]
    pub items: Option<SchemaRef>,
    #[serde(default)]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default, rename = "enum")]
    pub enum_values: Vec<Value>,
    #[serde(default)]
    pub all_of: Vec<SchemaRef>,
    #[serde(default)]
    pub one_of: Vec<SchemaRef>,
    #[serde(default)]
    pub any_of: Vec<SchemaRef>,
    #[serde(default)]
    pub not: Option<SchemaRef>,
    /// OpenAPI 3.0 `nullable`; folded into `types` by the normalizer.
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub deprecated: bool,
}

impl Schema {
    /// A schema with a single type name.
    pub fn of_type(name: &str) -> Self {
        Self {
            types: vec![name.to_string()],
            ..Self::default()
        }
    }

    /// The first non-`null` type name.
    pub fn primary_type(&self) -> Option<&str> {
        self.types
            .iter()
            .map(String::as_str)
            .find(|t| *t != NULL_TYPE)
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.required.iter().any(|r| r == property)
    }

    /// String literals of the `enum` keyword, skipping `null` and non-strings.
    pub fn string_enum(&self) -> Vec<String> {
        self.enum_values
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

/// A security requirement clause: scheme name to required scopes.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// Where an API key is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

/// A security scheme declaration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum SecurityScheme {
    #[serde(rename = "apiKey")]
    ApiKey {
        name: String,
        #[serde(rename = "in")]
        location: ApiKeyLocation,
        #[serde(default)]
        description: Option<String>,
    },
    #[serde(rename = "http")]
    Http {
        scheme: String,
        #[serde(default, rename = "bearerFormat")]
        bearer_format: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    #[serde(rename = "oauth2")]
    OAuth2 {
        #[serde(default)]
        flows: Value,
        #[serde(default)]
        description: Option<String>,
    },
    #[serde(rename = "openIdConnect")]
    OpenIdConnect {
        #[serde(default, rename = "openIdConnectUrl")]
        open_id_connect_url: String,
        #[serde(default)]
        description: Option<String>,
    },
    #[serde(rename = "mutualTLS")]
    MutualTls {
        #[serde(default)]
        description: Option<String>,
    },
}

impl SecurityScheme {
    pub fn description(&self) -> Option<&str> {
        match self {
            SecurityScheme::ApiKey { description, .. }
            | SecurityScheme::Http { description, .. }
            | SecurityScheme::OAuth2 { description, .. }
            | SecurityScheme::OpenIdConnect { description, .. }
            | SecurityScheme::MutualTls { description } => description.as_deref(),
        }
    }
}

/// Reusable components addressed by `#/components/<kind>/<name>`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    #[serde(default)]
    pub schemas: BTreeMap<String, SchemaRef>,
    #[serde(default)]
    pub responses: BTreeMap<String, RefOr<Response>>,
    #[serde(default)]
    pub parameters: BTreeMap<String, RefOr<Parameter>>,
    #[serde(default)]
    pub request_bodies: BTreeMap<String, RefOr<RequestBody>>,
    #[serde(default)]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}
