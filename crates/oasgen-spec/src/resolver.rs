//! Internal `$ref` resolution with a write-once cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use crate::error::ResolveError;
use crate::model::{Document, Parameter, RefOr, RequestBody, Response, SchemaRef};

/// The component sections a pointer may address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Schema,
    Response,
    Parameter,
    RequestBody,
}

impl ComponentKind {
    fn from_section(section: &str) -> Option<Self> {
        match section {
            "schemas" => Some(ComponentKind::Schema),
            "responses" => Some(ComponentKind::Response),
            "parameters" => Some(ComponentKind::Parameter),
            "requestBodies" => Some(ComponentKind::RequestBody),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Schema => "schema",
            ComponentKind::Response => "response",
            ComponentKind::Parameter => "parameter",
            ComponentKind::RequestBody => "request body",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved component, borrowed from the document.
#[derive(Debug, Clone, Copy)]
pub enum Component<'a> {
    Schema(&'a SchemaRef),
    Response(&'a Response),
    Parameter(&'a Parameter),
    RequestBody(&'a RequestBody),
}

impl Component<'_> {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Schema(_) => ComponentKind::Schema,
            Component::Response(_) => ComponentKind::Response,
            Component::Parameter(_) => ComponentKind::Parameter,
            Component::RequestBody(_) => ComponentKind::RequestBody,
        }
    }
}

/// A component entry: either the node itself or another pointer.
enum Entry<'a> {
    Found(Component<'a>),
    Alias(&'a str),
}

fn entry<'a, T>(item: &'a RefOr<T>, wrap: fn(&'a T) -> Component<'a>) -> Entry<'a> {
    match item {
        RefOr::Item(value) => Entry::Found(wrap(value)),
        RefOr::Ref { reference } => Entry::Alias(reference),
    }
}

/// Split a pointer into its component section and unescaped name.
fn parse_pointer(pointer: &str) -> Result<(ComponentKind, String), ResolveError> {
    let Some(fragment) = pointer.strip_prefix('#') else {
        return Err(ResolveError::External(pointer.to_string()));
    };
    let Some(path) = fragment.strip_prefix('/') else {
        return Err(ResolveError::UnsupportedPointer(pointer.to_string()));
    };

    let segments: Vec<String> = path
        .split('/')
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect();

    match segments.as_slice() {
        [root, section, name] if root == "components" && !name.is_empty() => {
            let kind = ComponentKind::from_section(section)
                .ok_or_else(|| ResolveError::UnsupportedPointer(pointer.to_string()))?;
            Ok((kind, name.clone()))
        }
        _ => Err(ResolveError::UnsupportedPointer(pointer.to_string())),
    }
}

/// Resolves `#/components/...` pointers against one document.
///
/// Results are memoized by the verbatim pointer string; a repeated lookup
/// returns the same borrowed node. A response, parameter or request body
/// component that is itself a `$ref` is followed to its target, and a
/// chain that loops is an error. References inside schemas are never
/// followed, so callers that recurse through resolved schemas own cycle
/// detection.
pub struct Resolver<'a> {
    document: &'a Document,
    cache: RefCell<HashMap<String, Component<'a>>>,
}

impl<'a> Resolver<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self {
            document,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// Resolve any component pointer.
    pub fn resolve(&self, pointer: &str) -> Result<Component<'a>, ResolveError> {
        self.resolve_chain(pointer, &mut Vec::new())
    }

    fn resolve_chain(&self, pointer: &str, chain: &mut Vec<String>) -> Result<Component<'a>, ResolveError> {
        if let Some(hit) = self.cache.borrow().get(pointer) {
            return Ok(*hit);
        }
        if chain.iter().any(|seen| seen == pointer) {
            return Err(ResolveError::Cycle(pointer.to_string()));
        }

        let (kind, name) = parse_pointer(pointer)?;
        let missing = || ResolveError::Missing(pointer.to_string());
        let components = self.document.components.as_ref().ok_or_else(missing)?;
        let found = match kind {
            ComponentKind::Schema => components
                .schemas
                .get(&name)
                .map(|schema| Entry::Found(Component::Schema(schema))),
            ComponentKind::Response => components
                .responses
                .get(&name)
                .map(|item| entry(item, Component::Response)),
            ComponentKind::Parameter => components
                .parameters
                .get(&name)
                .map(|item| entry(item, Component::Parameter)),
            ComponentKind::RequestBody => components
                .request_bodies
                .get(&name)
                .map(|item| entry(item, Component::RequestBody)),
        }
        .ok_or_else(missing)?;

        let component = match found {
            Entry::Found(component) => component,
            Entry::Alias(target) => {
                chain.push(pointer.to_string());
                let component = self.resolve_chain(target, chain)?;
                if component.kind() != kind {
                    return Err(mismatch(target, kind));
                }
                component
            }
        };

        tracing::trace!(pointer, kind = %kind, "resolved reference");
        self.cache
            .borrow_mut()
            .insert(pointer.to_string(), component);
        Ok(component)
    }

    pub fn resolve_schema(&self, pointer: &str) -> Result<&'a SchemaRef, ResolveError> {
        match self.resolve(pointer)? {
            Component::Schema(schema) => Ok(schema),
            _ => Err(mismatch(pointer, ComponentKind::Schema)),
        }
    }

    pub fn resolve_response(&self, pointer: &str) -> Result<&'a Response, ResolveError> {
        match self.resolve(pointer)? {
            Component::Response(response) => Ok(response),
            _ => Err(mismatch(pointer, ComponentKind::Response)),
        }
    }

    pub fn resolve_parameter(&self, pointer: &str) -> Result<&'a Parameter, ResolveError> {
        match self.resolve(pointer)? {
            Component::Parameter(parameter) => Ok(parameter),
            _ => Err(mismatch(pointer, ComponentKind::Parameter)),
        }
    }

    pub fn resolve_request_body(&self, pointer: &str) -> Result<&'a RequestBody, ResolveError> {
        match self.resolve(pointer)? {
            Component::RequestBody(body) => Ok(body),
            _ => Err(mismatch(pointer, ComponentKind::RequestBody)),
        }
    }

    /// Number of distinct pointers resolved so far.
    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }
}

fn mismatch(pointer: &str, expected: ComponentKind) -> ResolveError {
    ResolveError::KindMismatch {
        pointer: pointer.to_string(),
        expected: expected.as_str(),
    }
}

/// The final segment of a pointer, unescaped.
pub fn pointer_name(pointer: &str) -> String {
    let last = pointer.rsplit('/').next().unwrap_or(pointer);
    last.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_str, Syntax};

    fn document() -> Document {
        load_str(
            r#"
openapi: 3.1.0
info: { title: T, version: "1" }
components:
  schemas:
    Pet: { type: object }
    a/b: { type: string }
    t~x: { type: string }
  parameters:
    Limit: { name: limit, in: query, schema: { type: integer } }
  responses:
    NotFound: { description: missing }
  requestBodies:
    NewPet:
      content:
        application/json:
          schema: { $ref: '#/components/schemas/Pet' }
"#,
            Syntax::Yaml,
        )
        .unwrap()
    }

    #[test]
    fn resolves_each_component_kind() {
        let doc = document();
        let resolver = Resolver::new(&doc);
        assert!(resolver.resolve_schema("#/components/schemas/Pet").is_ok());
        assert_eq!(
            resolver
                .resolve_parameter("#/components/parameters/Limit")
                .unwrap()
                .name,
            "limit"
        );
        assert_eq!(
            resolver
                .resolve_response("#/components/responses/NotFound")
                .unwrap()
                .description,
            "missing"
        );
        assert!(resolver
            .resolve_request_body("#/components/requestBodies/NewPet")
            .is_ok());
    }

    #[test]
    fn repeated_resolution_returns_the_same_node() {
        let doc = document();
        let resolver = Resolver::new(&doc);
        let first = resolver.resolve_schema("#/components/schemas/Pet").unwrap();
        let second = resolver.resolve_schema("#/components/schemas/Pet").unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(resolver.cached(), 1);
    }

    #[test]
    fn unescapes_pointer_segments() {
        let doc = document();
        let resolver = Resolver::new(&doc);
        assert!(resolver.resolve_schema("#/components/schemas/a~1b").is_ok());
        assert!(resolver.resolve_schema("#/components/schemas/t~0x").is_ok());
    }

    #[test]
    fn rejects_external_and_malformed_pointers() {
        let doc = document();
        let resolver = Resolver::new(&doc);
        assert_eq!(
            resolver.resolve("other.yaml#/components/schemas/Pet").unwrap_err(),
            ResolveError::External("other.yaml#/components/schemas/Pet".into())
        );
        assert_eq!(
            resolver.resolve("https://example.com/pet.json").unwrap_err(),
            ResolveError::External("https://example.com/pet.json".into())
        );
        for pointer in [
            "#",
            "#/components/schemas",
            "#/components/schemas/Pet/properties/id",
            "#/definitions/Pet",
            "#/components/headers/X",
            "#/components/schemas/",
        ] {
            assert!(
                matches!(
                    resolver.resolve(pointer),
                    Err(ResolveError::UnsupportedPointer(_))
                ),
                "{pointer} should be unsupported"
            );
        }
    }

    #[test]
    fn missing_component_and_kind_mismatch() {
        let doc = document();
        let resolver = Resolver::new(&doc);
        assert_eq!(
            resolver.resolve("#/components/schemas/Dog").unwrap_err(),
            ResolveError::Missing("#/components/schemas/Dog".into())
        );
        assert!(matches!(
            resolver.resolve_schema("#/components/parameters/Limit"),
            Err(ResolveError::KindMismatch { expected: "schema", .. })
        ));
    }

    #[test]
    fn component_aliases_are_followed() {
        let doc = load_str(
            r#"
openapi: 3.1.0
info: { title: T, version: "1" }
components:
  parameters:
    Limit: { name: limit, in: query }
    PageSize: { $ref: '#/components/parameters/Limit' }
    Size: { $ref: '#/components/parameters/PageSize' }
  responses:
    Gone: { $ref: '#/components/responses/DoesNotExist' }
    Ping: { $ref: '#/components/responses/Pong' }
    Pong: { $ref: '#/components/responses/Ping' }
    Odd: { $ref: '#/components/parameters/Limit' }
"#,
            Syntax::Yaml,
        )
        .unwrap();
        let resolver = Resolver::new(&doc);

        let limit = resolver.resolve_parameter("#/components/parameters/Limit").unwrap();
        let size = resolver.resolve_parameter("#/components/parameters/Size").unwrap();
        assert!(std::ptr::eq(limit, size));

        assert_eq!(
            resolver.resolve("#/components/responses/Gone").unwrap_err(),
            ResolveError::Missing("#/components/responses/DoesNotExist".into())
        );
        assert_eq!(
            resolver.resolve("#/components/responses/Ping").unwrap_err(),
            ResolveError::Cycle("#/components/responses/Ping".into())
        );
        assert!(matches!(
            resolver.resolve("#/components/responses/Odd"),
            Err(ResolveError::KindMismatch { expected: "response", .. })
        ));
    }

    #[test]
    fn document_without_components_reports_missing() {
        let doc = load_str(
            "openapi: 3.1.0\ninfo: {title: T, version: '1'}\npaths: {}\n",
            Syntax::Yaml,
        )
        .unwrap();
        let resolver = Resolver::new(&doc);
        assert!(matches!(
            resolver.resolve("#/components/schemas/Pet"),
            Err(ResolveError::Missing(_))
        ));
    }

    #[test]
    fn pointer_name_is_final_segment() {
        assert_eq!(pointer_name("#/components/schemas/pet-status"), "pet-status");
        assert_eq!(pointer_name("Pet"), "Pet");
        assert_eq!(pointer_name("#/components/schemas/t~0x"), "t~x");
    }
}
