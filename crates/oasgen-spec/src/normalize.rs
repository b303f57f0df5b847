//! Canonicalization of the version-variant schema `type` field.
//!
//! OpenAPI 3.0 writes `type: string` plus `nullable: true`; 3.1 writes
//! `type: [string, "null"]`. Both decode into a list here and are then folded
//! into one canonical list, so nothing downstream asks which convention a
//! document used.

use std::collections::HashSet;
use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;

use crate::model::{
    AdditionalProperties, Components, Document, HttpMethod, MediaType, Operation, Parameter,
    PathItem, RefOr, RequestBody, Response, SchemaRef,
};

/// The JSON Schema `null` type name.
pub const NULL_TYPE: &str = "null";

/// Decode a `type` field given either as a single name or a list of names.
pub(crate) fn deserialize_type_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(TypeNamesVisitor)
}

struct TypeNamesVisitor;

impl<'de> Visitor<'de> for TypeNamesVisitor {
    type Value = Vec<String>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a type name or a list of type names")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(vec![value.to_string()])
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(vec![value])
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Vec::new())
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Vec::new())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut names = Vec::with_capacity(seq.size_hint().unwrap_or(2));
        while let Some(TypeName(name)) = seq.next_element()? {
            names.push(name);
        }
        Ok(names)
    }
}

/// One element of a type list; only strings are accepted.
struct TypeName(String);

impl<'de> Deserialize<'de> for TypeName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NameVisitor;

        impl<'de> Visitor<'de> for NameVisitor {
            type Value = TypeName;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a type name")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<TypeName, E> {
                Ok(TypeName(value.to_string()))
            }
        }

        deserializer.deserialize_any(NameVisitor)
    }
}

/// Fold a decoded type list and legacy `nullable` flag into canonical form.
///
/// After this call `nullable` is `None`, names are unique (first occurrence
/// kept) and `"null"`, if present, is the last entry.
pub fn canonicalize_types(types: &mut Vec<String>, nullable: &mut Option<bool>) {
    if nullable.take() == Some(true) {
        types.push(NULL_TYPE.to_string());
    }

    let mut seen = HashSet::with_capacity(types.len());
    types.retain(|t| seen.insert(t.clone()));

    if let Some(pos) = types.iter().position(|t| t == NULL_TYPE) {
        let null = types.remove(pos);
        types.push(null);
    }
}

/// Canonicalize every schema reachable from the document.
///
/// Walks components, path items, operations and webhooks, descending through
/// properties, items, `additionalProperties` and all composition keywords.
/// `$ref` edges are not followed, so each schema node of the owned tree is
/// visited exactly once. Returns the number of schema nodes visited.
pub fn normalize(document: &mut Document) -> usize {
    let mut walker = Walker::default();

    if let Some(components) = document.components.as_mut() {
        walker.components(components);
    }
    for item in document.paths.iter_mut().flat_map(|p| p.values_mut()) {
        walker.path_item(item);
    }
    for item in document.webhooks.values_mut() {
        walker.path_item(item);
    }

    tracing::debug!(schemas = walker.visited, "normalized schema types");
    walker.visited
}

#[derive(Default)]
struct Walker {
    visited: usize,
}

impl Walker {
    fn components(&mut self, components: &mut Components) {
        for schema in components.schemas.values_mut() {
            self.schema(schema);
        }
        for response in components.responses.values_mut() {
            if let RefOr::Item(response) = response {
                self.response(response);
            }
        }
        for parameter in components.parameters.values_mut() {
            if let RefOr::Item(parameter) = parameter {
                self.parameter(parameter);
            }
        }
        for body in components.request_bodies.values_mut() {
            if let RefOr::Item(body) = body {
                self.request_body(body);
            }
        }
    }

    fn path_item(&mut self, item: &mut PathItem) {
        for parameter in &mut item.parameters {
            if let RefOr::Item(parameter) = parameter {
                self.parameter(parameter);
            }
        }
        for method in HttpMethod::ALL {
            if let Some(operation) = item.operation_mut(method) {
                self.operation(operation);
            }
        }
    }

    fn operation(&mut self, operation: &mut Operation) {
        for parameter in &mut operation.parameters {
            if let RefOr::Item(parameter) = parameter {
                self.parameter(parameter);
            }
        }
        if let Some(RefOr::Item(body)) = operation.request_body.as_mut() {
            self.request_body(body);
        }
        for response in operation.responses.values_mut() {
            if let RefOr::Item(response) = response {
                self.response(response);
            }
        }
    }

    fn parameter(&mut self, parameter: &mut Parameter) {
        if let Some(schema) = parameter.schema.as_mut() {
            self.schema(schema);
        }
    }

    fn request_body(&mut self, body: &mut RequestBody) {
        for media in body.content.values_mut() {
            self.media(media);
        }
    }

    fn response(&mut self, response: &mut Response) {
        for media in response.content.values_mut() {
            self.media(media);
        }
    }

    fn media(&mut self, media: &mut MediaType) {
        if let Some(schema) = media.schema.as_mut() {
            self.schema(schema);
        }
    }

    fn schema(&mut self, schema_ref: &mut SchemaRef) {
        self.visited += 1;
        let schema = schema_ref.schema_mut();
        canonicalize_types(&mut schema.types, &mut schema.nullable);

        for property in schema.properties.values_mut() {
            self.schema(property);
        }
        if let Some(items) = schema.items.as_mut() {
            self.schema(items);
        }
        if let Some(AdditionalProperties::Schema(extra)) = schema.additional_properties.as_mut() {
            self.schema(extra);
        }
        for member in schema
            .all_of
            .iter_mut()
            .chain(schema.one_of.iter_mut())
            .chain(schema.any_of.iter_mut())
        {
            self.schema(member);
        }
        if let Some(not) = schema.not.as_mut() {
            self.schema(not);
        }
    }
}
