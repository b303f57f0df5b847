//! Document invariants and reference soundness.

use crate::error::{ReferenceError, ResolveError, ValidationError};
use crate::model::{
    AdditionalProperties, Document, MediaType, Operation, Parameter, PathItem, RefOr,
    RequestBody, Response, SchemaRef,
};
use crate::resolver::Resolver;

/// Check the required top-level fields.
pub fn validate(document: &Document) -> Result<(), ValidationError> {
    if document.openapi.trim().is_empty() {
        return Err(ValidationError::MissingField("openapi"));
    }
    if document.openapi.split('.').next() != Some("3") {
        return Err(ValidationError::UnsupportedVersion(document.openapi.clone()));
    }
    if document.info.title.trim().is_empty() {
        return Err(ValidationError::MissingField("info.title"));
    }
    if document.info.version.trim().is_empty() {
        return Err(ValidationError::MissingField("info.version"));
    }
    if document.paths.is_none() && document.components.is_none() {
        return Err(ValidationError::Empty);
    }
    Ok(())
}

/// Resolve every `$ref` in the document against the kind its position implies.
///
/// Components are walked directly and references are not followed, so the
/// walk terminates on cyclic schemas; each distinct pointer is resolved
/// once thanks to the resolver cache. Returns the number of references
/// checked.
pub fn check_references(document: &Document, resolver: &Resolver<'_>) -> Result<usize, ReferenceError> {
    let mut checker = Checker {
        resolver,
        checked: 0,
    };

    if let Some(components) = &document.components {
        for (name, schema) in &components.schemas {
            checker.schema(schema, &format!("components.schemas.{name}"))?;
        }
        for (name, response) in &components.responses {
            checker.response_ref(response, &format!("components.responses.{name}"))?;
        }
        for (name, parameter) in &components.parameters {
            checker.parameter_ref(parameter, &format!("components.parameters.{name}"))?;
        }
        for (name, body) in &components.request_bodies {
            checker.request_body_ref(body, &format!("components.requestBodies.{name}"))?;
        }
    }
    for (path, item) in document.paths.iter().flatten() {
        checker.path_item(item, path)?;
    }
    for (name, item) in &document.webhooks {
        checker.path_item(item, &format!("webhook {name}"))?;
    }

    Ok(checker.checked)
}

struct Checker<'r, 'a> {
    resolver: &'r Resolver<'a>,
    checked: usize,
}

impl Checker<'_, '_> {
    fn fail(location: &str, source: ResolveError) -> ReferenceError {
        ReferenceError {
            location: location.to_string(),
            source,
        }
    }

    fn path_item(&mut self, item: &PathItem, location: &str) -> Result<(), ReferenceError> {
        for (i, parameter) in item.parameters.iter().enumerate() {
            self.parameter_ref(parameter, &format!("{location} parameter #{i}"))?;
        }
        for (method, operation) in item.operations() {
            self.operation(operation, &format!("{method} {location}"))?;
        }
        Ok(())
    }

    fn operation(&mut self, operation: &Operation, location: &str) -> Result<(), ReferenceError> {
        for (i, parameter) in operation.parameters.iter().enumerate() {
            self.parameter_ref(parameter, &format!("{location} parameter #{i}"))?;
        }
        if let Some(body) = &operation.request_body {
            self.request_body_ref(body, &format!("{location} request body"))?;
        }
        for (status, response) in &operation.responses {
            self.response_ref(response, &format!("{location} response {status}"))?;
        }
        Ok(())
    }

    fn request_body_ref(&mut self, body: &RefOr<RequestBody>, location: &str) -> Result<(), ReferenceError> {
        match body {
            RefOr::Ref { reference } => {
                self.checked += 1;
                self.resolver
                    .resolve_request_body(reference)
                    .map(|_| ())
                    .map_err(|e| Self::fail(location, e))
            }
            RefOr::Item(body) => self.request_body(body, location),
        }
    }

    fn response_ref(&mut self, response: &RefOr<Response>, location: &str) -> Result<(), ReferenceError> {
        match response {
            RefOr::Ref { reference } => {
                self.checked += 1;
                self.resolver
                    .resolve_response(reference)
                    .map(|_| ())
                    .map_err(|e| Self::fail(location, e))
            }
            RefOr::Item(response) => self.response(response, location),
        }
    }

    fn parameter_ref(&mut self, parameter: &RefOr<Parameter>, location: &str) -> Result<(), ReferenceError> {
        match parameter {
            RefOr::Ref { reference } => {
                self.checked += 1;
                self.resolver
                    .resolve_parameter(reference)
                    .map(|_| ())
                    .map_err(|e| Self::fail(location, e))
            }
            RefOr::Item(parameter) => self.parameter(parameter, location),
        }
    }

    fn parameter(&mut self, parameter: &Parameter, location: &str) -> Result<(), ReferenceError> {
        match &parameter.schema {
            Some(schema) => self.schema(schema, location),
            None => Ok(()),
        }
    }

    fn request_body(&mut self, body: &RequestBody, location: &str) -> Result<(), ReferenceError> {
        body.content
            .values()
            .try_for_each(|media| self.media(media, location))
    }

    fn response(&mut self, response: &Response, location: &str) -> Result<(), ReferenceError> {
        response
            .content
            .values()
            .try_for_each(|media| self.media(media, location))
    }

    fn media(&mut self, media: &MediaType, location: &str) -> Result<(), ReferenceError> {
        match &media.schema {
            Some(schema) => self.schema(schema, location),
            None => Ok(()),
        }
    }

    fn schema(&mut self, schema_ref: &SchemaRef, location: &str) -> Result<(), ReferenceError> {
        if let Some(pointer) = schema_ref.reference() {
            self.checked += 1;
            return self
                .resolver
                .resolve_schema(pointer)
                .map(|_| ())
                .map_err(|e| Self::fail(location, e));
        }
        let Some(schema) = schema_ref.as_inline() else {
            return Ok(());
        };

        for (name, property) in &schema.properties {
            self.schema(property, &format!("{location}.{name}"))?;
        }
        if let Some(items) = &schema.items {
            self.schema(items, &format!("{location}[]"))?;
        }
        if let Some(AdditionalProperties::Schema(extra)) = &schema.additional_properties {
            self.schema(extra, &format!("{location}.additionalProperties"))?;
        }
        for (keyword, members) in [
            ("allOf", &schema.all_of),
            ("oneOf", &schema.one_of),
            ("anyOf", &schema.any_of),
        ] {
            for (i, member) in members.iter().enumerate() {
                self.schema(member, &format!("{location}.{keyword}[{i}]"))?;
            }
        }
        if let Some(not) = &schema.not {
            self.schema(not, &format!("{location}.not"))?;
        }
        Ok(())
    }
}
