//! Schema to Rust type mapping.

use std::collections::{BTreeMap, BTreeSet};

use oasgen_spec::{pointer_name, AdditionalProperties, Resolver, Schema, SchemaRef};

use crate::naming::type_name;

/// The shape of a schema as seen by the emitters.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// A component schema, by exported name.
    Named(String),
    List(Box<TypeDescriptor>),
    /// An open object with values of one type.
    Map(Box<TypeDescriptor>),
    /// An object with declared properties, sorted by wire name.
    Record(Vec<Field>),
    /// A closed set of string literals.
    StringEnum(Vec<String>),
    String,
    Date,
    DateTime,
    I32,
    I64,
    F32,
    F64,
    Bool,
    /// Anything else; rendered as `serde_json::Value`.
    Any,
}

impl TypeDescriptor {
    /// Whether the type can be parsed from a single string with `FromStr`.
    fn is_scalar(&self) -> bool {
        !matches!(
            self,
            TypeDescriptor::Named(_)
                | TypeDescriptor::List(_)
                | TypeDescriptor::Map(_)
                | TypeDescriptor::Record(_)
                | TypeDescriptor::Any
        )
    }
}

/// One property of a [`TypeDescriptor::Record`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Name on the wire.
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
    pub ty: TypeDescriptor,
}

/// Maps schema references to [`TypeDescriptor`]s.
///
/// Mapping never fails: references become [`TypeDescriptor::Named`]
/// without being followed, and shapes with no better representation map to
/// [`TypeDescriptor::Any`]. References are only followed when merging
/// `allOf` members, under a visited stack.
pub struct TypeMapper<'a> {
    resolver: &'a Resolver<'a>,
    /// Component names whose type renders as a struct.
    records: BTreeSet<String>,
    /// Component names whose type parses from a string.
    scalars: BTreeSet<String>,
}

impl<'a> TypeMapper<'a> {
    pub fn new(resolver: &'a Resolver<'a>) -> Self {
        let mut mapper = Self {
            resolver,
            records: BTreeSet::new(),
            scalars: BTreeSet::new(),
        };

        let mut aliases = BTreeMap::new();
        for (name, schema) in resolver.document().schemas() {
            let name = type_name(name, "Schema");
            match mapper.resolve_type(schema) {
                TypeDescriptor::Record(_) => {
                    mapper.records.insert(name);
                }
                TypeDescriptor::Named(target) => {
                    aliases.insert(name, target);
                }
                ty if ty.is_scalar() => {
                    mapper.scalars.insert(name);
                }
                _ => {}
            }
        }

        // Aliases take the kind of what they point at. Each pass settles at
        // least one more link of every chain, so the loop is bounded.
        loop {
            let mut changed = false;
            for (name, target) in &aliases {
                if mapper.records.contains(target) && mapper.records.insert(name.clone()) {
                    changed = true;
                }
                if mapper.scalars.contains(target) && mapper.scalars.insert(name.clone()) {
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        mapper
    }

    pub fn resolver(&self) -> &'a Resolver<'a> {
        self.resolver
    }

    /// Map a schema reference.
    pub fn resolve_type(&self, schema: &SchemaRef) -> TypeDescriptor {
        match schema.reference() {
            Some(pointer) => TypeDescriptor::Named(type_name(&pointer_name(pointer), "Schema")),
            None => match schema.as_inline() {
                Some(inline) => self.resolve_schema(inline),
                None => TypeDescriptor::Any,
            },
        }
    }

    fn resolve_schema(&self, schema: &Schema) -> TypeDescriptor {
        match schema.all_of.as_slice() {
            [] => {}
            [single] if schema.properties.is_empty() => return self.resolve_type(single),
            _ => return self.merge_all_of(schema),
        }

        if !schema.one_of.is_empty() || !schema.any_of.is_empty() {
            return TypeDescriptor::Any;
        }

        match schema.primary_type() {
            Some("array") => TypeDescriptor::List(Box::new(
                schema
                    .items
                    .as_ref()
                    .map_or(TypeDescriptor::Any, |items| self.resolve_type(items)),
            )),
            Some("object") => self.object(schema),
            None if !schema.properties.is_empty() => self.object(schema),
            Some("string") => match schema.format.as_deref() {
                Some("date-time") => TypeDescriptor::DateTime,
                Some("date") => TypeDescriptor::Date,
                _ => {
                    let literals = dedup(schema.string_enum());
                    if literals.is_empty() {
                        TypeDescriptor::String
                    } else {
                        TypeDescriptor::StringEnum(literals)
                    }
                }
            },
            Some("integer") => match schema.format.as_deref() {
                Some("int64") => TypeDescriptor::I64,
                _ => TypeDescriptor::I32,
            },
            Some("number") => match schema.format.as_deref() {
                Some("float") => TypeDescriptor::F32,
                _ => TypeDescriptor::F64,
            },
            Some("boolean") => TypeDescriptor::Bool,
            _ => TypeDescriptor::Any,
        }
    }

    fn object(&self, schema: &Schema) -> TypeDescriptor {
        if schema.properties.is_empty() {
            let value = match &schema.additional_properties {
                Some(AdditionalProperties::Schema(value)) => self.resolve_type(value),
                _ => TypeDescriptor::Any,
            };
            return TypeDescriptor::Map(Box::new(value));
        }

        TypeDescriptor::Record(
            schema
                .properties
                .iter()
                .map(|(name, property)| self.field(name, property, schema.is_required(name)))
                .collect(),
        )
    }

    fn field(&self, name: &str, property: &SchemaRef, required: bool) -> Field {
        Field {
            name: name.to_string(),
            description: property.as_inline().and_then(|s| s.description.clone()),
            required,
            ty: self.resolve_type(property),
        }
    }

    /// Merge the properties of every `allOf` member, and the schema's own,
    /// into one record. Later members override earlier ones.
    fn merge_all_of(&self, schema: &Schema) -> TypeDescriptor {
        let mut properties = BTreeMap::new();
        let mut required = BTreeSet::new();
        let mut stack = Vec::new();
        self.collect(schema, &mut properties, &mut required, &mut stack);

        TypeDescriptor::Record(
            properties
                .into_iter()
                .map(|(name, property)| {
                    let is_required = required.contains(name);
                    self.field(name, property, is_required)
                })
                .collect(),
        )
    }

    fn collect<'s>(
        &self,
        schema: &'s Schema,
        properties: &mut BTreeMap<&'s str, &'s SchemaRef>,
        required: &mut BTreeSet<&'s str>,
        stack: &mut Vec<&'s str>,
    ) where
        'a: 's,
    {
        for member in &schema.all_of {
            match member.reference() {
                Some(pointer) => {
                    if stack.contains(&pointer) {
                        tracing::debug!(pointer, "allOf cycle, member skipped");
                        continue;
                    }
                    let Ok(target) = self.resolver.resolve_schema(pointer) else {
                        continue;
                    };
                    let Some(target) = target.as_inline() else {
                        continue;
                    };
                    stack.push(pointer);
                    self.collect(target, properties, required, stack);
                    stack.pop();
                }
                None => {
                    if let Some(inline) = member.as_inline() {
                        self.collect(inline, properties, required, stack);
                    }
                }
            }
        }

        for (name, property) in &schema.properties {
            properties.insert(name.as_str(), property);
        }
        required.extend(schema.required.iter().map(String::as_str));
    }

    /// Whether a named type renders as a struct, directly or through aliases.
    pub fn is_record(&self, name: &str) -> bool {
        self.records.contains(name)
    }

    /// Whether values of `ty` can be parsed from a path or query string.
    pub fn is_scalar(&self, ty: &TypeDescriptor) -> bool {
        match ty {
            TypeDescriptor::Named(name) => self.scalars.contains(name),
            other => other.is_scalar(),
        }
    }

    /// Whether a field of `owner` is stored behind a `Box`.
    ///
    /// Optional composites are boxed so absent values stay small. A
    /// required field of the owner's own type is boxed so the type has a
    /// finite size.
    pub fn needs_box(&self, field: &Field, owner: &str) -> bool {
        match &field.ty {
            TypeDescriptor::Record(_) => !field.required,
            TypeDescriptor::Named(name) => name == owner || (!field.required && self.is_record(name)),
            _ => false,
        }
    }
}

fn dedup(literals: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    literals
        .into_iter()
        .filter(|l| seen.insert(l.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oasgen_spec::{load_str, normalize, Document, Syntax};

    fn document(yaml: &str) -> Document {
        let mut doc = load_str(yaml, Syntax::Yaml).unwrap();
        normalize(&mut doc);
        doc
    }

    fn schema(doc: &Document, name: &str) -> SchemaRef {
        doc.components.as_ref().unwrap().schemas[name].clone()
    }

    const COMPONENTS: &str = r#"
openapi: 3.1.0
info: { title: T, version: "1" }
components:
  schemas:
    Pet:
      type: object
      required: [id, name]
      properties:
        id: { type: integer, format: int64 }
        name: { type: string, description: The pet's name. }
        tag: { type: string }
        born: { type: string, format: date }
        seen: { type: string, format: date-time }
        weight: { type: number, format: float }
        owner: { $ref: '#/components/schemas/Owner' }
        status: { $ref: '#/components/schemas/pet-status' }
        parent: { $ref: '#/components/schemas/Pet' }
        tags: { type: array, items: { type: string } }
        extra: { type: object, additionalProperties: { type: integer } }
        meta: { type: object }
    Owner:
      type: object
      properties:
        name: { type: string }
    Keeper:
      $ref: '#/components/schemas/Owner'
    pet-status:
      type: string
      enum: [available, pending, sold, available]
    Pets:
      type: array
      items: { $ref: '#/components/schemas/Pet' }
    Anything: {}
    Either:
      oneOf:
        - { type: string }
        - { type: integer }
"#;

    #[test]
    fn maps_primitives_and_references() {
        let doc = document(COMPONENTS);
        let resolver = Resolver::new(&doc);
        let mapper = TypeMapper::new(&resolver);

        let TypeDescriptor::Record(fields) = mapper.resolve_type(&schema(&doc, "Pet")) else {
            panic!("Pet should be a record");
        };
        let ty = |name: &str| fields.iter().find(|f| f.name == name).unwrap().ty.clone();

        assert_eq!(ty("id"), TypeDescriptor::I64);
        assert_eq!(ty("name"), TypeDescriptor::String);
        assert_eq!(ty("born"), TypeDescriptor::Date);
        assert_eq!(ty("seen"), TypeDescriptor::DateTime);
        assert_eq!(ty("weight"), TypeDescriptor::F32);
        assert_eq!(ty("owner"), TypeDescriptor::Named("Owner".into()));
        assert_eq!(ty("status"), TypeDescriptor::Named("PetStatus".into()));
        assert_eq!(ty("tags"), TypeDescriptor::List(Box::new(TypeDescriptor::String)));
        assert_eq!(ty("extra"), TypeDescriptor::Map(Box::new(TypeDescriptor::I32)));
        assert_eq!(ty("meta"), TypeDescriptor::Map(Box::new(TypeDescriptor::Any)));

        let name = fields.iter().find(|f| f.name == "name").unwrap();
        assert!(name.required);
        assert_eq!(name.description.as_deref(), Some("The pet's name."));
        assert!(!fields.iter().find(|f| f.name == "tag").unwrap().required);
    }

    #[test]
    fn enums_and_fallbacks() {
        let doc = document(COMPONENTS);
        let resolver = Resolver::new(&doc);
        let mapper = TypeMapper::new(&resolver);

        assert_eq!(
            mapper.resolve_type(&schema(&doc, "pet-status")),
            TypeDescriptor::StringEnum(vec!["available".into(), "pending".into(), "sold".into()])
        );
        assert_eq!(
            mapper.resolve_type(&schema(&doc, "Pets")),
            TypeDescriptor::List(Box::new(TypeDescriptor::Named("Pet".into())))
        );
        assert_eq!(mapper.resolve_type(&schema(&doc, "Anything")), TypeDescriptor::Any);
        assert_eq!(mapper.resolve_type(&schema(&doc, "Either")), TypeDescriptor::Any);
        assert_eq!(
            mapper.resolve_type(&SchemaRef::inline(Schema::of_type("array"))),
            TypeDescriptor::List(Box::new(TypeDescriptor::Any))
        );
    }

    #[test]
    fn classifies_named_types() {
        let doc = document(COMPONENTS);
        let resolver = Resolver::new(&doc);
        let mapper = TypeMapper::new(&resolver);

        assert!(mapper.is_record("Pet"));
        assert!(mapper.is_record("Keeper"));
        assert!(!mapper.is_record("Pets"));
        assert!(mapper.is_scalar(&TypeDescriptor::Named("PetStatus".into())));
        assert!(!mapper.is_scalar(&TypeDescriptor::Named("Pet".into())));
        assert!(mapper.is_scalar(&TypeDescriptor::I64));
        assert!(!mapper.is_scalar(&TypeDescriptor::Any));
    }

    #[test]
    fn boxing_rules() {
        let doc = document(COMPONENTS);
        let resolver = Resolver::new(&doc);
        let mapper = TypeMapper::new(&resolver);
        let field = |ty: TypeDescriptor, required: bool| Field {
            name: "f".into(),
            description: None,
            required,
            ty,
        };

        let owner = TypeDescriptor::Named("Owner".into());
        assert!(mapper.needs_box(&field(owner.clone(), false), "Pet"));
        assert!(!mapper.needs_box(&field(owner, true), "Pet"));
        assert!(mapper.needs_box(&field(TypeDescriptor::Named("Pet".into()), true), "Pet"));
        assert!(!mapper.needs_box(&field(TypeDescriptor::Named("PetStatus".into()), false), "Pet"));
        assert!(!mapper.needs_box(&field(TypeDescriptor::I32, false), "Pet"));
        assert!(mapper.needs_box(&field(TypeDescriptor::Record(vec![]), false), "Pet"));
    }

    #[test]
    fn all_of_merges_members() {
        let doc = document(
            r#"
openapi: 3.1.0
info: { title: T, version: "1" }
components:
  schemas:
    Base:
      type: object
      required: [id]
      properties:
        id: { type: integer }
    Named:
      allOf:
        - $ref: '#/components/schemas/Base'
        - type: object
          required: [name]
          properties:
            name: { type: string }
    Alias:
      allOf:
        - $ref: '#/components/schemas/Base'
    Loop:
      allOf:
        - $ref: '#/components/schemas/Loop'
        - type: object
          properties:
            here: { type: boolean }
"#,
        );
        let resolver = Resolver::new(&doc);
        let mapper = TypeMapper::new(&resolver);

        let TypeDescriptor::Record(fields) = mapper.resolve_type(&schema(&doc, "Named")) else {
            panic!("expected merged record");
        };
        let names: Vec<_> = fields.iter().map(|f| (f.name.as_str(), f.required)).collect();
        assert_eq!(names, vec![("id", true), ("name", true)]);

        assert_eq!(
            mapper.resolve_type(&schema(&doc, "Alias")),
            TypeDescriptor::Named("Base".into())
        );

        let TypeDescriptor::Record(fields) = mapper.resolve_type(&schema(&doc, "Loop")) else {
            panic!("expected record");
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].ty, TypeDescriptor::Bool);
    }

    #[test]
    fn type_arrays_map_like_scalars() {
        let scalar = document(
            "openapi: 3.0.3\ninfo: {title: T, version: '1'}\ncomponents:\n  schemas:\n    S: {type: string, nullable: true}\n",
        );
        let list = document(
            "openapi: 3.1.0\ninfo: {title: T, version: '1'}\ncomponents:\n  schemas:\n    S: {type: [string, 'null']}\n",
        );
        let a = Resolver::new(&scalar);
        let b = Resolver::new(&list);
        assert_eq!(
            TypeMapper::new(&a).resolve_type(&schema(&scalar, "S")),
            TypeMapper::new(&b).resolve_type(&schema(&list, "S"))
        );
    }
}
