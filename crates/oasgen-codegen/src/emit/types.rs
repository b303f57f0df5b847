//! `types.rs`: one definition per component schema.

use super::{header, CodeWriter, TypeRenderer};
use crate::mapper::{Field, TypeDescriptor, TypeMapper};
use crate::naming::{constant_name, to_field_name, type_name, variant_name};

/// Emits component schemas as structs, enums and aliases.
pub struct TypesEmitter<'m, 'a> {
    renderer: TypeRenderer<'m, 'a>,
}

impl<'m, 'a> TypesEmitter<'m, 'a> {
    pub fn new(mapper: &'m TypeMapper<'a>) -> Self {
        Self {
            renderer: TypeRenderer::new(mapper),
        }
    }

    /// Render every component schema in name order.
    ///
    /// A schema whose exported name was already written, by an earlier
    /// schema or by a hoisted inline shape, is skipped.
    pub fn emit(mut self) -> String {
        let document = self.renderer.mapper().resolver().document();
        let mut w = CodeWriter::new();
        w.line(header());

        for (raw, schema) in document.schemas() {
            let name = type_name(raw, "Schema");
            if !self.renderer.claim(&name) {
                tracing::debug!(schema = %raw, name = %name, "name already emitted, skipped");
                continue;
            }

            let ty = self.renderer.mapper().resolve_type(schema);
            let description = schema.as_inline().and_then(|s| s.description.as_deref());
            w.blank();
            write_definition(&mut w, &mut self.renderer, &name, description, &ty);
            write_pending(&mut w, &mut self.renderer);
        }

        w.finish()
    }
}

/// Write a named definition for `ty`: a struct for records, an enum for
/// string literal sets, and an alias for everything else.
pub(crate) fn write_definition(
    w: &mut CodeWriter,
    renderer: &mut TypeRenderer<'_, '_>,
    name: &str,
    description: Option<&str>,
    ty: &TypeDescriptor,
) {
    w.doc(description);
    match ty {
        TypeDescriptor::Record(fields) => write_struct(w, renderer, name, fields),
        TypeDescriptor::StringEnum(literals) => write_enum(w, name, literals),
        other => {
            let target = renderer.render(other, name);
            w.line(format!("pub type {name} = {target};"));
        }
    }
}

/// Write queued inline shapes, including any they queue in turn.
pub(crate) fn write_pending(w: &mut CodeWriter, renderer: &mut TypeRenderer<'_, '_>) {
    while let Some(pending) = renderer.next_pending() {
        w.blank();
        write_definition(w, renderer, &pending.name, None, &pending.ty);
    }
}

fn write_struct(w: &mut CodeWriter, renderer: &mut TypeRenderer<'_, '_>, name: &str, fields: &[Field]) {
    w.line("#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]");
    w.open(format!("pub struct {name} {{"));
    for (i, field) in fields.iter().enumerate() {
        let ident = match to_field_name(&field.name) {
            ident if ident.is_empty() => format!("field{i}"),
            ident => ident,
        };
        let ty = renderer.render_field(field, name);

        w.doc(field.description.as_deref());
        if field.required {
            w.line(format!("#[serde(rename = {:?})]", field.name));
        } else {
            w.line(format!(
                "#[serde(rename = {:?}, default, skip_serializing_if = \"Option::is_none\")]",
                field.name
            ));
        }
        w.line(format!("pub {ident}: {ty},"));
    }
    w.close("}");
}

fn write_enum(w: &mut CodeWriter, name: &str, literals: &[String]) {
    let variants: Vec<(String, &String)> = literals.iter().map(|l| (variant_name(l), l)).collect();

    w.line("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]");
    w.open(format!("pub enum {name} {{"));
    for (variant, literal) in &variants {
        w.line(format!("#[serde(rename = {literal:?})]"));
        w.line(format!("{variant},"));
    }
    w.close("}");
    w.blank();

    w.open(format!("impl {name} {{"));
    w.line("/// The literal as it appears on the wire.");
    w.open("pub fn as_str(&self) -> &'static str {");
    w.open("match self {");
    for (variant, literal) in &variants {
        w.line(format!("{name}::{variant} => {literal:?},"));
    }
    w.close("}");
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl std::fmt::Display for {name} {{"));
    w.open("fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {");
    w.line("f.write_str(self.as_str())");
    w.close("}");
    w.close("}");
    w.blank();

    w.open(format!("impl std::str::FromStr for {name} {{"));
    w.line("type Err = String;");
    w.blank();
    w.open("fn from_str(s: &str) -> Result<Self, Self::Err> {");
    w.open("match s {");
    for (variant, literal) in &variants {
        w.line(format!("{literal:?} => Ok({name}::{variant}),"));
    }
    w.line(format!(
        "other => Err(format!(\"unknown {name} value: {{other}}\")),"
    ));
    w.close("}");
    w.close("}");
    w.close("}");
    w.blank();

    for (variant, literal) in &variants {
        w.line(format!(
            "pub const {}: {name} = {name}::{variant};",
            constant_name(name, literal)
        ));
    }
}
