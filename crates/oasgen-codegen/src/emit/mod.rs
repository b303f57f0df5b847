//! Source emitters.
//!
//! Each emitter renders one artifact. Emitted files contain no inner
//! attributes so they can be pulled in with `include!` as well as declared
//! as modules through the generated `mod.rs`.

pub mod module;
pub mod security;
pub mod server;
pub mod types;
pub mod webhooks;

use std::collections::{BTreeSet, VecDeque};

use crate::mapper::{Field, TypeDescriptor, TypeMapper};
use crate::naming::to_exported_name;
use crate::GENERATOR_VERSION;

pub use module::ModuleEmitter;
pub use security::SecurityEmitter;
pub use server::ServerEmitter;
pub use types::TypesEmitter;
pub use webhooks::WebhooksEmitter;

/// The first line of every artifact.
pub fn header() -> String {
    format!("// Code generated by oasgen {GENERATOR_VERSION}. DO NOT EDIT.")
}

/// Collapse runs of whitespace, line breaks included, into single spaces so
/// document text fits in a one-line comment.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Indentation-aware line buffer.
#[derive(Debug, Default)]
pub struct CodeWriter {
    buf: String,
    depth: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current depth. Empty lines carry no indentation.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.buf.push_str("    ");
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Write `open`, indent, and return to the caller for the body.
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    /// Dedent and write `close`.
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    /// Dedent, write `text`, and indent again (`} else {`).
    pub fn reopen(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.open(text);
    }

    /// Write `text` as `///` doc lines.
    pub fn doc(&mut self, text: Option<&str>) {
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return;
        };
        for line in text.lines() {
            let line = line.trim_end();
            if line.is_empty() {
                self.line("///");
            } else {
                self.line(format!("/// {line}"));
            }
        }
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

/// A type synthesized for an inline shape, waiting to be written.
#[derive(Debug, Clone)]
pub struct Pending {
    pub name: String,
    pub ty: TypeDescriptor,
}

/// Renders type descriptors as Rust type expressions.
///
/// Inline records and enums cannot be written in place, so they are queued
/// under a synthesized `{Owner}{Field}` name and referenced by that name.
pub struct TypeRenderer<'m, 'a> {
    mapper: &'m TypeMapper<'a>,
    pending: VecDeque<Pending>,
    /// Names already written to this artifact.
    emitted: BTreeSet<String>,
}

impl<'m, 'a> TypeRenderer<'m, 'a> {
    pub fn new(mapper: &'m TypeMapper<'a>) -> Self {
        Self {
            mapper,
            pending: VecDeque::new(),
            emitted: BTreeSet::new(),
        }
    }

    pub fn mapper(&self) -> &'m TypeMapper<'a> {
        self.mapper
    }

    /// Render `ty`, hoisting inline shapes under `hint`.
    pub fn render(&mut self, ty: &TypeDescriptor, hint: &str) -> String {
        match ty {
            TypeDescriptor::Named(name) => name.clone(),
            TypeDescriptor::List(item) => format!("Vec<{}>", self.render(item, &format!("{hint}Item"))),
            TypeDescriptor::Map(value) => format!(
                "std::collections::BTreeMap<String, {}>",
                self.render(value, &format!("{hint}Value"))
            ),
            TypeDescriptor::Record(_) | TypeDescriptor::StringEnum(_) => {
                self.pending.push_back(Pending {
                    name: hint.to_string(),
                    ty: ty.clone(),
                });
                hint.to_string()
            }
            TypeDescriptor::String => "String".to_string(),
            TypeDescriptor::Date => "chrono::NaiveDate".to_string(),
            TypeDescriptor::DateTime => "chrono::DateTime<chrono::Utc>".to_string(),
            TypeDescriptor::I32 => "i32".to_string(),
            TypeDescriptor::I64 => "i64".to_string(),
            TypeDescriptor::F32 => "f32".to_string(),
            TypeDescriptor::F64 => "f64".to_string(),
            TypeDescriptor::Bool => "bool".to_string(),
            TypeDescriptor::Any => "serde_json::Value".to_string(),
        }
    }

    /// Render a record field of `owner`, applying `Option` and `Box`.
    pub fn render_field(&mut self, field: &Field, owner: &str) -> String {
        let hint = format!("{owner}{}", to_exported_name(&field.name));
        let mut rendered = self.render(&field.ty, &hint);
        if self.mapper.needs_box(field, owner) {
            rendered = format!("Box<{rendered}>");
        }
        if !field.required {
            rendered = format!("Option<{rendered}>");
        }
        rendered
    }

    /// Mark `name` as written. Returns false if it already was.
    pub fn claim(&mut self, name: &str) -> bool {
        self.emitted.insert(name.to_string())
    }

    /// Take the next queued type that has not been written yet.
    pub fn next_pending(&mut self) -> Option<Pending> {
        while let Some(pending) = self.pending.pop_front() {
            if self.claim(&pending.name) {
                return Some(pending);
            }
        }
        None
    }
}
