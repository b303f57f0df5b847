//! `mod.rs`: declares the emitted modules.

use oasgen_spec::Document;

use super::{header, single_line, CodeWriter};

/// Emits the module index for a set of artifacts.
pub struct ModuleEmitter<'a> {
    document: &'a Document,
    package: &'a str,
}

impl<'a> ModuleEmitter<'a> {
    pub fn new(document: &'a Document, package: &'a str) -> Self {
        Self { document, package }
    }

    /// Render `mod.rs` declaring `modules` (artifact stems, in order).
    pub fn emit(self, modules: &[&str]) -> String {
        let info = &self.document.info;
        let mut w = CodeWriter::new();
        w.line(header());
        w.line(single_line(&format!(
            "// Package {}: {} {}",
            self.package, info.title, info.version
        )));
        w.blank();
        for module in modules {
            w.line("#[allow(dead_code, unused_imports, non_upper_case_globals, clippy::all)]");
            w.line(format!("pub mod {module};"));
        }
        w.blank();
        w.line("/// Name of the generated package.");
        w.line(format!("pub const PACKAGE: &str = {:?};", self.package));
        w.line("/// `info.title` of the source document.");
        w.line(format!("pub const API_TITLE: &str = {:?};", info.title));
        w.line("/// `info.version` of the source document.");
        w.line(format!("pub const API_VERSION: &str = {:?};", info.version));
        w.finish()
    }
}
