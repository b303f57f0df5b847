//! `security.rs`: declared schemes, per-operation requirements and the
//! authentication middleware.

use std::collections::BTreeMap;

use oasgen_spec::{ApiKeyLocation, Document, SecurityRequirement, SecurityScheme};

use super::{header, single_line, CodeWriter};
use crate::naming::to_field_name;

/// The requirement an operation ends up with after inheritance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectiveSecurity<'a> {
    /// Nothing declared at either level.
    Unspecified,
    /// Declared as an explicitly empty list.
    Anonymous,
    Clauses(&'a [SecurityRequirement]),
}

/// Resolve an operation's security against the document default.
///
/// An operation list, even an empty one, replaces the document list.
pub fn effective_security<'a>(
    operation: Option<&'a [SecurityRequirement]>,
    document: Option<&'a [SecurityRequirement]>,
) -> EffectiveSecurity<'a> {
    match operation.or(document) {
        None => EffectiveSecurity::Unspecified,
        Some([]) => EffectiveSecurity::Anonymous,
        Some(clauses) => EffectiveSecurity::Clauses(clauses),
    }
}

fn authenticate_method(scheme: &str, index: usize) -> String {
    match to_field_name(scheme) {
        name if name.is_empty() => format!("authenticate_scheme{index}"),
        name => format!("authenticate_{}", name.trim_start_matches("r#").trim_end_matches('_')),
    }
}

fn scheme_expr(scheme: &SecurityScheme) -> String {
    const RT: &str = "oasgen_runtime::security";
    match scheme {
        SecurityScheme::ApiKey { name, location, .. } => {
            let location = match location {
                ApiKeyLocation::Header => "Header",
                ApiKeyLocation::Query => "Query",
                ApiKeyLocation::Cookie => "Cookie",
            };
            format!("{RT}::SecurityScheme::api_key({name:?}, {RT}::ApiKeyLocation::{location})")
        }
        SecurityScheme::Http { scheme, .. } => format!("{RT}::SecurityScheme::http({scheme:?})"),
        SecurityScheme::OAuth2 { .. } => format!("{RT}::SecurityScheme::OAuth2"),
        SecurityScheme::OpenIdConnect { .. } => format!("{RT}::SecurityScheme::OpenIdConnect"),
        SecurityScheme::MutualTls { .. } => format!("{RT}::SecurityScheme::MutualTls"),
    }
}

fn clause_expr(clause: &SecurityRequirement) -> String {
    let entries: Vec<String> = clause
        .iter()
        .map(|(scheme, scopes)| {
            let scopes: Vec<String> = scopes.iter().map(|s| format!("{s:?}")).collect();
            format!("({scheme:?}, vec![{}])", scopes.join(", "))
        })
        .collect();
    format!("oasgen_runtime::security::clause(vec![{}])", entries.join(", "))
}

/// Emits `security.rs`.
pub struct SecurityEmitter<'a> {
    document: &'a Document,
}

impl<'a> SecurityEmitter<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Render `security.rs`, or `None` when no scheme is declared.
    pub fn emit(self) -> Option<String> {
        let schemes = self.document.security_schemes()?;
        let mut w = CodeWriter::new();
        w.line(header());
        w.blank();
        self.write_schemes(&mut w, schemes);
        w.blank();
        write_handler_trait(&mut w, schemes);
        w.blank();
        write_authenticator(&mut w, schemes);
        w.blank();
        self.write_requirements(&mut w);
        w.blank();
        write_middleware(&mut w);
        Some(w.finish())
    }

    fn write_schemes(&self, w: &mut CodeWriter, schemes: &BTreeMap<String, SecurityScheme>) {
        w.line("/// Declared security schemes, keyed by scheme name.");
        w.open("pub fn schemes() -> oasgen_runtime::security::SchemeTable {");
        w.line("let mut schemes = oasgen_runtime::security::SchemeTable::new();");
        for (name, scheme) in schemes {
            w.line(format!(
                "schemes.insert({name:?}.to_string(), {});",
                scheme_expr(scheme)
            ));
        }
        w.line("schemes");
        w.close("}");
    }

    fn write_requirements(&self, w: &mut CodeWriter) {
        let document_security = self.document.security.as_deref();

        w.line("/// Effective requirement of every operation, keyed by method and path");
        w.line("/// pattern. Operations without any declared security require a clause");
        w.line("/// that can never hold, so they are rejected.");
        w.open("pub fn operation_security() -> oasgen_runtime::security::RequirementTable {");
        w.line("let mut table = oasgen_runtime::security::RequirementTable::new();");
        for (path, method, _, operation) in self.document.operations() {
            let requirement = match effective_security(operation.security.as_deref(), document_security) {
                EffectiveSecurity::Unspecified => {
                    "oasgen_runtime::security::Requirement::Clauses(vec![])".to_string()
                }
                EffectiveSecurity::Anonymous => "oasgen_runtime::security::Requirement::Anonymous".to_string(),
                EffectiveSecurity::Clauses(clauses) => {
                    let clauses: Vec<String> = clauses.iter().map(clause_expr).collect();
                    format!(
                        "oasgen_runtime::security::Requirement::Clauses(vec![{}])",
                        clauses.join(", ")
                    )
                }
            };
            w.open("table.insert(");
            w.line(format!(
                "(oasgen_runtime::http::Method::{method}, {path:?}.to_string()),"
            ));
            w.line(format!("{requirement},"));
            w.close(");");
        }
        w.line("table");
        w.close("}");
    }
}

fn write_handler_trait(w: &mut CodeWriter, schemes: &BTreeMap<String, SecurityScheme>) {
    w.line("/// Verifies the credentials of each declared scheme.");
    w.open("pub trait SecurityHandler: Send + Sync + 'static {");
    for (i, (name, scheme)) in schemes.iter().enumerate() {
        if i > 0 {
            w.blank();
        }
        match scheme.description() {
            Some(description) => w.doc(Some(description)),
            None => w.line(format!("/// Scheme `{}`.", single_line(name))),
        }
        w.open(format!("fn {}(", authenticate_method(name, i)));
        w.line("&self,");
        w.line("credential: oasgen_runtime::security::Credential,");
        w.line("scopes: &[String],");
        w.close(") -> impl std::future::Future<Output = Result<oasgen_runtime::security::Principal, oasgen_runtime::security::AuthError>> + Send;");
    }
    w.close("}");
}

fn write_authenticator(w: &mut CodeWriter, schemes: &BTreeMap<String, SecurityScheme>) {
    w.line("/// Dispatches runtime authentication to a [`SecurityHandler`] by scheme name.");
    w.line("pub struct SchemeAuthenticator<H>(pub H);");
    w.blank();
    w.open("impl<H: SecurityHandler> oasgen_runtime::security::Authenticator for SchemeAuthenticator<H> {");
    w.open("fn authenticate<'a>(");
    w.line("&'a self,");
    w.line("scheme: &'a str,");
    w.line("credential: oasgen_runtime::security::Credential,");
    w.line("scopes: &'a [String],");
    w.reopen(") -> oasgen_runtime::BoxFuture<'a, Result<oasgen_runtime::security::Principal, oasgen_runtime::security::AuthError>> {");
    w.open("match scheme {");
    for (i, name) in schemes.keys().enumerate() {
        w.line(format!(
            "{name:?} => Box::pin(self.0.{}(credential, scopes)),",
            authenticate_method(name, i)
        ));
    }
    w.open("other => {");
    w.line("let other = other.to_string();");
    w.line("Box::pin(async move { Err(oasgen_runtime::security::AuthError::UnknownScheme(other)) })");
    w.close("}");
    w.close("}");
    w.close("}");
    w.close("}");
}

fn write_middleware(w: &mut CodeWriter) {
    w.line("/// Middleware enforcing [`operation_security`] with `handler`.");
    w.line("///");
    w.line("/// With `None` every request passes through unauthenticated.");
    w.open("pub fn middleware<H: SecurityHandler>(handler: Option<H>) -> oasgen_runtime::Middleware {");
    w.open("let authenticator = handler.map(|handler| {");
    w.line("std::sync::Arc::new(SchemeAuthenticator(handler))");
    w.line("    as std::sync::Arc<dyn oasgen_runtime::security::Authenticator>");
    w.close("});");
    w.line("oasgen_runtime::security::security_middleware(schemes(), operation_security(), authenticator)");
    w.close("}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use oasgen_spec::{load_str, Syntax};

    fn document(yaml: &str) -> Document {
        load_str(yaml, Syntax::Yaml).unwrap()
    }

    const SECURED: &str = r#"
openapi: 3.1.0
info: { title: T, version: "1" }
security:
  - bearer: []
  - api_key: []
paths:
  /pets:
    get:
      responses: {}
    post:
      security:
        - oauth: [write]
          api_key: []
      responses: {}
  /health:
    get:
      security: []
      responses: {}
components:
  securitySchemes:
    api_key: { type: apiKey, name: X-API-Key, in: header }
    bearer: { type: http, scheme: Bearer, description: JWT access token. }
    oauth: { type: oauth2, flows: {} }
"#;

    #[test]
    fn no_schemes_no_artifact() {
        let doc = document("openapi: 3.1.0\ninfo: {title: T, version: '1'}\npaths: {}\n");
        assert!(SecurityEmitter::new(&doc).emit().is_none());
    }

    #[test]
    fn scheme_table() {
        let doc = document(SECURED);
        let out = SecurityEmitter::new(&doc).emit().unwrap();
        assert!(out.contains(
            "schemes.insert(\"api_key\".to_string(), oasgen_runtime::security::SecurityScheme::api_key(\"X-API-Key\", oasgen_runtime::security::ApiKeyLocation::Header));"
        ));
        assert!(out.contains("oasgen_runtime::security::SecurityScheme::http(\"Bearer\")"));
        assert!(out.contains("oasgen_runtime::security::SecurityScheme::OAuth2);"));
    }

    #[test]
    fn handler_methods_per_scheme() {
        let doc = document(SECURED);
        let out = SecurityEmitter::new(&doc).emit().unwrap();
        assert!(out.contains("    /// JWT access token.\n    fn authenticate_bearer("));
        assert!(out.contains("    fn authenticate_api_key("));
        assert!(out.contains("    fn authenticate_oauth("));
        assert!(out.contains("\"api_key\" => Box::pin(self.0.authenticate_api_key(credential, scopes)),"));
    }

    #[test]
    fn requirements_follow_inheritance() {
        let doc = document(SECURED);
        let out = SecurityEmitter::new(&doc).emit().unwrap();
        assert!(out.contains(
            "(oasgen_runtime::http::Method::GET, \"/pets\".to_string()),\n        oasgen_runtime::security::Requirement::Clauses(vec![oasgen_runtime::security::clause(vec![(\"bearer\", vec![])]), oasgen_runtime::security::clause(vec![(\"api_key\", vec![])])]),"
        ));
        assert!(out.contains(
            "oasgen_runtime::security::clause(vec![(\"api_key\", vec![]), (\"oauth\", vec![\"write\"])])"
        ));
        assert!(out.contains(
            "(oasgen_runtime::http::Method::GET, \"/health\".to_string()),\n        oasgen_runtime::security::Requirement::Anonymous,"
        ));
    }

    #[test]
    fn effective_security_rules() {
        let clauses = vec![SecurityRequirement::new()];
        assert_eq!(effective_security(None, None), EffectiveSecurity::Unspecified);
        assert_eq!(effective_security(Some(&[]), Some(&clauses)), EffectiveSecurity::Anonymous);
        assert_eq!(effective_security(None, Some(&[])), EffectiveSecurity::Anonymous);
        assert_eq!(
            effective_security(None, Some(&clauses)),
            EffectiveSecurity::Clauses(&clauses)
        );
        assert_eq!(
            effective_security(Some(&clauses), Some(&[])),
            EffectiveSecurity::Clauses(&clauses)
        );
    }

    #[test]
    fn undeclared_security_rejects() {
        let doc = document(
            r#"
openapi: 3.1.0
info: { title: T, version: "1" }
paths:
  /open:
    get:
      responses: {}
components:
  securitySchemes:
    key: { type: apiKey, name: key, in: query }
"#,
        );
        let out = SecurityEmitter::new(&doc).emit().unwrap();
        assert!(out.contains(
            "(oasgen_runtime::http::Method::GET, \"/open\".to_string()),\n        oasgen_runtime::security::Requirement::Clauses(vec![]),"
        ));
        assert!(!out.contains("Requirement::Anonymous"));
        assert!(out.contains("oasgen_runtime::security::ApiKeyLocation::Query"));
    }

    #[test]
    fn method_names_avoid_keywords() {
        assert_eq!(authenticate_method("type", 0), "authenticate_type");
        assert_eq!(authenticate_method("self", 0), "authenticate_self");
        assert_eq!(authenticate_method("bearerAuth", 0), "authenticate_bearer_auth");
        assert_eq!(authenticate_method("!!", 3), "authenticate_scheme3");
    }
}
