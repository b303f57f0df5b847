//! `server.rs`: request and response types, the `Handler` trait and the
//! router adapter.

use oasgen_spec::{HttpMethod, Operation, Parameter, ParameterLocation, PathItem, RefOr, Resolver};

use super::types::write_pending;
use super::{header, single_line, CodeWriter, TypeRenderer};
use crate::error::GenerateError;
use crate::mapper::{TypeDescriptor, TypeMapper};
use crate::naming::{operation_name, to_exported_name, to_field_name};

/// A request field bound to a path or query parameter.
struct ParamField {
    ident: String,
    wire: String,
    location: ParameterLocation,
    required: bool,
    ty: String,
    description: Option<String>,
}

/// One declared response status.
struct Variant {
    name: String,
    status: u16,
    body: Option<String>,
    description: String,
}

/// Everything needed to emit one operation.
struct OperationPlan {
    method: HttpMethod,
    path: String,
    name: String,
    handler_method: String,
    summary: Option<String>,
    description: Option<String>,
    params: Vec<ParamField>,
    /// Body type and whether it is required.
    body: Option<(String, bool)>,
    variants: Vec<Variant>,
}

/// Merge path-item and operation parameters.
///
/// An operation parameter replaces a path-level one with the same name and
/// location, keeping its position.
pub(crate) fn merged_parameters<'a>(
    resolver: &Resolver<'a>,
    item: &'a PathItem,
    operation: &'a Operation,
    context: &str,
) -> Result<Vec<&'a Parameter>, GenerateError> {
    let mut merged: Vec<&'a Parameter> = Vec::new();

    for (i, entry) in item.parameters.iter().chain(&operation.parameters).enumerate() {
        let parameter = match entry {
            RefOr::Ref { reference } => {
                resolver
                    .resolve_parameter(reference)
                    .map_err(|source| GenerateError::Resolve {
                        context: format!("{context} parameter #{i}"),
                        source,
                    })?
            }
            RefOr::Item(parameter) => parameter,
        };

        match merged
            .iter_mut()
            .find(|p| p.name == parameter.name && p.location == parameter.location)
        {
            Some(slot) => *slot = parameter,
            None => merged.push(parameter),
        }
    }

    Ok(merged)
}

/// Parse a response key into a status code. `2XX` style ranges map to the
/// first code of the range.
fn status_code(key: &str) -> Option<u16> {
    if let Ok(code) = key.parse::<u16>() {
        return (100..=599).contains(&code).then_some(code);
    }
    match key.as_bytes() {
        [class @ b'1'..=b'5', x, y] if x.eq_ignore_ascii_case(&b'x') && y.eq_ignore_ascii_case(&b'x') => {
            Some(u16::from(class - b'0') * 100)
        }
        _ => None,
    }
}

/// Emits `server.rs`.
pub struct ServerEmitter<'m, 'a> {
    renderer: TypeRenderer<'m, 'a>,
}

impl<'m, 'a> ServerEmitter<'m, 'a> {
    pub fn new(mapper: &'m TypeMapper<'a>) -> Self {
        Self {
            renderer: TypeRenderer::new(mapper),
        }
    }

    fn plan(
        &mut self,
        path: &'a str,
        method: HttpMethod,
        item: &'a PathItem,
        operation: &'a Operation,
    ) -> Result<OperationPlan, GenerateError> {
        let resolver = self.renderer.mapper().resolver();
        let context = format!("{method} {path}");
        let name = operation_name(method, path, operation.operation_id.as_deref());

        let mut params = Vec::new();
        for (i, parameter) in merged_parameters(resolver, item, operation, &context)?
            .into_iter()
            .enumerate()
        {
            let required = match parameter.location {
                ParameterLocation::Path => true,
                ParameterLocation::Query => parameter.required,
                _ => continue,
            };
            let ident = match to_field_name(&parameter.name) {
                ident if ident.is_empty() => format!("param{i}"),
                ident => ident,
            };
            let ty = match &parameter.schema {
                Some(schema) => self.renderer.mapper().resolve_type(schema),
                None => TypeDescriptor::String,
            };
            let ty = if self.renderer.mapper().is_scalar(&ty) {
                let hint = format!("{name}{}", to_exported_name(&parameter.name));
                self.renderer.render(&ty, &hint)
            } else {
                "String".to_string()
            };
            params.push(ParamField {
                ident,
                wire: parameter.name.clone(),
                location: parameter.location,
                required,
                ty,
                description: parameter.description.clone(),
            });
        }

        let body = match &operation.request_body {
            Some(entry) => {
                let body = match entry {
                    RefOr::Ref { reference } => {
                        resolver
                            .resolve_request_body(reference)
                            .map_err(|source| GenerateError::Resolve {
                                context: format!("{context} request body"),
                                source,
                            })?
                    }
                    RefOr::Item(body) => body,
                };
                body.json().map(|media| {
                    let ty = media
                        .schema
                        .as_ref()
                        .map_or(TypeDescriptor::Any, |s| self.renderer.mapper().resolve_type(s));
                    (self.renderer.render(&ty, &format!("{name}Body")), body.required)
                })
            }
            None => None,
        };

        let mut variants = Vec::new();
        for (key, entry) in &operation.responses {
            let Some(status) = status_code(key) else {
                continue;
            };
            let response = match entry {
                RefOr::Ref { reference } => {
                    resolver
                        .resolve_response(reference)
                        .map_err(|source| GenerateError::Resolve {
                            context: format!("{context} response {key}"),
                            source,
                        })?
                }
                RefOr::Item(response) => response,
            };
            let body = match response.json() {
                Some(media) if status != 204 => {
                    let ty = media
                        .schema
                        .as_ref()
                        .map_or(TypeDescriptor::Any, |s| self.renderer.mapper().resolve_type(s));
                    Some(self.renderer.render(&ty, &format!("{name}Response{}", key.to_ascii_uppercase())))
                }
                _ => None,
            };
            variants.push(Variant {
                name: format!("Status{}", key.to_ascii_uppercase()),
                status,
                body,
                description: response.description.clone(),
            });
        }

        Ok(OperationPlan {
            method,
            path: path.to_string(),
            handler_method: to_field_name(&name),
            name,
            summary: operation.summary.clone(),
            description: operation.description.clone(),
            params,
            body,
            variants,
        })
    }

    /// Render `server.rs` for every operation in path order.
    pub fn emit(mut self) -> Result<String, GenerateError> {
        let document = self.renderer.mapper().resolver().document();
        let mut w = CodeWriter::new();
        w.line(header());
        w.blank();
        w.line("use super::types::*;");

        let mut plans = Vec::new();
        for (path, method, item, operation) in document.operations() {
            let plan = self.plan(path, method, item, operation)?;
            w.blank();
            write_request(&mut w, &plan);
            w.blank();
            write_response(&mut w, &plan);
            write_pending(&mut w, &mut self.renderer);
            plans.push(plan);
        }

        w.blank();
        write_handler_trait(&mut w, &document.info.title, &plans);
        w.blank();
        write_router(&mut w, &plans);
        for plan in &plans {
            w.blank();
            write_parser(&mut w, plan);
        }

        Ok(w.finish())
    }
}

fn write_request(w: &mut CodeWriter, plan: &OperationPlan) {
    w.line(format!("/// Parameters of `{} {}`.", plan.method, single_line(&plan.path)));
    w.line("#[derive(Debug, Clone, PartialEq)]");
    w.open(format!("pub struct {}Request {{", plan.name));
    for param in &plan.params {
        w.doc(param.description.as_deref());
        if param.required {
            w.line(format!("pub {}: {},", param.ident, param.ty));
        } else {
            w.line(format!("pub {}: Option<{}>,", param.ident, param.ty));
        }
    }
    if let Some((ty, required)) = &plan.body {
        if *required {
            w.line(format!("pub body: {ty},"));
        } else {
            w.line(format!("pub body: Option<{ty}>,"));
        }
    }
    w.close("}");
}

fn write_response(w: &mut CodeWriter, plan: &OperationPlan) {
    let name = format!("{}Response", plan.name);

    w.line(format!("/// Responses of `{} {}`.", plan.method, single_line(&plan.path)));
    w.line("#[derive(Debug, Clone, PartialEq)]");
    w.open(format!("pub enum {name} {{"));
    for variant in &plan.variants {
        w.doc(Some(&variant.description));
        match &variant.body {
            Some(ty) => w.line(format!("{}({ty}),", variant.name)),
            None => w.line(format!("{},", variant.name)),
        }
    }
    w.close("}");
    w.blank();

    // An enum without variants is matched by value.
    let scrutinee = if plan.variants.is_empty() { "*self" } else { "self" };

    w.open(format!("impl {name} {{"));
    w.open("pub fn status(&self) -> u16 {");
    w.open(format!("match {scrutinee} {{"));
    for variant in &plan.variants {
        let pattern = match variant.body {
            Some(_) => format!("{name}::{}(_)", variant.name),
            None => format!("{name}::{}", variant.name),
        };
        w.line(format!("{pattern} => {},", variant.status));
    }
    w.close("}");
    w.close("}");
    w.blank();
    w.line("/// The JSON body, or `None` when the variant carries none.");
    w.open("pub fn body(&self) -> Result<Option<Vec<u8>>, serde_json::Error> {");
    w.open(format!("match {scrutinee} {{"));
    for variant in &plan.variants {
        match variant.body {
            Some(_) => w.line(format!(
                "{name}::{}(body) => serde_json::to_vec(body).map(Some),",
                variant.name
            )),
            None => w.line(format!("{name}::{} => Ok(None),", variant.name)),
        }
    }
    w.close("}");
    w.close("}");
    w.close("}");
}

fn write_handler_trait(w: &mut CodeWriter, title: &str, plans: &[OperationPlan]) {
    let title = single_line(title);
    if title.is_empty() {
        w.line("/// Operation handlers.");
    } else {
        w.line(format!("/// Operation handlers for {title}."));
    }
    w.open("pub trait Handler: Send + Sync + 'static {");
    for (i, plan) in plans.iter().enumerate() {
        if i > 0 {
            w.blank();
        }
        match plan.summary.as_deref().or(plan.description.as_deref()) {
            Some(text) => w.doc(Some(text)),
            None => w.line(format!("/// `{} {}`", plan.method, single_line(&plan.path))),
        }
        w.open(format!("fn {}(", plan.handler_method));
        w.line("&self,");
        w.line(format!("request: {}Request,", plan.name));
        w.close(format!(
            ") -> impl std::future::Future<Output = Result<{}Response, oasgen_runtime::HandlerError>> + Send;",
            plan.name
        ));
    }
    w.close("}");
}

fn write_router(w: &mut CodeWriter, plans: &[OperationPlan]) {
    w.line("/// Register every operation on a new router.");
    w.line("///");
    w.line("/// Parameter errors are answered with 400, handler errors with 500.");
    w.open("pub fn router<H: Handler>(handler: std::sync::Arc<H>) -> oasgen_runtime::Router {");
    w.line("let mut router = oasgen_runtime::Router::new();");
    for plan in plans {
        let parser = parser_name(plan);
        w.open("{");
        w.line("let handler = std::sync::Arc::clone(&handler);");
        w.open(format!("router.{}(", plan.method.key()));
        w.line(format!("{:?},", plan.path));
        w.open("oasgen_runtime::handler(move |request: oasgen_runtime::Request| {");
        w.line("let handler = std::sync::Arc::clone(&handler);");
        w.open("async move {");
        w.open(format!("let parsed = match {parser}(&request) {{"));
        w.line("Ok(parsed) => parsed,");
        w.line("Err(e) => return e.into_response(),");
        w.close("};");
        w.open(format!("match handler.{}(parsed).await {{", plan.handler_method));
        w.open("Ok(response) => match response.body() {");
        w.line("Ok(body) => oasgen_runtime::respond(response.status(), body),");
        w.line("Err(e) => oasgen_runtime::Problem::internal(e).into_response(),");
        w.close("},");
        w.line("Err(e) => oasgen_runtime::Problem::internal(e).into_response(),");
        w.close("}");
        w.close("}");
        w.close("}),");
        w.close(");");
        w.close("}");
    }
    if plans.is_empty() {
        w.line("let _ = handler;");
    }
    w.line("router");
    w.close("}");
}

fn parser_name(plan: &OperationPlan) -> String {
    format!("parse_{}", plan.handler_method.trim_start_matches("r#"))
}

fn write_parser(w: &mut CodeWriter, plan: &OperationPlan) {
    let arg = if plan.params.is_empty() && plan.body.is_none() {
        "_request"
    } else {
        "request"
    };
    w.open(format!(
        "fn {}({arg}: &oasgen_runtime::Request) -> Result<{}Request, oasgen_runtime::ParamError> {{",
        parser_name(plan),
        plan.name
    ));
    w.open(format!("Ok({}Request {{", plan.name));
    for param in &plan.params {
        let call = match (param.location, param.required) {
            (ParameterLocation::Path, _) => format!("oasgen_runtime::params::required_path(request, {:?})?", param.wire),
            (_, true) => format!("oasgen_runtime::params::required_query(request, {:?})?", param.wire),
            (_, false) => format!("oasgen_runtime::params::optional_query(request, {:?})", param.wire),
        };
        w.line(format!("{}: {call},", param.ident));
    }
    match &plan.body {
        Some((_, true)) => w.line("body: oasgen_runtime::params::json_body(request)?,"),
        Some((_, false)) => w.line("body: oasgen_runtime::params::optional_json_body(request)?,"),
        None => {}
    }
    w.close("})");
    w.close("}");
}
