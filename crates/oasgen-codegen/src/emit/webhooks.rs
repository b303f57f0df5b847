//! `webhooks.rs`: payload types and a sender with one method per webhook.

use oasgen_spec::{HttpMethod, RefOr};

use super::types::{write_definition, write_pending};
use super::{header, CodeWriter, TypeRenderer};
use crate::error::GenerateError;
use crate::mapper::{TypeDescriptor, TypeMapper};
use crate::naming::{to_field_name, type_name};

struct Delivery {
    method: HttpMethod,
    send_method: String,
    /// Payload type and whether it must be sent.
    payload: Option<(String, bool)>,
    summary: Option<String>,
}

/// Emits `webhooks.rs`.
pub struct WebhooksEmitter<'m, 'a> {
    renderer: TypeRenderer<'m, 'a>,
}

impl<'m, 'a> WebhooksEmitter<'m, 'a> {
    pub fn new(mapper: &'m TypeMapper<'a>) -> Self {
        Self {
            renderer: TypeRenderer::new(mapper),
        }
    }

    /// Render `webhooks.rs`, or `None` when no webhook is declared.
    pub fn emit(mut self) -> Result<Option<String>, GenerateError> {
        let resolver = self.renderer.mapper().resolver();
        let document = resolver.document();
        if document.webhooks.is_empty() {
            return Ok(None);
        }

        let mut w = CodeWriter::new();
        w.line(header());
        w.blank();
        w.line("use super::types::*;");

        let mut deliveries = Vec::new();
        for (name, item) in &document.webhooks {
            let operations: Vec<_> = item.operations().collect();
            for (method, operation) in &operations {
                // A webhook with several verbs gets one method per verb.
                let base = if operations.len() > 1 {
                    type_name(&format!("{} {name}", method.key()), "Webhook")
                } else {
                    type_name(name, "Webhook")
                };

                let payload = match &operation.request_body {
                    Some(entry) => {
                        let body = match entry {
                            RefOr::Ref { reference } => resolver
                                .resolve_request_body(reference)
                                .map_err(|source| GenerateError::Resolve {
                                    context: format!("webhook {name} request body"),
                                    source,
                                })?,
                            RefOr::Item(body) => body,
                        };
                        body.json().map(|media| {
                            let ty = media
                                .schema
                                .as_ref()
                                .map_or(TypeDescriptor::Any, |s| self.renderer.mapper().resolve_type(s));
                            (ty, body.required)
                        })
                    }
                    None => None,
                };

                let payload = match payload {
                    Some((ty, required)) => {
                        let payload_name = format!("{base}Payload");
                        if self.renderer.claim(&payload_name) {
                            w.blank();
                            let description = format!("Payload of the `{name}` webhook.");
                            write_definition(&mut w, &mut self.renderer, &payload_name, Some(&description), &ty);
                            write_pending(&mut w, &mut self.renderer);
                        }
                        Some((payload_name, required))
                    }
                    None => None,
                };

                deliveries.push(Delivery {
                    method: *method,
                    send_method: format!("send_{}", to_field_name(&base).trim_start_matches("r#")),
                    payload,
                    summary: operation.summary.clone().or_else(|| operation.description.clone()),
                });
            }
        }

        w.blank();
        write_sender(&mut w, &deliveries);
        Ok(Some(w.finish()))
    }
}

fn write_sender(w: &mut CodeWriter, deliveries: &[Delivery]) {
    w.line("/// Delivers webhook payloads as JSON.");
    w.line("#[derive(Debug, Clone, Default)]");
    w.open("pub struct WebhookSender {");
    w.line("client: oasgen_runtime::WebhookClient,");
    w.close("}");
    w.blank();
    w.open("impl WebhookSender {");
    w.open("pub fn new() -> Self {");
    w.line("Self::default()");
    w.close("}");
    w.blank();
    w.open("pub fn with_client(client: oasgen_runtime::WebhookClient) -> Self {");
    w.line("Self { client }");
    w.close("}");

    for delivery in deliveries {
        w.blank();
        if let Some(summary) = &delivery.summary {
            w.doc(Some(summary));
            w.line("///");
        }
        w.line(format!(
            "/// Sends a `{}` to `url` and returns the response status.",
            delivery.method
        ));
        let method = format!("oasgen_runtime::http::Method::{}", delivery.method);
        match &delivery.payload {
            Some((ty, true)) => {
                w.open(format!(
                    "pub async fn {}(&self, url: &str, payload: &{ty}) -> Result<u16, oasgen_runtime::WebhookError> {{",
                    delivery.send_method
                ));
                w.line(format!("self.client.send({method}, url, Some(payload)).await"));
            }
            Some((ty, false)) => {
                w.open(format!(
                    "pub async fn {}(&self, url: &str, payload: Option<&{ty}>) -> Result<u16, oasgen_runtime::WebhookError> {{",
                    delivery.send_method
                ));
                w.line(format!("self.client.send({method}, url, payload).await"));
            }
            None => {
                w.open(format!(
                    "pub async fn {}(&self, url: &str) -> Result<u16, oasgen_runtime::WebhookError> {{",
                    delivery.send_method
                ));
                w.line(format!("self.client.send::<()>({method}, url, None).await"));
            }
        }
        w.close("}");
    }
    w.close("}");
}
