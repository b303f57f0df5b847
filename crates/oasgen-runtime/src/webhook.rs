//! Outbound webhook delivery.

use http::Method;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook delivery to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Sends webhook payloads as JSON.
#[derive(Debug, Clone, Default)]
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (timeouts, TLS, default headers).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Send `payload` to `url` with `method` and return the response status.
    ///
    /// Non-2xx statuses are returned, not treated as errors.
    pub async fn send<T>(&self, method: Method, url: &str, payload: Option<&T>) -> Result<u16, WebhookError>
    where
        T: Serialize + ?Sized,
    {
        let mut request = self.client.request(method.clone(), url);
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|source| WebhookError::Request {
            url: url.to_string(),
            source,
        })?;
        let status = response.status().as_u16();
        tracing::debug!(method = %method, url, status, "webhook delivered");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/pet"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"id": 7, "name": "Rex"})))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = WebhookClient::new();
        let status = client
            .send(
                Method::POST,
                &format!("{}/hooks/pet", server.uri()),
                Some(&json!({"id": 7, "name": "Rex"})),
            )
            .await
            .unwrap();
        assert_eq!(status, 202);
    }

    #[tokio::test]
    async fn error_status_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let status = WebhookClient::new()
            .send::<()>(Method::PUT, &server.uri(), None)
            .await
            .unwrap();
        assert_eq!(status, 500);
    }

    #[tokio::test]
    async fn unreachable_target_is_an_error() {
        let err = WebhookClient::new()
            .send::<()>(Method::POST, "http://127.0.0.1:1/unreachable", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("127.0.0.1:1"));
    }
}
