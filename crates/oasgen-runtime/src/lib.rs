//! Runtime support for oasgen-generated servers.
//!
//! Generated `server.rs` files register their operations on a [`Router`],
//! coerce parameters with [`params`], and render failures as RFC 9457
//! problem documents. Generated `security.rs` files plug into
//! [`security::security_middleware`].

pub mod params;
pub mod problem;
pub mod router;
pub mod security;
pub mod serve;
pub mod webhook;

pub use bytes::Bytes;
pub use futures_util::future::BoxFuture;
pub use http;

pub use params::ParamError;
pub use problem::Problem;
pub use router::{
    handler, middleware, normalize_path, path_param, BoxHandler, MatchedRoute, Middleware,
    PathParams, Request, Response, Router, Service,
};
pub use webhook::{WebhookClient, WebhookError};

use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;

/// Error type returned by generated handler traits.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build a response with `status` and an optional JSON body.
pub fn respond(status: u16, body: Option<Vec<u8>>) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = match body {
        Some(body) => {
            let mut response = Response::new(Bytes::from(body));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        None => Response::new(Bytes::new()),
    };
    *response.status_mut() = status;
    response
}
