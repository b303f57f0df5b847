//! Parameter and body extraction with type coercion.
//!
//! Required parameters fail with a [`ParamError`] that renders as a 400
//! problem response. Optional query parameters that are missing or do not
//! coerce are reported as absent.

use std::fmt::Display;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::problem::Problem;
use crate::router::{path_param, Request, Response};

/// A request that does not satisfy an operation's parameter contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("missing required parameter '{name}' in {location}")]
    Missing { name: String, location: &'static str },

    #[error("invalid parameter '{name}' in {location}: {reason}")]
    Invalid {
        name: String,
        location: &'static str,
        reason: String,
    },

    #[error("missing required request body")]
    MissingBody,

    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

impl ParamError {
    pub fn into_response(self) -> Response {
        Problem::bad_request(self.to_string()).into_response()
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode `%XX` escapes, optionally mapping `+` to a space.
///
/// Malformed escapes are kept verbatim; invalid UTF-8 is replaced.
pub fn percent_decode(input: &str, plus_as_space: bool) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let high = bytes.get(i + 1).copied().and_then(hex_value);
                let low = bytes.get(i + 2).copied().and_then(hex_value);
                match high.zip(low) {
                    Some((high, low)) => {
                        out.push(high << 4 | low);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// The first value of query parameter `name`, decoded.
pub fn query_value(request: &Request, name: &str) -> Option<String> {
    let query = request.uri().query()?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (percent_decode(key, true) == name).then(|| percent_decode(value, true))
    })
}

fn coerce<T>(raw: &str, name: &str, location: &'static str) -> Result<T, ParamError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse::<T>().map_err(|e| ParamError::Invalid {
        name: name.to_string(),
        location,
        reason: e.to_string(),
    })
}

/// A required path parameter, coerced to `T`.
pub fn required_path<T>(request: &Request, name: &str) -> Result<T, ParamError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = path_param(request, name).ok_or_else(|| ParamError::Missing {
        name: name.to_string(),
        location: "path",
    })?;
    coerce(raw, name, "path")
}

/// A required query parameter, coerced to `T`.
pub fn required_query<T>(request: &Request, name: &str) -> Result<T, ParamError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = query_value(request, name).ok_or_else(|| ParamError::Missing {
        name: name.to_string(),
        location: "query",
    })?;
    coerce(&raw, name, "query")
}

/// An optional query parameter. A value that fails to coerce is treated as
/// absent rather than rejected.
pub fn optional_query<T>(request: &Request, name: &str) -> Option<T>
where
    T: FromStr,
{
    query_value(request, name)?.parse().ok()
}

/// Decode a required JSON body.
pub fn json_body<T: DeserializeOwned>(request: &Request) -> Result<T, ParamError> {
    optional_json_body(request)?.ok_or(ParamError::MissingBody)
}

/// Decode a JSON body; an empty body is `None`.
pub fn optional_json_body<T: DeserializeOwned>(request: &Request) -> Result<Option<T>, ParamError> {
    let body = request.body();
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ParamError::InvalidBody(e.to_string()))
}
