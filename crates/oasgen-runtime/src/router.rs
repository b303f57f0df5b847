//! Linear first-match request router with middleware composition.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::{self, BoxFuture};
use http::Method;

use crate::params::percent_decode;
use crate::problem::Problem;

/// A request with its body fully buffered.
pub type Request = http::Request<Bytes>;

/// A response with a buffered body.
pub type Response = http::Response<Bytes>;

/// A type-erased request handler.
pub type BoxHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wraps a handler into another handler.
pub type Middleware = Arc<dyn Fn(BoxHandler) -> BoxHandler + Send + Sync>;

/// Box an async function as a [`BoxHandler`].
pub fn handler<F, Fut>(f: F) -> BoxHandler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |request: Request| -> BoxFuture<'static, Response> { Box::pin(f(request)) })
}

/// Box a handler transformer as a [`Middleware`].
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(BoxHandler) -> BoxHandler + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Path parameters captured by the matched route, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The route a request was matched to, as registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute {
    pub method: Method,
    pub pattern: String,
}

/// Look up a captured path parameter on the active request.
pub fn path_param<'r>(request: &'r Request, name: &str) -> Option<&'r str> {
    request.extensions().get::<PathParams>()?.get(name)
}

/// The handler chosen by matching; consumed by the innermost dispatch step.
#[derive(Clone)]
struct Target(BoxHandler);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    normalize_path(pattern)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}

struct Route {
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
    handler: BoxHandler,
}

impl Route {
    fn captures(&self, path: &[&str]) -> Option<PathParams> {
        if path.len() != self.segments.len() {
            return None;
        }
        let mut params = Vec::new();
        for (segment, value) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(literal) if literal == value => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => params.push((name.clone(), percent_decode(value, false))),
            }
        }
        Some(PathParams(params))
    }
}

/// Route table under construction.
///
/// Routes are matched in registration order; the first route whose verb and
/// segments match wins. Call [`Router::build`] to freeze the table.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    middlewares: Vec<Middleware>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `pattern` (e.g. `/pets/{petId}`).
    pub fn route(&mut self, method: Method, pattern: &str, handler: BoxHandler) -> &mut Self {
        self.routes.push(Route {
            segments: parse_pattern(pattern),
            method,
            pattern: pattern.to_string(),
            handler,
        });
        self
    }

    pub fn get(&mut self, pattern: &str, handler: BoxHandler) -> &mut Self {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post(&mut self, pattern: &str, handler: BoxHandler) -> &mut Self {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put(&mut self, pattern: &str, handler: BoxHandler) -> &mut Self {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn patch(&mut self, pattern: &str, handler: BoxHandler) -> &mut Self {
        self.route(Method::PATCH, pattern, handler)
    }

    pub fn delete(&mut self, pattern: &str, handler: BoxHandler) -> &mut Self {
        self.route(Method::DELETE, pattern, handler)
    }

    pub fn options(&mut self, pattern: &str, handler: BoxHandler) -> &mut Self {
        self.route(Method::OPTIONS, pattern, handler)
    }

    pub fn head(&mut self, pattern: &str, handler: BoxHandler) -> &mut Self {
        self.route(Method::HEAD, pattern, handler)
    }

    pub fn trace(&mut self, pattern: &str, handler: BoxHandler) -> &mut Self {
        self.route(Method::TRACE, pattern, handler)
    }

    /// Add a middleware. The first one added wraps all later ones.
    pub fn middleware(&mut self, middleware: Middleware) -> &mut Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freeze the table into a cloneable service.
    pub fn build(self) -> Service {
        let dispatch: BoxHandler = Arc::new(|mut request: Request| -> BoxFuture<'static, Response> {
            let target = request.extensions_mut().remove::<Target>();
            match target {
                Some(Target(handler)) => handler(request),
                None => {
                    let path = request.uri().path().to_string();
                    Box::pin(future::ready(Problem::not_found(&path).into_response()))
                }
            }
        });
        let entry = self
            .middlewares
            .iter()
            .rev()
            .fold(dispatch, |next, middleware| middleware(next));

        Service {
            inner: Arc::new(Inner {
                routes: self.routes,
                entry,
            }),
        }
    }
}

struct Inner {
    routes: Vec<Route>,
    entry: BoxHandler,
}

/// An immutable, shareable router.
#[derive(Clone)]
pub struct Service {
    inner: Arc<Inner>,
}

impl Service {
    /// Match and dispatch one request through the middleware chain.
    ///
    /// On a match, [`PathParams`] and [`MatchedRoute`] are attached to the
    /// request extensions before any middleware runs. Unmatched paths and
    /// verbs still pass through middleware and end in a 404.
    pub fn call(&self, mut request: Request) -> BoxFuture<'static, Response> {
        let path = normalize_path(request.uri().path());
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let matched = self.inner.routes.iter().find_map(|route| {
            if route.method != *request.method() {
                return None;
            }
            route.captures(&segments).map(|params| (route, params))
        });

        match matched {
            Some((route, params)) => {
                tracing::debug!(
                    method = %route.method,
                    pattern = %route.pattern,
                    params = params.len(),
                    "matched route"
                );
                let extensions = request.extensions_mut();
                extensions.insert(params);
                extensions.insert(MatchedRoute {
                    method: route.method.clone(),
                    pattern: route.pattern.clone(),
                });
                extensions.insert(Target(Arc::clone(&route.handler)));
            }
            None => {
                tracing::debug!(method = %request.method(), path = %path, "no route matched");
            }
        }

        (self.inner.entry)(request)
    }

    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.inner
            .routes
            .iter()
            .map(|r| (&r.method, r.pattern.as_str()))
    }
}

/// Normalize a request path: strip trailing slashes, collapse double slashes.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    let mut prev_slash = false;

    for ch in path.chars() {
        if ch == '/' {
            if !prev_slash {
                normalized.push('/');
            }
            prev_slash = true;
        } else {
            normalized.push(ch);
            prev_slash = false;
        }
    }

    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    if normalized.is_empty() {
        "/".to_string()
    } else {
        normalized
    }
}
