//! Security requirement evaluation.
//!
//! An operation's requirement is a list of clauses. Clauses are tried in
//! declared order and the first one whose schemes all authenticate wins.
//! Within a clause, schemes are tried in name order and a single failure
//! abandons the clause.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use futures_util::future::BoxFuture;
use http::header::{AUTHORIZATION, COOKIE};
use http::Method;
use thiserror::Error;

use crate::params::query_value;
use crate::problem::Problem;
use crate::router::{handler, middleware, MatchedRoute, Middleware, Request};

/// Where an API key is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

/// A declared security scheme, reduced to what credential extraction needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityScheme {
    ApiKey {
        name: String,
        location: ApiKeyLocation,
    },
    /// `http` with its sub-scheme (`basic`, `bearer`, `digest`, ...).
    Http { scheme: String },
    OAuth2,
    OpenIdConnect,
    /// Accepted but never satisfiable from request headers.
    MutualTls,
}

impl SecurityScheme {
    pub fn api_key(name: &str, location: ApiKeyLocation) -> Self {
        SecurityScheme::ApiKey {
            name: name.to_string(),
            location,
        }
    }

    pub fn http(scheme: &str) -> Self {
        SecurityScheme::Http {
            scheme: scheme.to_ascii_lowercase(),
        }
    }
}

/// Declared schemes keyed by scheme name.
pub type SchemeTable = BTreeMap<String, SecurityScheme>;

/// One requirement clause: scheme name to required scopes.
pub type Clause = BTreeMap<String, Vec<String>>;

/// Build a clause from `(scheme, scopes)` pairs.
pub fn clause(entries: Vec<(&str, Vec<&str>)>) -> Clause {
    entries
        .into_iter()
        .map(|(scheme, scopes)| {
            (
                scheme.to_string(),
                scopes.into_iter().map(str::to_string).collect(),
            )
        })
        .collect()
}

/// The effective security of one operation after inheritance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    /// Explicitly declared as requiring no authentication.
    Anonymous,
    /// OR-composed clauses. An empty list can never be satisfied.
    Clauses(Vec<Clause>),
}

/// Requirements keyed by (method, path pattern) as registered on the router.
pub type RequirementTable = HashMap<(Method, String), Requirement>;

/// A credential extracted from a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Decoded `Authorization: Basic` user and password.
    Basic { username: String, password: String },
    /// The token of an `Authorization: Bearer` header.
    Bearer(String),
    /// The full `Authorization` header of any other `http` scheme.
    Authorization(String),
    ApiKey(String),
}

/// An authenticated caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub attributes: BTreeMap<String, String>,
}

impl Principal {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Attached to request extensions once a clause is satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub principal: Principal,
    pub scheme: String,
    pub scopes: Vec<String>,
}

/// The authentication context of the active request, if any.
pub fn auth_context(request: &Request) -> Option<&AuthContext> {
    request.extensions().get::<AuthContext>()
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credentials for scheme '{0}'")]
    MissingCredentials(String),

    #[error("unknown security scheme '{0}'")]
    UnknownScheme(String),

    #[error("credentials rejected: {0}")]
    Rejected(String),
}

/// Verifies credentials for a named scheme.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate<'a>(
        &'a self,
        scheme: &'a str,
        credential: Credential,
        scopes: &'a [String],
    ) -> BoxFuture<'a, Result<Principal, AuthError>>;
}

/// Result of evaluating a requirement against a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Authenticated(AuthContext),
    /// No authentication needed.
    Anonymous,
    Unauthenticated,
}

fn authorization(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// The token after an auth-scheme prefix, matched case-insensitively.
fn strip_auth_scheme<'v>(value: &'v str, scheme: &str) -> Option<&'v str> {
    let (prefix, token) = value.split_once(' ')?;
    let token = token.trim();
    (prefix.eq_ignore_ascii_case(scheme) && !token.is_empty()).then_some(token)
}

fn basic(request: &Request) -> Option<Credential> {
    let encoded = strip_auth_scheme(authorization(request)?, "Basic")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;
    let (username, password) = decoded.split_once(':')?;
    if username.is_empty() {
        return None;
    }
    Some(Credential::Basic {
        username: username.to_string(),
        password: password.to_string(),
    })
}

fn bearer(request: &Request) -> Option<Credential> {
    strip_auth_scheme(authorization(request)?, "Bearer").map(|t| Credential::Bearer(t.to_string()))
}

fn cookie_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

/// Pull the credential a scheme expects out of a request.
pub fn extract_credential(scheme: &SecurityScheme, request: &Request) -> Option<Credential> {
    match scheme {
        SecurityScheme::Http { scheme } if scheme.eq_ignore_ascii_case("basic") => basic(request),
        SecurityScheme::Http { scheme } if scheme.eq_ignore_ascii_case("bearer") => bearer(request),
        SecurityScheme::Http { .. } => {
            authorization(request).map(|v| Credential::Authorization(v.to_string()))
        }
        SecurityScheme::OAuth2 | SecurityScheme::OpenIdConnect => bearer(request),
        SecurityScheme::ApiKey { name, location } => {
            let value = match location {
                ApiKeyLocation::Header => request
                    .headers()
                    .get(name.as_str())
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                ApiKeyLocation::Query => query_value(request, name),
                ApiKeyLocation::Cookie => cookie_value(request, name),
            };
            value.filter(|v| !v.is_empty()).map(Credential::ApiKey)
        }
        SecurityScheme::MutualTls => None,
    }
}

async fn satisfy<A>(
    schemes: &SchemeTable,
    clause: &Clause,
    request: &Request,
    authenticator: &A,
) -> Result<Option<AuthContext>, AuthError>
where
    A: Authenticator + ?Sized,
{
    let mut last = None;
    for (name, scopes) in clause {
        let scheme = schemes
            .get(name)
            .ok_or_else(|| AuthError::UnknownScheme(name.clone()))?;
        let credential = extract_credential(scheme, request)
            .ok_or_else(|| AuthError::MissingCredentials(name.clone()))?;
        let principal = authenticator.authenticate(name, credential, scopes).await?;
        last = Some(AuthContext {
            principal,
            scheme: name.clone(),
            scopes: scopes.clone(),
        });
    }
    Ok(last)
}

/// Evaluate `requirement` against `request`.
pub async fn evaluate<A>(
    schemes: &SchemeTable,
    requirement: &Requirement,
    request: &Request,
    authenticator: &A,
) -> Outcome
where
    A: Authenticator + ?Sized,
{
    let clauses = match requirement {
        Requirement::Anonymous => return Outcome::Anonymous,
        Requirement::Clauses(clauses) => clauses,
    };

    for (index, clause) in clauses.iter().enumerate() {
        match satisfy(schemes, clause, request, authenticator).await {
            Ok(Some(context)) => return Outcome::Authenticated(context),
            // An empty clause holds without credentials.
            Ok(None) => return Outcome::Anonymous,
            Err(e) => {
                tracing::debug!(clause = index, error = %e, "security clause not satisfied");
            }
        }
    }
    Outcome::Unauthenticated
}

/// Middleware enforcing per-route requirements.
///
/// A matched route absent from `requirements` is treated like an empty
/// requirement list and rejected. Requests that match no route pass through
/// to the 404 fallback. With no authenticator every request passes through
/// unauthenticated.
pub fn security_middleware(
    schemes: SchemeTable,
    requirements: RequirementTable,
    authenticator: Option<Arc<dyn Authenticator>>,
) -> Middleware {
    let Some(authenticator) = authenticator else {
        tracing::warn!("no authenticator configured; security requirements are not enforced");
        return middleware(|next| next);
    };
    let schemes = Arc::new(schemes);
    let requirements = Arc::new(requirements);

    middleware(move |next| {
        let schemes = Arc::clone(&schemes);
        let requirements = Arc::clone(&requirements);
        let authenticator = Arc::clone(&authenticator);
        handler(move |mut request: Request| {
            let schemes = Arc::clone(&schemes);
            let requirements = Arc::clone(&requirements);
            let authenticator = Arc::clone(&authenticator);
            let next = Arc::clone(&next);
            async move {
                let Some(route) = request.extensions().get::<MatchedRoute>() else {
                    return next(request).await;
                };
                let requirement = requirements
                    .get(&(route.method.clone(), route.pattern.clone()))
                    .cloned()
                    .unwrap_or(Requirement::Clauses(Vec::new()));

                match evaluate(&schemes, &requirement, &request, authenticator.as_ref()).await {
                    Outcome::Authenticated(context) => {
                        tracing::debug!(
                            subject = %context.principal.subject,
                            scheme = %context.scheme,
                            "request authenticated"
                        );
                        request.extensions_mut().insert(context);
                        next(request).await
                    }
                    Outcome::Anonymous => next(request).await,
                    Outcome::Unauthenticated => {
                        tracing::warn!(
                            method = %request.method(),
                            path = %request.uri().path(),
                            "request rejected: no security clause satisfied"
                        );
                        Problem::unauthorized()
                            .with_instance(request.uri().path())
                            .into_response()
                    }
                }
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{Response, Router};
    use bytes::Bytes;
    use http::StatusCode;

    /// Accepts the bearer token "good", the api key "k1" and basic
    /// alice:secret. Grants scopes only to "admin-token".
    struct Fixed;

    impl Authenticator for Fixed {
        fn authenticate<'a>(
            &'a self,
            scheme: &'a str,
            credential: Credential,
            scopes: &'a [String],
        ) -> BoxFuture<'a, Result<Principal, AuthError>> {
            Box::pin(async move {
                match credential {
                    Credential::Bearer(token) if token == "admin-token" => Ok(Principal::new("admin")),
                    Credential::Bearer(token) if token == "good" && scopes.is_empty() => {
                        Ok(Principal::new("bearer-user"))
                    }
                    Credential::ApiKey(key) if key == "k1" => Ok(Principal::new("key-user")),
                    Credential::Basic { username, password }
                        if username == "alice" && password == "secret" =>
                    {
                        Ok(Principal::new(username))
                    }
                    _ => Err(AuthError::Rejected(format!("{scheme} credential refused"))),
                }
            })
        }
    }

    fn schemes() -> SchemeTable {
        let mut table = SchemeTable::new();
        table.insert("bearer".into(), SecurityScheme::http("bearer"));
        table.insert("basic".into(), SecurityScheme::http("Basic"));
        table.insert("oauth2".into(), SecurityScheme::OAuth2);
        table.insert(
            "apiKey".into(),
            SecurityScheme::api_key("X-API-Key", ApiKeyLocation::Header),
        );
        table.insert(
            "queryKey".into(),
            SecurityScheme::api_key("key", ApiKeyLocation::Query),
        );
        table.insert(
            "cookieKey".into(),
            SecurityScheme::api_key("session", ApiKeyLocation::Cookie),
        );
        table.insert("mtls".into(), SecurityScheme::MutualTls);
        table
    }

    fn request(headers: &[(&str, &str)], uri: &str) -> Request {
        let mut builder = http::Request::builder().uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(Bytes::new()).unwrap()
    }

    async fn run(requirement: Requirement, req: Request) -> Outcome {
        evaluate(&schemes(), &requirement, &req, &Fixed).await
    }

    #[tokio::test]
    async fn clauses_are_or_composed() {
        let requirement = Requirement::Clauses(vec![
            clause(vec![("bearer", vec![])]),
            clause(vec![("apiKey", vec![])]),
        ]);
        let outcome = run(requirement, request(&[("x-api-key", "k1")], "/")).await;
        let Outcome::Authenticated(context) = outcome else {
            panic!("expected authentication, got {outcome:?}");
        };
        assert_eq!(context.scheme, "apiKey");
        assert_eq!(context.principal.subject, "key-user");
    }

    #[tokio::test]
    async fn schemes_within_a_clause_are_and_composed() {
        let requirement = Requirement::Clauses(vec![clause(vec![
            ("oauth2", vec!["read"]),
            ("apiKey", vec![]),
        ])]);
        let req = request(
            &[("x-api-key", "k1"), ("authorization", "Bearer good")],
            "/",
        );
        assert_eq!(run(requirement.clone(), req).await, Outcome::Unauthenticated);

        let req = request(
            &[("x-api-key", "k1"), ("authorization", "Bearer admin-token")],
            "/",
        );
        let Outcome::Authenticated(context) = run(requirement, req).await else {
            panic!("expected authentication");
        };
        // Schemes run in name order; the last one evaluated provides the context.
        assert_eq!(context.scheme, "oauth2");
        assert_eq!(context.scopes, vec!["read"]);
    }

    #[tokio::test]
    async fn first_satisfied_clause_wins() {
        let requirement = Requirement::Clauses(vec![
            clause(vec![("bearer", vec![])]),
            clause(vec![("apiKey", vec![])]),
        ]);
        let req = request(
            &[("x-api-key", "k1"), ("authorization", "Bearer good")],
            "/",
        );
        let Outcome::Authenticated(context) = run(requirement, req).await else {
            panic!("expected authentication");
        };
        assert_eq!(context.scheme, "bearer");
    }

    #[tokio::test]
    async fn explicit_empty_list_is_anonymous() {
        assert_eq!(
            run(Requirement::Anonymous, request(&[], "/")).await,
            Outcome::Anonymous
        );
        assert_eq!(
            run(Requirement::Clauses(vec![Clause::new()]), request(&[], "/")).await,
            Outcome::Anonymous
        );
        assert_eq!(
            run(Requirement::Clauses(vec![]), request(&[], "/")).await,
            Outcome::Unauthenticated
        );
    }

    #[tokio::test]
    async fn unknown_scheme_abandons_the_clause() {
        let requirement = Requirement::Clauses(vec![
            clause(vec![("ghost", vec![])]),
            clause(vec![("apiKey", vec![])]),
        ]);
        let outcome = run(requirement, request(&[("x-api-key", "k1")], "/")).await;
        assert!(matches!(outcome, Outcome::Authenticated(_)));
    }

    #[test]
    fn extracts_each_credential_kind() {
        let schemes = schemes();
        let req = request(
            &[
                ("authorization", "Basic YWxpY2U6c2VjcmV0"),
                ("cookie", "theme=dark; session=abc"),
            ],
            "/pets?key=q%2D1",
        );
        assert_eq!(
            extract_credential(&schemes["basic"], &req),
            Some(Credential::Basic {
                username: "alice".into(),
                password: "secret".into()
            })
        );
        assert_eq!(extract_credential(&schemes["bearer"], &req), None);
        assert_eq!(
            extract_credential(&schemes["queryKey"], &req),
            Some(Credential::ApiKey("q-1".into()))
        );
        assert_eq!(
            extract_credential(&schemes["cookieKey"], &req),
            Some(Credential::ApiKey("abc".into()))
        );
        assert_eq!(extract_credential(&schemes["mtls"], &req), None);

        let req = request(&[("authorization", "bearer tok")], "/");
        assert_eq!(
            extract_credential(&schemes["oauth2"], &req),
            Some(Credential::Bearer("tok".into()))
        );
        assert_eq!(
            extract_credential(&SecurityScheme::http("digest"), &req),
            Some(Credential::Authorization("bearer tok".into()))
        );
        assert_eq!(extract_credential(&schemes["basic"], &req), None);
    }

    fn service(authenticator: Option<Arc<dyn Authenticator>>) -> crate::router::Service {
        let mut requirements = RequirementTable::new();
        requirements.insert(
            (Method::GET, "/pets".to_string()),
            Requirement::Clauses(vec![clause(vec![("bearer", vec![])])]),
        );
        requirements.insert((Method::GET, "/health".to_string()), Requirement::Anonymous);

        let mut router = Router::new();
        let who = |req: Request| async move {
            let subject = auth_context(&req)
                .map(|c| c.principal.subject.clone())
                .unwrap_or_else(|| "anonymous".into());
            Response::new(Bytes::from(subject))
        };
        router
            .get("/pets", handler(who))
            .get("/health", handler(who))
            .get("/open", handler(who))
            .middleware(security_middleware(schemes(), requirements, authenticator));
        router.build()
    }

    #[tokio::test]
    async fn middleware_enforces_route_requirements() {
        let service = service(Some(Arc::new(Fixed)));

        let denied = service.call(request(&[], "/pets")).await;
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = service
            .call(request(&[("authorization", "Bearer good")], "/pets"))
            .await;
        assert_eq!(allowed.status(), StatusCode::OK);
        assert_eq!(allowed.body(), "bearer-user");

        let health = service.call(request(&[], "/health")).await;
        assert_eq!(health.body(), "anonymous");
    }

    #[tokio::test]
    async fn route_without_requirement_is_rejected() {
        let service = service(Some(Arc::new(Fixed)));

        let open = service.call(request(&[], "/open")).await;
        assert_eq!(open.status(), StatusCode::UNAUTHORIZED);

        let mut requirements = RequirementTable::new();
        requirements.insert((Method::GET, "/pets".to_string()), Requirement::Clauses(vec![]));
        let mut router = Router::new();
        router
            .get("/pets", handler(|_req: Request| async { Response::new(Bytes::new()) }))
            .middleware(security_middleware(schemes(), requirements, Some(Arc::new(Fixed))));
        let response = router.build().call(request(&[], "/pets")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let unrouted = service.call(request(&[], "/nowhere")).await;
        assert_eq!(unrouted.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_authenticator_passes_everything() {
        let service = service(None);
        let response = service.call(request(&[], "/pets")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), "anonymous");
    }
}
