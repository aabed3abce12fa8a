//! Bearer-token authentication.
//!
//! [`Authenticate`] owns no credentials itself. It is handed a [`Verifier`]
//! when constructed, so the token store (a database, an identity provider,
//! a fixed map in tests) is chosen by whoever assembles the pipeline.

use std::collections::HashMap;

use http::StatusCode;
use tracing::debug;

use super::{BoxFuture, Next, Outcome, Stage};
use crate::error::{BoxError, Error};
use crate::request::Request;
use crate::response::Response;

/// The authenticated caller, stored in the request extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal(pub String);

/// Checks a bearer token.
///
/// `Ok(None)` means the token is not valid; `Err` means the check itself
/// could not be performed.
pub trait Verifier: Send + Sync + 'static {
    fn verify<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Option<Principal>, BoxError>>;
}

/// A fixed token → principal table.
#[derive(Clone, Debug, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, Principal>,
}

impl StaticTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, token: &str, principal: &str) -> Self {
        self.tokens.insert(token.to_owned(), Principal(principal.to_owned()));
        self
    }
}

impl Verifier for StaticTokens {
    fn verify<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Option<Principal>, BoxError>> {
        Box::pin(async move { Ok(self.tokens.get(token).cloned()) })
    }
}

/// Rejects requests without a valid `Authorization: Bearer <token>` header
/// with `401 Unauthorized`. Accepted requests carry a [`Principal`].
pub struct Authenticate<V> {
    verifier: V,
}

impl<V: Verifier> Authenticate<V> {
    pub fn new(verifier: V) -> Self {
        Self { verifier }
    }
}

impl<V: Verifier> Stage for Authenticate<V> {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn handle<'a>(&'a self, mut req: Request, next: Next) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let Some(token) = bearer(&req).map(str::to_owned) else {
                debug!(path = req.path(), "missing bearer token");
                return Ok(unauthorized());
            };

            let verified = self
                .verifier
                .verify(&token)
                .await
                .map_err(|e| Error::stage("auth", e))?;

            match verified {
                Some(principal) => {
                    req.extensions_mut().insert(principal);
                    next.run(req).await
                }
                None => {
                    debug!(path = req.path(), "rejected bearer token");
                    Ok(unauthorized())
                }
            }
        })
    }
}

fn bearer(req: &Request) -> Option<&str> {
    let value = req.header("authorization")?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn unauthorized() -> Response {
    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header("www-authenticate", "Bearer")
        .no_body()
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::middleware::Pipeline;

    struct Broken;

    impl Verifier for Broken {
        fn verify<'a>(&'a self, _: &'a str) -> BoxFuture<'a, Result<Option<Principal>, BoxError>> {
            Box::pin(async { Err("identity provider unreachable".into()) })
        }
    }

    async fn whoami(req: Request) -> Response {
        let who = req.extensions().get::<Principal>().map(|p| p.0.clone()).unwrap_or_default();
        Response::text(who)
    }

    fn pipeline() -> Pipeline {
        Pipeline::new().stage(Authenticate::new(StaticTokens::new().with("s3cret", "alice")))
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let req = Request::new(Method::GET, "/").with_header("authorization", "bearer abc");
        assert_eq!(bearer(&req), Some("abc"));
        let req = Request::new(Method::GET, "/").with_header("authorization", "Basic abc");
        assert_eq!(bearer(&req), None);
        let req = Request::new(Method::GET, "/").with_header("authorization", "Bearer ");
        assert_eq!(bearer(&req), None);
    }

    #[tokio::test]
    async fn valid_token_reaches_handler() {
        let req = Request::new(Method::GET, "/me").with_header("authorization", "Bearer s3cret");
        let res = pipeline().run(req, whoami).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"alice");
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let req = Request::new(Method::GET, "/me").with_header("authorization", "Bearer nope");
        let res = pipeline().run(req, whoami).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.header("www-authenticate"), Some("Bearer"));
    }

    #[tokio::test]
    async fn verifier_failure_is_a_stage_error() {
        let req = Request::new(Method::GET, "/me").with_header("authorization", "Bearer x");
        let err = Pipeline::new()
            .stage(Authenticate::new(Broken))
            .run(req, whoami)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Stage { stage: "auth", .. }));
    }
}
