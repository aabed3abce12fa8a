//! Minimal onion example: named middleware, a protected scope, a bound
//! route parameter.
//!
//! Run with:
//!   RUST_LOG=debug ONION_MIDDLEWARE=web cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/1
//!   curl -i http://localhost:3000/users/404
//!   curl -i http://localhost:3000/me
//!   curl -i -H 'authorization: Bearer s3cret' http://localhost:3000/me

use onion::middleware::{
    Authenticate, ConcurrencyLimit, Principal, Recover, Registry, RequestId, StaticTokens, Trace,
};
use onion::{Config, Method, Request, Response, Router, Server};

#[derive(Clone)]
struct User {
    id: u32,
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), onion::Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    let registry = Registry::new()
        .register("trace", Trace)
        .register("request-id", RequestId)
        .register("recover", Recover::new())
        .register("limit", ConcurrencyLimit::new(config.max_in_flight))
        .register("auth", Authenticate::new(StaticTokens::new().with("s3cret", "alice")))
        .group("web", ["trace", "request-id", "recover", "limit"]);

    let app = Router::with_registry(registry)
        .middleware(config.middleware.clone())
        .bind("user", |raw: String| async move { find_user(&raw) })
        .on(Method::GET, "/users/{user}", show_user)
        .scope(&["auth"], |r| r.on(Method::GET, "/me", me));

    Server::from_config(&config)?.serve(app).await
}

// Stands in for a database lookup.
fn find_user(raw: &str) -> Option<User> {
    let id: u32 = raw.parse().ok()?;
    (id < 100).then(|| User { id, name: format!("user-{id}") })
}

// GET /users/{user} → 404 from the binding stage when the user is unknown.
async fn show_user(req: Request) -> Response {
    match req.bound::<User>("user") {
        Some(user) => Response::json(format!(r#"{{"id":{},"name":"{}"}}"#, user.id, user.name)),
        None => Response::text("unbound"),
    }
}

// GET /me → 401 without a bearer token.
async fn me(req: Request) -> Response {
    let who = req.extensions().get::<Principal>().map(|p| p.0.clone()).unwrap_or_default();
    Response::text(who)
}
