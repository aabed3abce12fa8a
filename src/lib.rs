//! # onion
//!
//! A small async HTTP framework built around one idea: an ordered
//! middleware pipeline that wraps every handler.
//!
//! ## The model
//!
//! ```text
//!   request ──▶ trace ──▶ request-id ──▶ auth ──▶ handler
//!                 │            │           │         │
//!   response ◀── trace ◀── request-id ◀── auth ◀─────┘
//!                                            └─ 401 (short-circuit)
//!
//!   then: terminate hooks, in pipeline order
//! ```
//!
//! - A [`Stage`](middleware::Stage) runs code before and after the rest of
//!   the chain, may answer on its own, and may convert inner errors.
//! - Stages are built once with their collaborators and shared across
//!   concurrent requests. No global lookups.
//! - Middleware is referred to by name and resolved through a
//!   [`Registry`](middleware::Registry), so the global stack can come from
//!   `ONION_MIDDLEWARE`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use onion::middleware::{Authenticate, Registry, StaticTokens, Trace};
//! use onion::{Method, Request, Response, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Registry::new()
//!         .register("trace", Trace)
//!         .register("auth", Authenticate::new(StaticTokens::new().with("s3cret", "alice")));
//!
//!     let app = Router::with_registry(registry)
//!         .middleware(["trace"])
//!         .on(Method::GET, "/users/{id}", get_user)
//!         .on_with(Method::POST, "/users", &["auth"], create_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json(r#"{"id":"99"}"#)
//! }
//! ```

mod binding;
mod config;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use config::Config;
pub use error::{BoxError, Error};
pub use handler::{Handler, IntoOutcome};
pub use http::{Method, StatusCode};
pub use request::{Head, Request};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::{App, Router};
pub use server::Server;
