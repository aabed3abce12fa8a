//! Middleware layer.
//!
//! A [`Stage`] wraps the rest of the chain. It receives the request and a
//! [`Next`] continuation and may:
//!
//! - call `next.run(req)` and return the result unchanged,
//! - call it and rewrite the response on the way out,
//! - return a response without calling it (short-circuit),
//! - return an [`Error`], or convert an error coming from `next` into a
//!   response.
//!
//! Code before `next.run` runs outer-to-inner in list order; code after it
//! runs inner-to-outer. Stages hold no per-request state; whatever they need
//! is handed to their constructor before the pipeline is assembled.
//!
//! ```rust
//! use onion::middleware::{from_fn, Pipeline};
//! use onion::{Method, Request, Response};
//!
//! # async fn demo() {
//! let pipeline = Pipeline::new().stage(from_fn("server-header", |req, next| async move {
//!     let outcome = next.run(req).await;
//!     outcome.map(|mut res| {
//!         res.headers_mut().insert("server", "onion".parse().unwrap());
//!         res
//!     })
//! }));
//!
//! let res = pipeline
//!     .run(Request::new(Method::GET, "/"), |_req: Request| async { Response::text("hi") })
//!     .await
//!     .unwrap();
//! assert_eq!(res.header("server"), Some("onion"));
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::trace;

use crate::error::{BoxError, Error};
use crate::handler::BoxedHandler;
use crate::request::{Head, Request};
use crate::response::Response;

mod auth;
mod limit;
mod pipeline;
mod recover;
mod registry;
mod request_id;
mod trace;

pub use auth::{Authenticate, Principal, StaticTokens, Verifier};
pub use limit::ConcurrencyLimit;
pub use pipeline::Pipeline;
pub use recover::Recover;
pub use registry::Registry;
pub use request_id::RequestId;
pub use trace::Trace;

/// A heap-allocated, type-erased future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What every stage and terminal handler produces.
pub type Outcome = Result<Response, Error>;

/// A shareable, type-erased stage.
pub type BoxedStage = Arc<dyn Stage>;

/// One link in the middleware chain.
pub trait Stage: Send + Sync + 'static {
    /// Used in logs and error messages.
    fn name(&self) -> &'static str;

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Outcome>;

    /// Registers a terminate hook by returning `Some`.
    ///
    /// Hooks run after the final outcome is known, once per request, in
    /// pipeline order, even when an earlier stage short-circuited or the
    /// chain failed. `req` is the request as it was when the chain dropped
    /// it. A stage that keeps the request past the end of the chain leaves
    /// hooks only its method and path. A hook error is logged and counted,
    /// nothing more.
    fn terminate<'a>(
        &'a self,
        _req: &'a Head,
        _outcome: &'a Outcome,
    ) -> Option<BoxFuture<'a, Result<(), BoxError>>> {
        None
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// Per-request view of a pipeline.
pub(crate) struct Chain {
    stages: Arc<[BoxedStage]>,
    terminal: BoxedHandler,
}

impl Chain {
    pub(crate) fn new(stages: Arc<[BoxedStage]>, terminal: BoxedHandler) -> Self {
        Self { stages, terminal }
    }
}

/// The rest of the pipeline.
///
/// Consumed by [`Next::run`], so it can be invoked at most once. Dropping it
/// without calling `run` short-circuits everything inside the current stage.
pub struct Next {
    chain: Arc<Chain>,
    index: usize,
}

impl Next {
    pub(crate) fn start(chain: Arc<Chain>) -> Self {
        Self { chain, index: 0 }
    }

    /// Stages left before the terminal handler.
    pub fn remaining(&self) -> usize {
        self.chain.stages.len().saturating_sub(self.index)
    }

    /// Runs the next stage, or the terminal handler when none are left.
    pub async fn run(self, req: Request) -> Outcome {
        let Some(stage) = self.chain.stages.get(self.index).cloned() else {
            trace!(path = req.path(), "running terminal handler");
            return self.chain.terminal.call(req).await;
        };

        let next = Next { chain: Arc::clone(&self.chain), index: self.index + 1 };
        trace!(stage = stage.name(), remaining = next.remaining(), "running stage");
        let outcome = stage.handle(req, next).await;
        trace!(stage = stage.name(), ok = outcome.is_ok(), "unwinding stage");
        outcome
    }
}

// ── from_fn ───────────────────────────────────────────────────────────────────

type SyncHook = Box<dyn Fn(&Head, &Outcome) -> Result<(), BoxError> + Send + Sync>;

/// A stage built from an async closure. See [`from_fn`].
pub struct FromFn<F> {
    name: &'static str,
    func: F,
    hook: Option<SyncHook>,
}

/// Builds a stage from `async |req, next| -> Outcome`.
pub fn from_fn<F, Fut>(name: &'static str, func: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    FromFn { name, func, hook: None }
}

impl<F> FromFn<F> {
    /// Attaches a terminate hook.
    pub fn on_terminate<H>(mut self, hook: H) -> Self
    where
        H: Fn(&Head, &Outcome) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }
}

impl<F, Fut> Stage for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Outcome> {
        Box::pin((self.func)(req, next))
    }

    fn terminate<'a>(
        &'a self,
        req: &'a Head,
        outcome: &'a Outcome,
    ) -> Option<BoxFuture<'a, Result<(), BoxError>>> {
        let hook = self.hook.as_ref()?;
        Some(Box::pin(async move { hook(req, outcome) }))
    }
}
