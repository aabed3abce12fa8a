//! Terminal handlers and type erasure.
//!
//! A terminal handler is the innermost function of a pipeline, usually a
//! route handler. Routes hold handlers of different concrete types in one
//! table, so each is erased behind `dyn ErasedHandler`:
//!
//! ```text
//! async fn hello(req: Request) -> Response { … }   ← user writes this
//!        ↓ router.on(Method::GET, "/", hello)
//! hello.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at the end of the chain       ← one vtable dispatch
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::error::{BoxError, Error};
use crate::middleware::{BoxFuture, Outcome};
use crate::request::Request;
use crate::response::IntoResponse;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Outcome>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── IntoOutcome ───────────────────────────────────────────────────────────────

/// What a terminal handler may return.
///
/// Anything that is [`IntoResponse`] succeeds; a `Result<R, E>` fails with
/// [`Error::Terminal`] on `Err`, which then unwinds through the stages like
/// any other error.
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl<T: IntoResponse> IntoOutcome for T {
    fn into_outcome(self) -> Outcome {
        Ok(self.into_response())
    }
}

impl<R, E> IntoOutcome for Result<R, E>
where
    R: IntoResponse,
    E: Into<BoxError>,
{
    fn into_outcome(self) -> Outcome {
        self.map(IntoResponse::into_response).map_err(Error::terminal)
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid terminal handler.
///
/// Automatically satisfied for any `async fn name(req: Request) -> impl
/// IntoOutcome` and equivalent closures. Sealed: only the blanket impl below
/// can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Outcome> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use super::*;
    use crate::response::Response;

    #[tokio::test]
    async fn plain_response_succeeds() {
        let handler = (|_req: Request| async { "hello" }).into_boxed_handler();
        let res = handler.call(Request::new(Method::GET, "/")).await.unwrap();
        assert_eq!(res.body(), b"hello");
    }

    #[tokio::test]
    async fn err_becomes_terminal_error() {
        let handler = (|_req: Request| async {
            Err::<Response, _>(std::io::Error::other("db down"))
        })
        .into_boxed_handler();
        let err = handler.call(Request::new(Method::GET, "/")).await.unwrap_err();
        assert!(matches!(err, Error::Terminal(_)));
        assert_eq!(err.to_string(), "handler failed: db down");
    }

    #[tokio::test]
    async fn status_is_a_valid_return() {
        let handler = (|_req: Request| async { StatusCode::NO_CONTENT }).into_boxed_handler();
        let res = handler.call(Request::new(Method::GET, "/")).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
    }
}
