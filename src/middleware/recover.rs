//! Error-to-response conversion.

use http::StatusCode;
use tracing::error;

use super::{BoxFuture, Next, Outcome, Stage};
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

type Render = Box<dyn Fn(&Error) -> Response + Send + Sync>;

/// Turns any error unwinding out of the inner chain into a response.
///
/// Defaults to a bare `500 Internal Server Error`; [`Recover::with`] picks
/// the response per error. Place it outside the stages whose errors it
/// should catch.
pub struct Recover {
    render: Render,
}

impl Recover {
    pub fn new() -> Self {
        Self::with(|_| Response::status(StatusCode::INTERNAL_SERVER_ERROR))
    }

    pub fn with<F>(render: F) -> Self
    where
        F: Fn(&Error) -> Response + Send + Sync + 'static,
    {
        Self { render: Box::new(render) }
    }
}

impl Default for Recover {
    fn default() -> Self { Self::new() }
}

impl Stage for Recover {
    fn name(&self) -> &'static str {
        "recover"
    }

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let path = req.path().to_owned();
            let outcome = next.run(req).await;
            outcome.or_else(|e| {
                error!(%path, error = %e, "converting pipeline error to response");
                Ok::<_, Error>((self.render)(&e))
            })
        })
    }
}
