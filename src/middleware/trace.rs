//! Per-request tracing: method, path, status, latency.

use std::time::Instant;

use tracing::{debug, error, info};

use super::{BoxFuture, Next, Outcome, Stage};
use crate::error::BoxError;
use crate::request::{Head, Request};

/// Logs each request on the way in and out.
///
/// Put it first so its latency covers every other stage. The terminate hook
/// reports the total time including hooks that ran before it.
pub struct Trace;

#[derive(Clone, Copy)]
struct Started(Instant);

impl Stage for Trace {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn handle<'a>(&'a self, mut req: Request, next: Next) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let method = req.method().clone();
            let path = req.path().to_owned();
            let started = Instant::now();
            req.extensions_mut().insert(Started(started));
            debug!(%method, %path, "request started");

            let outcome = next.run(req).await;

            let latency_ms = started.elapsed().as_millis() as u64;
            match &outcome {
                Ok(res) => {
                    let status = res.status_code().as_u16();
                    info!(%method, %path, status, latency_ms, "request completed");
                }
                Err(e) => error!(%method, %path, error = %e, latency_ms, "request failed"),
            }
            outcome
        })
    }

    fn terminate<'a>(
        &'a self,
        req: &'a Head,
        outcome: &'a Outcome,
    ) -> Option<BoxFuture<'a, Result<(), BoxError>>> {
        Some(Box::pin(async move {
            let total_ms = req
                .extensions()
                .get::<Started>()
                .map(|s| s.0.elapsed().as_millis() as u64);
            debug!(path = req.path(), ok = outcome.is_ok(), total_ms, "request finished");
            Ok(())
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use http::{Method, StatusCode};
    use tracing::Level;

    use super::*;
    use crate::error::Error;
    use crate::middleware::{Pipeline, from_fn};
    use crate::response::Response;

    fn subscriber() -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    #[tokio::test]
    async fn passes_the_response_through() {
        let _guard = subscriber();
        let pipeline = Pipeline::new().stage(Trace);

        let res = pipeline
            .run(Request::new(Method::GET, "/ok"), |_req: Request| async {
                Response::builder().status(StatusCode::CREATED).text("made")
            })
            .await
            .unwrap();

        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.body(), b"made");
        assert_eq!(pipeline.terminate_failures(), 0);
    }

    #[tokio::test]
    async fn passes_the_error_through() {
        let _guard = subscriber();
        let pipeline = Pipeline::new().stage(Trace);

        let err = pipeline
            .run(Request::new(Method::GET, "/fail"), |_req: Request| async {
                Err::<Response, _>(std::io::Error::other("disk full"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Terminal(_)));
        assert_eq!(err.to_string(), "handler failed: disk full");
        assert_eq!(pipeline.terminate_failures(), 0);
    }

    #[tokio::test]
    async fn start_time_is_visible_to_later_hooks() {
        let started = Arc::new(Mutex::new(false));
        let seen = Arc::clone(&started);
        let pipeline = Pipeline::new().stage(Trace).stage(
            from_fn("inner", |req, next| next.run(req)).on_terminate(
                move |head: &Head, _: &Outcome| -> Result<(), BoxError> {
                    *seen.lock().unwrap() = head.extensions().get::<Started>().is_some();
                    Ok(())
                },
            ),
        );

        pipeline
            .run(Request::new(Method::GET, "/"), |_req: Request| async { "hi" })
            .await
            .unwrap();

        assert!(*started.lock().unwrap());
    }
}
