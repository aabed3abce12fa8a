//! In-flight request limit.

use std::sync::atomic::{AtomicUsize, Ordering};

use http::StatusCode;
use tracing::warn;

use super::{BoxFuture, Next, Outcome, Stage};
use crate::request::Request;
use crate::response::Response;

/// Caps the number of requests inside the rest of the chain at once.
///
/// Requests over the cap get `503 Service Unavailable` with `retry-after: 1`
/// and never reach inner stages.
pub struct ConcurrencyLimit {
    max: usize,
    in_flight: AtomicUsize,
}

impl ConcurrencyLimit {
    pub fn new(max: usize) -> Self {
        Self { max, in_flight: AtomicUsize::new(0) }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Releases its slot on drop, so errors and cancellation release it too.
struct Permit<'a>(&'a AtomicUsize);

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Stage for ConcurrencyLimit {
    fn name(&self) -> &'static str {
        "limit"
    }

    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let before = self.in_flight.fetch_add(1, Ordering::AcqRel);
            let _permit = Permit(&self.in_flight);
            if before >= self.max {
                warn!(path = req.path(), max = self.max, "concurrency limit reached");
                return Ok(Response::builder()
                    .status(StatusCode::SERVICE_UNAVAILABLE)
                    .header("retry-after", "1")
                    .no_body());
            }
            next.run(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::Method;
    use tokio::sync::{Barrier, Notify};

    use super::*;
    use crate::middleware::{BoxedStage, Pipeline};

    #[tokio::test]
    async fn over_limit_is_rejected_then_slot_is_released() {
        let limit = Arc::new(ConcurrencyLimit::new(1));
        let pipeline = Pipeline::from_stages(vec![limit.clone() as BoxedStage]);

        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Notify::new());
        let slow = {
            let (entered, release) = (Arc::clone(&entered), Arc::clone(&release));
            move |_req: Request| {
                let (entered, release) = (Arc::clone(&entered), Arc::clone(&release));
                async move {
                    entered.wait().await;
                    release.notified().await;
                    Response::text("slow")
                }
            }
        };

        let first = tokio::spawn({
            let pipeline = pipeline.clone();
            let slow = slow.clone();
            async move { pipeline.run(Request::new(Method::GET, "/"), slow).await }
        });
        entered.wait().await;
        assert_eq!(limit.in_flight(), 1);

        let rejected = pipeline
            .run(Request::new(Method::GET, "/"), slow.clone())
            .await
            .unwrap();
        assert_eq!(rejected.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(rejected.header("retry-after"), Some("1"));
        assert_eq!(limit.in_flight(), 1);

        release.notify_one();
        let res = first.await.unwrap().unwrap();
        assert_eq!(res.body(), b"slow");
        assert_eq!(limit.in_flight(), 0);
    }
}
