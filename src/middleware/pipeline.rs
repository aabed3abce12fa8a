//! Ordered middleware pipeline.
//!
//! A [`Pipeline`] is assembled once at startup and shared by every request.
//! Running it walks one request through these phases:
//!
//! ```text
//! NotStarted → Running(0) → … → Running(n-1) → Terminal
//!            → Unwinding(n-1) → … → Unwinding(0) → terminate hooks → Completed
//! ```
//!
//! A short-circuit at stage `k` skips straight to `Unwinding(k)`. Terminate
//! hooks always run, whatever path the request took.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use super::{BoxedStage, Chain, Next, Outcome, Stage};
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::request::{Head, HeadSlot, Request};

/// An immutable, ordered list of stages.
///
/// Cloning is cheap and clones share the stage list and the terminate-hook
/// failure counter.
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[BoxedStage]>,
    failures: Arc<AtomicU64>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::from_stages(Vec::new())
    }

    pub fn from_stages(stages: Vec<BoxedStage>) -> Self {
        Self::with_counter(stages, Arc::new(AtomicU64::new(0)))
    }

    pub(crate) fn with_counter(stages: Vec<BoxedStage>, failures: Arc<AtomicU64>) -> Self {
        Self { stages: stages.into(), failures }
    }

    /// Appends a stage; it wraps everything added after it.
    pub fn stage(self, stage: impl Stage) -> Self {
        let mut stages = self.stages.to_vec();
        stages.push(Arc::new(stage));
        Self::with_counter(stages, self.failures)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize { self.stages.len() }
    pub fn is_empty(&self) -> bool { self.stages.is_empty() }

    /// How many terminate hooks have failed since this pipeline was built.
    pub fn terminate_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Runs `req` through every stage and into `terminal`, then runs the
    /// terminate hooks.
    pub async fn run<H: Handler>(&self, req: Request, terminal: H) -> Outcome {
        self.dispatch(req, terminal.into_boxed_handler()).await
    }

    pub(crate) async fn dispatch(&self, mut req: Request, terminal: BoxedHandler) -> Outcome {
        let slot = HeadSlot::default();
        let (method, path) = (req.method().clone(), req.path().to_owned());
        let outer = req.slot.replace(slot.clone());

        let chain = Arc::new(Chain::new(Arc::clone(&self.stages), terminal));
        let outcome = Next::start(chain).run(req).await;

        let head = slot.take().unwrap_or_else(|| {
            debug!(%method, %path, "request outlived its chain");
            Head::bare(method, path)
        });
        self.terminate(&head, &outcome).await;
        debug!(stages = self.stages.len(), ok = outcome.is_ok(), "pipeline completed");

        // Run from inside another pipeline's chain: the head goes back out.
        if let Some(outer) = outer {
            outer.put(head);
        }
        outcome
    }

    async fn terminate(&self, head: &Head, outcome: &Outcome) {
        for stage in self.stages.iter() {
            let Some(hook) = stage.terminate(head, outcome) else { continue };
            if let Err(source) = hook.await {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let err = Error::TerminateHook { stage: stage.name(), source };
                warn!(path = head.path(), error = %err, "terminate hook failed");
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::middleware::from_fn;
    use crate::response::Response;

    #[test]
    fn stage_appends_in_order() {
        let pipeline = Pipeline::new()
            .stage(from_fn("a", |req, next| next.run(req)))
            .stage(from_fn("b", |req, next| next.run(req)));
        assert_eq!(pipeline.names(), ["a", "b"]);
        assert_eq!(pipeline.len(), 2);
    }

    #[tokio::test]
    async fn clones_share_failure_counter() {
        let pipeline = Pipeline::new().stage(
            from_fn("flaky", |req, next| next.run(req))
                .on_terminate(|_, _| Err("flush failed".into())),
        );
        let clone = pipeline.clone();
        let res = clone
            .run(Request::new(Method::GET, "/"), |_req: Request| async { Response::text("ok") })
            .await
            .unwrap();
        assert_eq!(res.body(), b"ok");
        assert_eq!(pipeline.terminate_failures(), 1);
    }
}
