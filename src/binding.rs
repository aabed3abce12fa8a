//! Explicit route-parameter binding.
//!
//! A resolver is registered per parameter name with
//! [`Router::bind`](crate::Router::bind). Every route whose path names a
//! bound parameter gets a [`Substitute`] stage as its innermost stage; it
//! resolves the raw parameter and stores the value for
//! [`Request::bound`](crate::Request::bound), or answers `404 Not Found`
//! when the resolver finds nothing.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use http::StatusCode;
use tracing::debug;

use crate::middleware::{BoxFuture, Next, Outcome, Stage};
use crate::request::Request;
use crate::response::Response;

type Bound = Arc<dyn Any + Send + Sync>;
type Resolver = Arc<dyn Fn(String) -> BoxFuture<'static, Option<Bound>> + Send + Sync>;

/// Resolvers in registration order, which is also the order they run in.
#[derive(Clone, Default)]
pub(crate) struct Bindings {
    resolvers: Vec<(String, Resolver)>,
}

impl Bindings {
    pub(crate) fn insert<F, Fut, T>(&mut self, param: &str, resolver: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let erased: Resolver = Arc::new(move |raw: String| -> BoxFuture<'static, Option<Bound>> {
            let fut = resolver(raw);
            Box::pin(async move { fut.await.map(|v| Arc::new(v) as Bound) })
        });
        match self.resolvers.iter_mut().find(|(name, _)| name == param) {
            Some((_, existing)) => *existing = erased,
            None => self.resolvers.push((param.to_owned(), erased)),
        }
    }

    /// The resolvers whose parameter appears in `path`, in registration order.
    pub(crate) fn for_path(&self, path: &str) -> Option<Substitute> {
        let resolvers: Vec<_> = self
            .resolvers
            .iter()
            .filter(|(name, _)| {
                path.contains(&format!("{{{name}}}")) || path.contains(&format!("{{*{name}}}"))
            })
            .map(|(name, r)| (name.clone(), Arc::clone(r)))
            .collect();
        (!resolvers.is_empty()).then_some(Substitute { resolvers })
    }
}

pub(crate) struct Substitute {
    resolvers: Vec<(String, Resolver)>,
}

impl Stage for Substitute {
    fn name(&self) -> &'static str {
        "bindings"
    }

    fn handle<'a>(&'a self, mut req: Request, next: Next) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            for (name, resolve) in &self.resolvers {
                let Some(raw) = req.param(name).map(str::to_owned) else { continue };
                match resolve(raw).await {
                    Some(value) => {
                        req.head.bound.insert(name.clone(), value);
                    }
                    None => {
                        debug!(param = %name, path = req.path(), "binding resolved nothing");
                        return Ok(Response::status(StatusCode::NOT_FOUND));
                    }
                }
            }
            next.run(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> Bindings {
        let mut b = Bindings::default();
        b.insert("user", |raw: String| async move { raw.parse::<u32>().ok() });
        b.insert("path", |raw: String| async move { Some(raw) });
        b
    }

    #[test]
    fn applies_only_to_paths_naming_the_param() {
        let b = bindings();
        assert!(b.for_path("/users/{user}").is_some());
        assert!(b.for_path("/files/{*path}").is_some());
        assert!(b.for_path("/users/{id}").is_none());
        assert!(b.for_path("/users").is_none());
    }

    #[test]
    fn substitute_carries_matching_resolvers_only() {
        let sub = bindings().for_path("/users/{user}/files/{id}").unwrap();
        assert_eq!(sub.resolvers.len(), 1);
        assert_eq!(sub.resolvers[0].0, "user");
    }

    #[test]
    fn resolvers_keep_registration_order() {
        let mut b = Bindings::default();
        for name in ["team", "user", "file", "org"] {
            b.insert(name, |raw: String| async move { Some(raw) });
        }
        let sub = b.for_path("/{org}/{team}/{user}/{*file}").unwrap();
        let names: Vec<_> = sub.resolvers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["team", "user", "file", "org"]);
    }

    #[test]
    fn rebinding_replaces_in_place() {
        let mut b = bindings();
        b.insert("user", |raw: String| async move { Some(raw.len()) });
        let names: Vec<_> = b.resolvers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["user", "path"]);
    }

    #[tokio::test]
    async fn first_miss_in_registration_order_short_circuits() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        use http::Method;

        use crate::middleware::Pipeline;

        let calls = Arc::new(AtomicUsize::new(0));
        let mut b = Bindings::default();
        b.insert("team", |_raw: String| async move { None::<u32> });
        let counted = Arc::clone(&calls);
        b.insert("user", move |_raw: String| {
            counted.fetch_add(1, Ordering::SeqCst);
            async move { Some(1_u32) }
        });

        let sub = b.for_path("/{team}/{user}").unwrap();
        let mut req = Request::new(Method::GET, "/a/b");
        req.head.params = [("team", "a"), ("user", "b")]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();

        let res = Pipeline::new()
            .stage(sub)
            .run(req, |_req: Request| async { "unreachable" })
            .await
            .unwrap();

        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
