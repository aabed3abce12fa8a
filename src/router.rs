//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Every route owns a
//! [`Pipeline`] assembled once, at [`Router::build`], from middleware names:
//!
//! ```text
//! global  →  scopes (outer → inner)  →  route  →  bindings  →  handler
//! ```
//!
//! Names are resolved through the [`Registry`]; a stage named twice along
//! that path runs once, at its outermost position.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::binding::Bindings;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{BoxedStage, Outcome, Pipeline, Registry};
use crate::request::Request;
use crate::response::Response;

struct Route {
    method: Method,
    path: String,
    middleware: Vec<String>,
    handler: BoxedHandler,
}

/// The application router.
///
/// Each registration call returns `self` so definitions chain naturally.
/// Turn it into a servable [`App`] with [`Router::build`], or hand it to
/// [`Server::serve`](crate::Server::serve) which does that for you.
pub struct Router {
    registry: Registry,
    global: Vec<String>,
    scope: Vec<String>,
    routes: Vec<Route>,
    bindings: Bindings,
}

impl Router {
    pub fn new() -> Self {
        Self::with_registry(Registry::new())
    }

    /// A router whose middleware names resolve through `registry`.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            global: Vec::new(),
            scope: Vec::new(),
            routes: Vec::new(),
            bindings: Bindings::default(),
        }
    }

    /// Appends global middleware, outermost on every route and on the
    /// not-found fallback. Applies to routes registered before and after.
    pub fn middleware<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global.extend(names.into_iter().map(Into::into));
        self
    }

    /// Registers a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax, catch-alls `{*name}`:
    ///
    /// ```rust
    /// # use onion::{Method, Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.on_with(method, path, &[], handler)
    }

    /// Like [`on`](Router::on), with route-level middleware innermost.
    pub fn on_with(
        mut self,
        method: Method,
        path: &str,
        middleware: &[&str],
        handler: impl Handler,
    ) -> Self {
        let mut names = self.scope.clone();
        names.extend(middleware.iter().map(|s| (*s).to_owned()));
        self.routes.push(Route {
            method,
            path: path.to_owned(),
            middleware: names,
            handler: handler.into_boxed_handler(),
        });
        self
    }

    /// Applies `middleware` to every route registered inside `routes`.
    ///
    /// ```rust
    /// # use onion::{Method, Request, Response, Router};
    /// # async fn me(_: Request) -> Response { Response::text("") }
    /// # async fn admin(_: Request) -> Response { Response::text("") }
    /// Router::new().scope(&["auth"], |r| {
    ///     r.on(Method::GET, "/me", me)
    ///      .scope(&["admin"], |r| r.on(Method::GET, "/admin", admin))
    /// });
    /// ```
    pub fn scope<F>(mut self, middleware: &[&str], routes: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        let depth = self.scope.len();
        self.scope.extend(middleware.iter().map(|s| (*s).to_owned()));
        let mut router = routes(self);
        router.scope.truncate(depth);
        router
    }

    /// Resolves `{param}` on matching routes with `resolver` before the
    /// handler runs. Read the value back with [`Request::bound`].
    ///
    /// ```rust
    /// # use onion::{Method, Request, Response, Router};
    /// #[derive(Clone)]
    /// struct User { name: String }
    ///
    /// async fn show(req: Request) -> Response {
    ///     let user = req.bound::<User>("user").expect("bound before handler");
    ///     Response::text(user.name.clone())
    /// }
    ///
    /// Router::new()
    ///     .bind("user", |raw: String| async move {
    ///         (raw == "1").then(|| User { name: "alice".into() })
    ///     })
    ///     .on(Method::GET, "/users/{user}", show);
    /// ```
    pub fn bind<F, Fut, T>(mut self, param: &str, resolver: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.bindings.insert(param, resolver);
        self
    }

    /// Resolves every middleware name and builds the routing trees.
    pub fn build(self) -> Result<App, Error> {
        let failures = Arc::new(AtomicU64::new(0));
        let mut routes: HashMap<Method, MatchitRouter<Endpoint>> = HashMap::new();

        for route in self.routes {
            let names: Vec<&str> = self
                .global
                .iter()
                .chain(&route.middleware)
                .map(String::as_str)
                .collect();
            let mut stages = self.registry.resolve(names.as_slice())?;
            if let Some(substitute) = self.bindings.for_path(&route.path) {
                stages.push(Arc::new(substitute) as BoxedStage);
            }

            let endpoint = Endpoint {
                pipeline: Pipeline::with_counter(stages, Arc::clone(&failures)),
                handler: route.handler,
            };
            routes
                .entry(route.method)
                .or_default()
                .insert(route.path.as_str(), endpoint)
                .map_err(|source| Error::Route { path: route.path.clone(), source })?;
        }

        let global = self.registry.resolve(self.global.as_slice())?;
        let fallback = Endpoint {
            pipeline: Pipeline::with_counter(global, Arc::clone(&failures)),
            handler: not_found.into_boxed_handler(),
        };

        Ok(App { routes, fallback, failures })
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

async fn not_found(_req: Request) -> Response {
    Response::status(StatusCode::NOT_FOUND)
}

struct Endpoint {
    pipeline: Pipeline,
    handler: BoxedHandler,
}

/// A built router: routes with their resolved pipelines.
pub struct App {
    routes: HashMap<Method, MatchitRouter<Endpoint>>,
    fallback: Endpoint,
    failures: Arc<AtomicU64>,
}

impl App {
    /// Routes one request and runs it through its route's pipeline.
    ///
    /// Unmatched requests run through the global middleware around a
    /// `404 Not Found` handler.
    pub async fn dispatch(&self, mut req: Request) -> Outcome {
        let matched = self
            .routes
            .get(req.method())
            .and_then(|tree| tree.at(req.path()).ok())
            .map(|m| {
                let params: HashMap<String, String> =
                    m.params.iter().map(|(k, v)| (k.to_owned(), v.to_owned())).collect();
                (m.value, params)
            });

        let endpoint = match matched {
            Some((endpoint, params)) => {
                req.head.params = params;
                endpoint
            }
            None => &self.fallback,
        };
        endpoint.pipeline.dispatch(req, Arc::clone(&endpoint.handler)).await
    }

    /// Terminate-hook failures across every route since the app was built.
    pub fn terminate_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Stage names in the order they wrap the handler for `method` + `path`.
    pub fn stages_for(&self, method: &Method, path: &str) -> Option<Vec<&'static str>> {
        let tree = self.routes.get(method)?;
        Some(tree.at(path).ok()?.value.pipeline.names())
    }
}
