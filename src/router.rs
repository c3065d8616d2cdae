//! Radix-tree request router.
//!
//! One tree, keyed by path. O(path-length) lookup. Methods are not part of
//! the key: every registered path answers any method.

use std::sync::Arc;

use http::StatusCode;
use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, BoxedHandler, Handler, Service};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup and hand it to [`Server::serve`](crate::Server::serve),
/// usually wrapped in [`RequestLog`](crate::middleware::RequestLog).
/// Each registration returns `self` so calls chain naturally.
pub struct Router {
    routes: MatchitRouter<BoxedHandler>,
    fallback: Option<BoxedHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: MatchitRouter::new(), fallback: None }
    }

    /// Register a handler for an exact path. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if `path` is malformed or conflicts with an existing route.
    pub fn route(mut self, path: &str, handler: impl Handler) -> Self {
        self.routes
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Handler for every path no route matches. Without one, unmatched
    /// paths get an empty `404`.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = Some(handler.into_boxed_handler());
        self
    }

    fn lookup(&self, path: &str) -> Option<BoxedHandler> {
        self.routes.at(path).ok().map(|matched| Arc::clone(matched.value))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl Service for Router {
    fn call(&self, req: Request) -> BoxFuture {
        match self.lookup(req.path()) {
            Some(handler) => handler.call(req),
            None => match &self.fallback {
                Some(handler) => handler.call(req),
                None => Box::pin(async { Response::status(StatusCode::NOT_FOUND) }),
            },
        }
    }
}
