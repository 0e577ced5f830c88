//! Request routing dispatch module
//!
//! Entry point for every request: resolves the route, binds path
//! parameters and runs the handler chain until one of the handlers
//! finalizes the response.
//!
//! Terminal states:
//! - no route matched: 404 error page
//! - a handler rendered: done, remaining handlers are skipped
//! - chain exhausted without output: 500 error page
//! - a handler finalized twice: chain aborted, 500 error page

use hyper::StatusCode;

use super::{Handler, HandlerResult};
use crate::http::{RenderError, Request, ResponseWriter};
use crate::logger;
use crate::routing::RouteTable;

/// How a dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A handler finalized the response
    Rendered,
    /// No route matched method and path
    NoRoute,
    /// Every handler ran and none produced output
    Unrendered,
    /// A handler tried to finalize an already finalized response
    Aborted(RenderError),
}

/// Route registration surface and dispatcher
#[derive(Debug, Default)]
pub struct Router {
    routes: RouteTable<Handler>,
}

impl Router {
    pub const fn new() -> Self {
        Self {
            routes: RouteTable::new(),
        }
    }

    /// Add a route for any method, including custom ones:
    ///
    /// ```
    /// use route_chain::handler::{handler, Router};
    ///
    /// let mut router = Router::new();
    /// router.add_route("XGET", "/some/path", [handler(|w, _r| w.render("ok"))]);
    /// assert_eq!(router.routes().len(), 1);
    /// ```
    pub fn add_route(&mut self, method: &str, pattern: &str, handlers: impl IntoIterator<Item = Handler>) {
        self.routes.add(method, pattern, handlers.into_iter().collect());
    }

    pub fn get(&mut self, pattern: &str, handlers: impl IntoIterator<Item = Handler>) {
        self.add_route("GET", pattern, handlers);
    }

    pub fn post(&mut self, pattern: &str, handlers: impl IntoIterator<Item = Handler>) {
        self.add_route("POST", pattern, handlers);
    }

    pub fn put(&mut self, pattern: &str, handlers: impl IntoIterator<Item = Handler>) {
        self.add_route("PUT", pattern, handlers);
    }

    pub fn delete(&mut self, pattern: &str, handlers: impl IntoIterator<Item = Handler>) {
        self.add_route("DELETE", pattern, handlers);
    }

    pub const fn routes(&self) -> &RouteTable<Handler> {
        &self.routes
    }

    /// Dispatch a request and hand back the finalized response
    pub fn handle(&self, mut request: Request) -> ResponseWriter {
        let mut w = ResponseWriter::new(&request);
        self.dispatch(&mut request, &mut w);
        w
    }

    /// Run the routing state machine against a fresh writer
    pub fn dispatch(&self, request: &mut Request, w: &mut ResponseWriter) -> Outcome {
        logger::log_info(&format!("Handling request for {}", request.path()));

        let Some(route) = self
            .routes
            .resolve(request.method().as_str(), request.path_parts())
        else {
            let result = w.error(&format!("File not found: {}", request.uri()), 404);
            return finish(w, result, Outcome::NoRoute);
        };

        let matched = route.pattern().extract(request.path_parts());
        request.bind(matched);

        for (index, handler) in route.handlers().iter().enumerate() {
            let result = handler.call(w, request);
            if let Some(defect) = w.defect().or_else(|| result.err()) {
                logger::log_error(&format!(
                    "Aborting {} {}: handler #{index} of route '{}' broke the render-once contract: {defect}",
                    request.method(),
                    request.path(),
                    route.pattern().as_str(),
                ));
                w.replace_with_error(StatusCode::INTERNAL_SERVER_ERROR);
                return Outcome::Aborted(defect);
            }
            if w.is_rendered() {
                return Outcome::Rendered;
            }
        }

        let result = w.internal_error("Render never called");
        finish(w, result, Outcome::Unrendered)
    }

    /// Log the registered routes in order
    pub fn log_routes(&self) {
        for entry in self.routes.iter() {
            logger::log_info(&format!(
                "[Route] {:<7} {} ({} handlers)",
                entry.method(),
                entry.pattern().as_str(),
                entry.handlers().len()
            ));
        }
    }
}

// Fallback error pages are written to a writer no handler has touched, so
// they cannot collide with an earlier finalization.
fn finish(w: &mut ResponseWriter, result: HandlerResult, outcome: Outcome) -> Outcome {
    match result {
        Ok(()) => outcome,
        Err(defect) => {
            w.replace_with_error(StatusCode::INTERNAL_SERVER_ERROR);
            Outcome::Aborted(defect)
        }
    }
}

#[cfg(test)]
impl Router {
    /// Dispatch a body-less request, for tests
    pub(crate) fn fake_request(&self, method: &str, url: &str) -> ResponseWriter {
        self.handle(Request::new(method, url).unwrap())
    }
}
