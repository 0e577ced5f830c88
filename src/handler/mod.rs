//! Request handler module
//!
//! Holds the handler contract, the dispatcher that walks the route table,
//! and the stock adapters built on top of the contract: static files,
//! redirects and Basic-Auth.

pub mod auth;
pub mod redirect;
pub mod router;
pub mod static_files;

use std::fmt;
use std::sync::Arc;

use crate::http::{RenderError, Request, ResponseWriter};

// Re-export main entry point
pub use auth::{basic_auth_handler, AuthFunction, AUTH_USER_KEY};
pub use redirect::{permanent_redirect_handler, redirect_handler};
pub use router::{Outcome, Router};
pub use static_files::{directory_handler, file_handler};

/// What a handler returns. `Err` only ever signals a refused second
/// finalization; producing no output is `Ok(())`.
pub type HandlerResult = Result<(), RenderError>;

type HandlerFn = dyn Fn(&mut ResponseWriter, &Request) -> HandlerResult + Send + Sync;

/// A shareable handler function
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    pub fn call(&self, w: &mut ResponseWriter, r: &Request) -> HandlerResult {
        (self.0)(w, r)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(..)")
    }
}

/// Wrap a closure or function as a [`Handler`]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut ResponseWriter, &Request) -> HandlerResult + Send + Sync + 'static,
{
    Handler(Arc::new(f))
}
