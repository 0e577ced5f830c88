//! HTTP wrapper layer
//!
//! Request and response wrappers handed to handlers, the inter-handler
//! context bag and Content-Type helpers. Everything on the wire is hyper's.

pub mod context;
pub mod mime;
pub mod request;
pub mod response;

pub use context::{Context, ContextValue};
pub use request::Request;
pub use response::{error_page, Finalization, RenderError, ResponseWriter};
pub(crate) use response::escape_html;
