//! Ordered-route HTTP dispatcher.
//!
//! Requests are matched against routes in registration order; the first
//! route whose method and path pattern match runs its handler chain until
//! one handler finalizes the response.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod routing;
pub mod server;
