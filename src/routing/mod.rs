//! Routing module
//!
//! Provides the ordered route table and the path pattern matcher:
//! - Literal, `:param` and empty (wildcard) segments
//! - Prefix matching on segment count
//! - First-match lookup in registration order

mod matcher;
mod table;

pub use matcher::{split_path, Params, PathMatch, PathPattern, Segment};
pub use table::{RouteEntry, RouteTable};
