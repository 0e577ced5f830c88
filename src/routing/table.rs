//! Route table module
//!
//! Append-only, insertion-ordered list of routes. Lookup is a linear scan
//! returning the first entry whose method and pattern match; registration
//! order, not pattern specificity, decides between overlapping routes.

use super::matcher::PathPattern;

/// A registered (method, pattern, handler chain) triple
#[derive(Debug, Clone)]
pub struct RouteEntry<H> {
    method: String,
    pattern: PathPattern,
    handlers: Vec<H>,
}

impl<H> RouteEntry<H> {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub const fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn handlers(&self) -> &[H] {
        &self.handlers
    }
}

/// Ordered route table
#[derive(Debug, Clone)]
pub struct RouteTable<H> {
    entries: Vec<RouteEntry<H>>,
}

impl<H> RouteTable<H> {
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append a route, compiling its pattern once
    pub fn add(&mut self, method: &str, pattern: &str, handlers: Vec<H>) {
        self.entries.push(RouteEntry {
            method: method.to_string(),
            pattern: PathPattern::compile(pattern),
            handlers,
        });
    }

    /// Find the first entry matching method and path segments
    pub fn resolve<S: AsRef<str>>(&self, method: &str, path_parts: &[S]) -> Option<&RouteEntry<H>> {
        self.entries
            .iter()
            .find(|entry| entry.method == method && entry.pattern.matches(path_parts))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry<H>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self::new()
    }
}
