//! Path pattern matching module
//!
//! Compiles registration strings such as `/users/:id/posts` into segment
//! specs and matches them against request paths split on `/`.
//!
//! Matching is a prefix match: a pattern never matches a path with fewer
//! segments, but happily matches a longer one. Route order therefore decides
//! which of several overlapping patterns wins.

use std::collections::HashMap;

/// Named parameters bound from the path
pub type Params = HashMap<String, String>;

/// A single compiled pattern segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the path segment exactly
    Literal(String),
    /// `:name` - matches any value; an empty name is never bound
    Param(String),
    /// Empty segment - matches anything
    Wildcard,
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if let Some(name) = raw.strip_prefix(':') {
            Self::Param(name.to_string())
        } else if raw.is_empty() {
            Self::Wildcard
        } else {
            Self::Literal(raw.to_string())
        }
    }

    fn accepts(&self, value: &str) -> bool {
        match self {
            Self::Literal(expected) => expected == value,
            Self::Param(_) | Self::Wildcard => true,
        }
    }
}

/// Result of extracting a matched pattern from a path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatch {
    pub params: Params,
    pub matched_prefix: String,
}

/// A path pattern compiled once at registration time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn compile(pattern: &str) -> Self {
        Self {
            raw: pattern.to_string(),
            segments: pattern.split('/').map(Segment::parse).collect(),
        }
    }

    /// The registration string this pattern was compiled from
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Check whether the pattern matches the given path segments
    pub fn matches<S: AsRef<str>>(&self, path_parts: &[S]) -> bool {
        if path_parts.len() < self.segments.len() {
            return false;
        }

        self.segments
            .iter()
            .zip(path_parts)
            .all(|(segment, part)| segment.accepts(part.as_ref()))
    }

    /// Extract parameter bindings and the consumed prefix.
    ///
    /// Only meaningful after `matches` returned true.
    pub fn extract<S: AsRef<str>>(&self, path_parts: &[S]) -> PathMatch {
        let mut params = Params::new();
        for (segment, part) in self.segments.iter().zip(path_parts) {
            let part = part.as_ref();
            if let Segment::Param(name) = segment {
                if !name.is_empty() && part.len() > 1 {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }

        // Trailing wildcards (a pattern ending in '/') do not consume a segment
        let trailing = self
            .segments
            .iter()
            .rev()
            .take_while(|s| **s == Segment::Wildcard)
            .count();
        let consumed = (self.segments.len() - trailing).min(path_parts.len());

        PathMatch {
            params,
            matched_prefix: path_parts[..consumed]
                .iter()
                .map(|part| part.as_ref())
                .collect::<Vec<&str>>()
                .join("/"),
        }
    }
}

/// Split a request path into its `/`-delimited segments
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> bool {
        PathPattern::compile(pattern).matches(&split_path(path))
    }

    #[test]
    fn test_compile_segments() {
        let pattern = PathPattern::compile("/users/:id/");
        assert_eq!(
            pattern.segments(),
            &[
                Segment::Wildcard,
                Segment::Literal("users".to_string()),
                Segment::Param("id".to_string()),
                Segment::Wildcard,
            ]
        );
        assert_eq!(pattern.as_str(), "/users/:id/");
    }

    #[test]
    fn test_literal_match() {
        assert!(matches("/path", "/path"));
        assert!(!matches("/path", "/badpath"));
        assert!(matches("/anotherpath/thats/long", "/anotherpath/thats/long"));
    }

    #[test]
    fn test_prefix_match() {
        assert!(matches("/path", "/path/extra"));
        assert!(matches("/path", "/path/extra/more"));
        assert!(!matches("/path/thats/long", "/path/thats"));
    }

    #[test]
    fn test_trailing_slash() {
        // trailing empty path segment matches a wildcard, never a literal
        assert!(matches("/dir/", "/dir/"));
        assert!(!matches("/dir/x", "/dir/"));
        assert!(matches("/dir/", "/dir/file.txt"));
        assert!(!matches("/dir/", "/dir"));
    }

    #[test]
    fn test_param_extraction() {
        let pattern = PathPattern::compile("/path/with/:name/something");
        let parts = split_path("/path/with/snakePlissken/something");
        assert!(pattern.matches(&parts));

        let matched = pattern.extract(&parts);
        assert_eq!(matched.params.get("name").map(String::as_str), Some("snakePlissken"));
        assert_eq!(matched.matched_prefix, "/path/with/snakePlissken/something");
    }

    #[test]
    fn test_param_edge_cases() {
        // bare ':' is never bound
        let pattern = PathPattern::compile("/a/:");
        let parts = split_path("/a/value");
        assert!(pattern.matches(&parts));
        assert!(pattern.extract(&parts).params.is_empty());

        // single-character values are not bound
        let pattern = PathPattern::compile("/a/:id");
        let parts = split_path("/a/7");
        assert!(pattern.matches(&parts));
        assert!(pattern.extract(&parts).params.is_empty());

        // params never reject by value, even when empty
        assert!(matches("/a/:id", "/a/"));
    }

    #[test]
    fn test_matched_prefix_skips_trailing_wildcard() {
        let pattern = PathPattern::compile("/static/");
        let parts = split_path("/static/css/site.css");
        assert!(pattern.matches(&parts));
        assert_eq!(pattern.extract(&parts).matched_prefix, "/static");

        let pattern = PathPattern::compile("/");
        let parts = split_path("/index.html");
        assert_eq!(pattern.extract(&parts).matched_prefix, "");
    }
}
