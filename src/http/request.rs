//! Request wrapper
//!
//! Wraps the parts of a hyper request together with the routing state the
//! dispatcher fills in: path segments, bound URL parameters and the matched
//! prefix used by mounted sub-handlers.
//!
//! The path is percent-decoded once on construction; matching, parameter
//! binding and prefix stripping all see the decoded form.

use std::convert::Infallible;

use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, HOST};
use hyper::{Method, Uri};

use crate::routing::{split_path, Params, PathMatch};

/// Per-request view handed to every handler in a chain
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    path: String,
    path_parts: Vec<String>,
    url_params: Params,
    matched_prefix: String,
    multipart_values: Vec<(String, String)>,
}

impl Request {
    /// Build from a hyper request head and its collected body
    pub fn from_parts(parts: hyper::http::request::Parts, body: Bytes) -> Self {
        let path = decode_path(parts.uri.path());
        let path_parts = split_path(&path).into_iter().map(str::to_string).collect();

        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            path,
            path_parts,
            url_params: Params::new(),
            matched_prefix: String::new(),
            multipart_values: Vec::new(),
        }
    }

    /// Build a body-less request from a method and URL
    pub fn new(method: &str, url: &str) -> Result<Self, hyper::http::Error> {
        let (parts, ()) = hyper::Request::builder()
            .method(method)
            .uri(url)
            .body(())?
            .into_parts();
        Ok(Self::from_parts(parts, Bytes::new()))
    }

    /// Add a header; invalid names or values are ignored
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Parse a `multipart/form-data` body so its text fields are visible
    /// to [`Request::get_param`]. File parts are skipped. Other content
    /// types are left alone.
    pub async fn load_multipart_form(&mut self) -> Result<(), multer::Error> {
        if !self.accepts_form_body() {
            return Ok(());
        }
        let content_type = self.get_header(CONTENT_TYPE.as_str());
        if !content_type.starts_with("multipart/form-data") {
            return Ok(());
        }
        let boundary = multer::parse_boundary(content_type)?;

        let body = self.body.clone();
        let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut values = Vec::new();
        while let Some(field) = multipart.next_field().await? {
            if field.file_name().is_some() {
                continue;
            }
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            values.push((name, field.text().await?));
        }
        self.multipart_values = values;
        Ok(())
    }

    pub(crate) fn bind(&mut self, matched: PathMatch) {
        self.url_params = matched.params;
        self.matched_prefix = matched.matched_prefix;
    }

    /// Get a named parameter from the URL.
    ///
    /// For a handler added at `/a/:blah/portion`, a request for
    /// `/a/something/portion` yields `"something"` for `blah`.
    pub fn get_url_param(&self, name: &str) -> &str {
        self.url_params.get(name).map_or("", String::as_str)
    }

    /// Get a form or query value, falling back to `default` when it is
    /// missing or empty. Url-encoded body values win over the query string,
    /// which wins over multipart fields.
    pub fn get_param(&self, name: &str, default: &str) -> String {
        self.form_values()
            .into_iter()
            .chain(self.query_values())
            .chain(self.multipart_values.iter().cloned())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    /// Get a header value, empty if absent or not visible ASCII
    pub fn get_header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Percent-decoded request path
    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn path_parts(&self) -> &[String] {
        &self.path_parts
    }

    pub const fn url_params(&self) -> &Params {
        &self.url_params
    }

    pub fn matched_prefix(&self) -> &str {
        &self.matched_prefix
    }

    /// The request path with the matched prefix removed, always rooted at `/`
    pub fn stripped_path(&self) -> String {
        let rest = self
            .path()
            .strip_prefix(self.matched_prefix.as_str())
            .unwrap_or_else(|| self.path());
        if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{rest}")
        }
    }

    /// Host the request was addressed to, from the `Host` header or the URI
    pub fn host(&self) -> &str {
        match self.get_header(HOST.as_str()) {
            "" => self.uri.host().unwrap_or(""),
            host => host,
        }
    }

    fn query_values(&self) -> Vec<(String, String)> {
        self.uri
            .query()
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default()
    }

    fn accepts_form_body(&self) -> bool {
        matches!(self.method, Method::POST | Method::PUT | Method::PATCH)
    }

    fn form_values(&self) -> Vec<(String, String)> {
        let has_form_body = self.accepts_form_body()
            && self
                .get_header(CONTENT_TYPE.as_str())
                .starts_with("application/x-www-form-urlencoded");
        if !has_form_body {
            return Vec::new();
        }
        serde_urlencoded::from_bytes(&self.body).unwrap_or_default()
    }
}

/// Percent-decode a raw URI path; invalid UTF-8 is replaced, not rejected
fn decode_path(raw: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parts() {
        let req = Request::new("GET", "/a/b/?x=1").unwrap();
        assert_eq!(req.path(), "/a/b/");
        assert_eq!(req.path_parts(), &["", "a", "b", ""]);
    }

    #[test]
    fn test_path_is_percent_decoded() {
        let req = Request::new("GET", "/users/Jos%C3%A9/my%20file.txt?q=a%20b").unwrap();
        assert_eq!(req.path(), "/users/José/my file.txt");
        assert_eq!(req.path_parts(), &["", "users", "José", "my file.txt"]);
        assert_eq!(req.uri().path(), "/users/Jos%C3%A9/my%20file.txt");

        // '+' only means space in query strings
        let req = Request::new("GET", "/a+b").unwrap();
        assert_eq!(req.path(), "/a+b");
    }

    #[test]
    fn test_with_header_ignores_invalid_name() {
        let req = Request::new("GET", "/")
            .unwrap()
            .with_header("bad header", "x")
            .with_header("x-ok", "1");
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.get_header("x-ok"), "1");
    }

    #[tokio::test]
    async fn test_multipart_fields() {
        let body = "--XYZ\r\n\
Content-Disposition: form-data; name=\"title\"\r\n\r\n\
hello\r\n\
--XYZ\r\n\
Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
Content-Type: text/plain\r\n\r\n\
file body\r\n\
--XYZ--\r\n";
        let mut req = Request::new("POST", "/upload?title=from-query&page=2")
            .unwrap()
            .with_header("content-type", "multipart/form-data; boundary=XYZ")
            .with_body(body);
        req.load_multipart_form().await.unwrap();

        // query values come first, then multipart fields
        assert_eq!(req.get_param("title", ""), "from-query");
        assert_eq!(req.get_param("page", ""), "2");
        assert_eq!(req.get_param("upload", "none"), "none");

        let mut req = Request::new("POST", "/upload")
            .unwrap()
            .with_header("content-type", "multipart/form-data; boundary=XYZ")
            .with_body(body);
        req.load_multipart_form().await.unwrap();
        assert_eq!(req.get_param("title", ""), "hello");
    }

    #[tokio::test]
    async fn test_multipart_skipped_for_other_types() {
        let mut req = Request::new("POST", "/upload")
            .unwrap()
            .with_header("content-type", "text/plain")
            .with_body("--XYZ--");
        req.load_multipart_form().await.unwrap();
        assert_eq!(req.get_param("title", "none"), "none");

        let mut req = Request::new("POST", "/upload")
            .unwrap()
            .with_header("content-type", "multipart/form-data")
            .with_body("x");
        assert!(req.load_multipart_form().await.is_err());
    }

    #[test]
    fn test_url_params() {
        let mut req = Request::new("GET", "/users/alice").unwrap();
        let mut params = Params::new();
        params.insert("name".to_string(), "alice".to_string());
        req.bind(PathMatch {
            params,
            matched_prefix: "/users/alice".to_string(),
        });

        assert_eq!(req.get_url_param("name"), "alice");
        assert_eq!(req.get_url_param("missing"), "");
    }

    #[test]
    fn test_get_param_query() {
        let req = Request::new("GET", "/search?q=rust&page=&tag=a%20b").unwrap();
        assert_eq!(req.get_param("q", "none"), "rust");
        // explicitly empty is the same as absent
        assert_eq!(req.get_param("page", "1"), "1");
        assert_eq!(req.get_param("missing", "dflt"), "dflt");
        assert_eq!(req.get_param("tag", ""), "a b");
    }

    #[test]
    fn test_get_param_form_body_wins() {
        let req = Request::new("POST", "/submit?name=query")
            .unwrap()
            .with_header("content-type", "application/x-www-form-urlencoded")
            .with_body("name=form&other=1");
        assert_eq!(req.get_param("name", ""), "form");
        assert_eq!(req.get_param("other", ""), "1");

        // form bodies are ignored for GET
        let req = Request::new("GET", "/submit?name=query")
            .unwrap()
            .with_header("content-type", "application/x-www-form-urlencoded")
            .with_body("name=form");
        assert_eq!(req.get_param("name", ""), "query");
    }

    #[test]
    fn test_get_header() {
        let req = Request::new("GET", "/")
            .unwrap()
            .with_header("x-token", "abc");
        assert_eq!(req.get_header("X-Token"), "abc");
        assert_eq!(req.get_header("x-missing"), "");
    }

    #[test]
    fn test_host() {
        let req = Request::new("GET", "/").unwrap().with_header("host", "example.com:8080");
        assert_eq!(req.host(), "example.com:8080");

        let req = Request::new("GET", "http://fallback.test/x").unwrap();
        assert_eq!(req.host(), "fallback.test");
    }

    #[test]
    fn test_stripped_path() {
        let mut req = Request::new("GET", "/static/css/site.css").unwrap();
        req.bind(PathMatch {
            params: Params::new(),
            matched_prefix: "/static".to_string(),
        });
        assert_eq!(req.stripped_path(), "/css/site.css");

        req.bind(PathMatch::default());
        assert_eq!(req.stripped_path(), "/static/css/site.css");

        let mut req = Request::new("GET", "/static/my%20dir/a%23b.txt").unwrap();
        req.bind(PathMatch {
            params: Params::new(),
            matched_prefix: "/static".to_string(),
        });
        assert_eq!(req.stripped_path(), "/my dir/a#b.txt");
    }
}
