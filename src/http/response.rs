//! Response writer
//!
//! Buffers status, headers and body for one request and enforces the
//! render-once contract: exactly one finalizing call (render, redirect,
//! error) may succeed per request. A second one is refused, leaves the
//! first response untouched and is recorded as a defect for the dispatcher.

use std::fmt;
use std::path::Path;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, LOCATION, WWW_AUTHENTICATE};
use hyper::{Method, Response, StatusCode};
use thiserror::Error;

use super::context::Context;
use super::mime;
use super::request::Request;
use crate::logger;

/// The kind of call that finalized a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalization {
    Render,
    Redirect,
    Error,
}

impl fmt::Display for Finalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Render => "render",
            Self::Redirect => "redirect",
            Self::Error => "error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RenderError {
    /// A handler tried to finalize a response that was already finalized
    #[error("response already finalized by {first}, refusing {attempted}")]
    AlreadyRendered {
        first: Finalization,
        attempted: Finalization,
    },
}

/// Render the fixed error page for a status code
pub fn error_page(code: u16) -> String {
    format!("<html><body><h1>HTTP {code} Error</h1></body></html>")
}

/// Per-request response sink passed to every handler in a chain
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    rendered: Option<Finalization>,
    defect: Option<RenderError>,
    context: Context,
    method: Method,
    host: String,
}

impl ResponseWriter {
    pub fn new(request: &Request) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            rendered: None,
            defect: None,
            context: Context::new(),
            method: request.method().clone(),
            host: request.host().to_string(),
        }
    }

    /// Set (replace) a response header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if self.is_rendered() {
            logger::log_warning(&format!("Ignoring header '{name}' set after the response was finalized"));
            return;
        }
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => logger::log_warning(&format!("Ignoring invalid header '{name}: {value}'")),
        }
    }

    /// Set the response code (200 by default)
    pub fn set_status(&mut self, code: u16) {
        if self.is_rendered() {
            logger::log_warning(&format!("Ignoring status {code} set after the response was finalized"));
            return;
        }
        match StatusCode::from_u16(code) {
            Ok(status) => self.status = status,
            Err(_) => logger::log_warning(&format!("Ignoring invalid status code {code}")),
        }
    }

    /// Render a body. Must be called at most once per request.
    ///
    /// If no Content-Type was set, one is guessed from the body.
    pub fn render(&mut self, body: impl Into<Bytes>) -> Result<(), RenderError> {
        self.guard(Finalization::Render)?;
        let body = body.into();
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static(mime::sniff_content_type(&body)),
            );
        }
        self.commit(body, Finalization::Render);
        Ok(())
    }

    /// Temporary redirect
    pub fn redirect(&mut self, path: &str) -> Result<(), RenderError> {
        self.redirect_with_status(path, StatusCode::TEMPORARY_REDIRECT)
    }

    /// Redirect with an explicit 3xx status
    pub fn redirect_with_status(&mut self, path: &str, status: StatusCode) -> Result<(), RenderError> {
        self.guard(Finalization::Redirect)?;
        let Ok(location) = HeaderValue::from_str(path) else {
            self.release_guard();
            return self.internal_error(&format!("Invalid redirect target: {path:?}"));
        };

        self.headers.insert(LOCATION, location);
        self.status = status;
        let body = if self.method == Method::GET || self.method == Method::HEAD {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(mime::TEXT_HTML));
            let reason = status.canonical_reason().unwrap_or("Redirect");
            Bytes::from(format!("<a href=\"{}\">{reason}</a>.\n", escape_html(path)))
        } else {
            Bytes::new()
        };
        self.commit(body, Finalization::Redirect);
        Ok(())
    }

    /// Render an error page and log the message. The message never reaches
    /// the client, only the status code does.
    pub fn error(&mut self, message: &str, code: u16) -> Result<(), RenderError> {
        self.guard(Finalization::Error)?;
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(mime::TEXT_HTML));
        self.status = status;
        self.commit(Bytes::from(error_page(status.as_u16())), Finalization::Error);
        logger::log_error(message);
        Ok(())
    }

    /// Render a 500 internal server error
    pub fn internal_error(&mut self, message: &str) -> Result<(), RenderError> {
        self.error(message, StatusCode::INTERNAL_SERVER_ERROR.as_u16())
    }

    /// Return a 401 and request a username / password
    pub fn unauthorized(&mut self) -> Result<(), RenderError> {
        if !self.is_rendered() {
            let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", self.host))
                .unwrap_or_else(|_| HeaderValue::from_static("Basic realm=\"\""));
            self.headers.insert(WWW_AUTHENTICATE, challenge);
        }
        self.error("Not Authorized", StatusCode::UNAUTHORIZED.as_u16())
    }

    /// Render a file from disk, or a 500 if it cannot be read
    pub fn render_file(&mut self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(contents) => {
                if !self.headers.contains_key(CONTENT_TYPE) && !self.is_rendered() {
                    self.headers.insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static(mime::content_type_for(path)),
                    );
                }
                self.render(contents)
            }
            Err(e) => self.internal_error(&format!("Cannot read \"{}\": {e}", path.display())),
        }
    }

    /// Whether a finalizing call has succeeded
    pub const fn is_rendered(&self) -> bool {
        self.rendered.is_some()
    }

    pub const fn finalized_by(&self) -> Option<Finalization> {
        self.rendered
    }

    /// Double-finalization recorded on this writer, if any
    pub const fn defect(&self) -> Option<RenderError> {
        self.defect
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as text, lossy for non UTF-8 bodies
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub const fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Convert into a hyper response
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }

    /// Replace whatever was buffered with an error page.
    ///
    /// Used by the dispatcher when a handler chain is aborted; bypasses the
    /// render-once guard.
    pub(crate) fn replace_with_error(&mut self, status: StatusCode) {
        self.headers.clear();
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(mime::TEXT_HTML));
        self.status = status;
        self.body = Bytes::from(error_page(status.as_u16()));
        self.rendered = Some(Finalization::Error);
    }

    fn guard(&mut self, attempted: Finalization) -> Result<(), RenderError> {
        let Some(first) = self.rendered else {
            // mark in-flight so nested calls cannot finalize underneath us
            self.rendered = Some(attempted);
            return Ok(());
        };

        let err = RenderError::AlreadyRendered { first, attempted };
        logger::log_error(&format!("Render / Redirect functions can only be called at most once: {err}"));
        self.defect.get_or_insert(err);
        Err(err)
    }

    fn release_guard(&mut self) {
        self.rendered = None;
    }

    fn commit(&mut self, body: Bytes, kind: Finalization) {
        self.body = body;
        self.rendered = Some(kind);
    }
}

/// Escape text for use in HTML bodies and attribute values
pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
