//! Redirect handlers

use hyper::StatusCode;

use super::{handler, Handler};

/// Temporarily redirect (307) to the given url
pub fn redirect_handler(url: impl Into<String>) -> Handler {
    redirect_with(url.into(), StatusCode::TEMPORARY_REDIRECT)
}

/// Permanently redirect (301) to the given url
pub fn permanent_redirect_handler(url: impl Into<String>) -> Handler {
    redirect_with(url.into(), StatusCode::MOVED_PERMANENTLY)
}

fn redirect_with(url: String, status: StatusCode) -> Handler {
    handler(move |w, _r| w.redirect_with_status(&url, status))
}
