//! Static file serving module
//!
//! Directory and single-file handlers. A directory handler is meant to be
//! mounted under a pattern ending in `/`; it serves the request path with
//! the matched prefix stripped:
//!
//! ```
//! use route_chain::handler::{directory_handler, Router};
//!
//! let mut router = Router::new();
//! router.get("/assets/", [directory_handler("/tmp/static/files")]);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use hyper::body::Bytes;
use hyper::StatusCode;

use super::{handler, Handler, HandlerResult};
use crate::http::{escape_html, mime, Request, ResponseWriter};
use crate::logger;

const INDEX_FILE: &str = "index.html";

/// Serve the directory at the given path
pub fn directory_handler(dir: impl Into<PathBuf>) -> Handler {
    let root = dir.into();
    handler(move |w, r| serve_directory(w, r, &root))
}

/// Serve the given file
pub fn file_handler(path: impl Into<PathBuf>) -> Handler {
    let path = path.into();
    handler(move |w, _r| w.render_file(&path))
}

fn serve_directory(w: &mut ResponseWriter, r: &Request, root: &Path) -> HandlerResult {
    let relative = r.stripped_path();

    if relative.split('/').any(|segment| segment == "..") {
        logger::log_warning(&format!("Path traversal attempt blocked: {}", r.path()));
        return w.error(&format!("File not found: {}", r.path()), 404);
    }

    // Redirect targets reuse the raw, still-encoded path.
    // "/dir/index.html" is served as "/dir/"
    if let Some(dir) = r.uri().path().strip_suffix(INDEX_FILE) {
        if dir.ends_with('/') {
            return w.redirect_with_status(dir, StatusCode::MOVED_PERMANENTLY);
        }
    }

    let root_canonical = match root.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            return w.internal_error(&format!(
                "Static directory not found or inaccessible '{}': {e}",
                root.display()
            ));
        }
    };

    // File not found is common, no need to log at warning level
    let Ok(target) = root.join(relative.trim_start_matches('/')).canonicalize() else {
        return w.error(&format!("File not found: {}", r.path()), 404);
    };
    if !target.starts_with(&root_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            r.path(),
            target.display()
        ));
        return w.error(&format!("File not found: {}", r.path()), 404);
    }

    if target.is_dir() {
        if !relative.ends_with('/') {
            return w.redirect_with_status(&format!("{}/", r.uri().path()), StatusCode::MOVED_PERMANENTLY);
        }
        let index = target.join(INDEX_FILE);
        if index.is_file() {
            return serve_file(w, r, &index);
        }
        return render_listing(w, &target);
    }

    serve_file(w, r, &target)
}

/// Serve file contents with an `ETag`, answering 304 on a match
fn serve_file(w: &mut ResponseWriter, r: &Request, path: &Path) -> HandlerResult {
    let content = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) => return w.internal_error(&format!("Cannot read \"{}\": {e}", path.display())),
    };

    let etag = etag_for(&content);
    w.set_header("ETag", &etag);
    w.set_header("Content-Type", mime::content_type_for(path));

    if etag_matches(r.get_header("if-none-match"), &etag) {
        w.set_status(StatusCode::NOT_MODIFIED.as_u16());
        return w.render(Bytes::new());
    }

    w.render(content)
}

fn render_listing(w: &mut ResponseWriter, dir: &Path) -> HandlerResult {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            return w.internal_error(&format!("Cannot list \"{}\": {e}", dir.display()));
        }
    };

    let mut names: Vec<(String, bool)> = entries
        .filter_map(Result::ok)
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            (name, entry.path().is_dir())
        })
        .collect();
    names.sort();

    let mut html = String::from("<pre>\n");
    for (name, is_dir) in &names {
        let slash = if *is_dir { "/" } else { "" };
        let href = urlencoding::encode(name);
        let _ = writeln!(
            html,
            "<a href=\"{}{slash}\">{}{slash}</a>",
            escape_html(&href),
            escape_html(name)
        );
    }
    html.push_str("</pre>\n");

    w.set_header("Content-Type", mime::TEXT_HTML);
    w.render(html)
}

/// Quoted `ETag` from a hash of the content
fn etag_for(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}\"", hasher.finish())
}

/// Whether an `If-None-Match` header (single, list or `*`) matches
fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == etag || candidate == "*")
}
