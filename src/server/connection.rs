// Connection handling module
// Accepts a TCP connection, serves it over HTTP/1 and runs each request
// through the router on the blocking pool.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body as _, Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE, REFERER, SERVER, USER_AGENT};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Response, StatusCode, Version};
use hyper_util::rt::{TokioIo, TokioTimer};

use super::ServerSettings;
use crate::handler::Router;
use crate::http::{error_page, mime, Request};
use crate::logger::{self, AccessLogEntry};

/// Smallest read buffer hyper accepts
const MIN_BUF_SIZE: usize = 8192;

/// Accept a connection, enforcing the connection limit.
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    router: &Arc<Router>,
    settings: &Arc<ServerSettings>,
    conn_counter: &Arc<AtomicUsize>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = settings.max_connections {
        if prev_count >= max_conn {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(router),
        Arc::clone(settings),
        Arc::clone(conn_counter),
    );
}

/// Serve one connection in a spawned task, decrementing the counter when done.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    router: Arc<Router>,
    settings: Arc<ServerSettings>,
    conn_counter: Arc<AtomicUsize>,
) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(settings.read_timeout)
            .keep_alive(settings.keep_alive)
            .max_buf_size(settings.max_header_bytes.max(MIN_BUF_SIZE));

        let service_settings = Arc::clone(&settings);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                let router = Arc::clone(&router);
                let settings = Arc::clone(&service_settings);
                async move {
                    Ok::<_, Infallible>(handle_request(req, router, &settings, peer_addr).await)
                }
            }),
        );

        if let Err(err) = conn.await {
            logger::log_connection_error(&err);
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Read the body, dispatch and write the access log line.
pub async fn handle_request(
    req: hyper::Request<Incoming>,
    router: Arc<Router>,
    settings: &ServerSettings,
    peer_addr: SocketAddr,
) -> Response<Full<Bytes>> {
    let start = Instant::now();
    let (parts, body) = req.into_parts();

    let entry = settings.access_log.then(|| {
        let mut entry = AccessLogEntry::new(
            peer_addr.to_string(),
            parts.method.to_string(),
            parts.uri.path().to_string(),
        );
        entry.query = parts.uri.query().map(str::to_string);
        entry.http_version = http_version(parts.version).to_string();
        entry.referer = header_string(&parts.headers, REFERER);
        entry.user_agent = header_string(&parts.headers, USER_AGENT);
        entry
    });

    let mut response = match read_body(body, settings.max_body_size).await {
        Ok(bytes) => {
            let mut request = Request::from_parts(parts, bytes);
            match request.load_multipart_form().await {
                Ok(()) => dispatch(router, request, settings).await,
                Err(e) => {
                    logger::log_warning(&format!("Malformed multipart body: {e}"));
                    error_response(StatusCode::BAD_REQUEST)
                }
            }
        }
        Err(status) => error_response(status),
    };

    if !settings.server_name.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&settings.server_name) {
            response.headers_mut().entry(SERVER).or_insert(value);
        }
    }

    if let Some(mut entry) = entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &settings.access_log_format);
    }

    response
}

/// Collect the body, refusing anything over `max_body_size`
async fn read_body(body: Incoming, max_body_size: u64) -> Result<Bytes, StatusCode> {
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_warning(&format!("Request body exceeds {max_body_size} bytes"));
            Err(StatusCode::PAYLOAD_TOO_LARGE)
        }
        Err(err) => {
            logger::log_warning(&format!("Failed to read request body: {err}"));
            Err(StatusCode::BAD_REQUEST)
        }
    }
}

/// Handlers are synchronous, so the chain runs on the blocking pool.
async fn dispatch(
    router: Arc<Router>,
    request: Request,
    settings: &ServerSettings,
) -> Response<Full<Bytes>> {
    let method = request.method().clone();
    let path = request.path().to_string();
    let task = tokio::task::spawn_blocking(move || router.handle(request).into_response());

    let joined = if settings.write_timeout.is_zero() {
        task.await
    } else {
        match tokio::time::timeout(settings.write_timeout, task).await {
            Ok(joined) => joined,
            Err(_) => {
                logger::log_warning(&format!(
                    "{method} {path} did not finish within {:?}",
                    settings.write_timeout
                ));
                return error_response(StatusCode::SERVICE_UNAVAILABLE);
            }
        }
    };

    match joined {
        Ok(response) => response,
        Err(err) => {
            logger::log_error(&format!("Handler for {method} {path} failed: {err}"));
            error_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn error_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(error_page(status.as_u16()))));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(mime::TEXT_HTML));
    response
}

fn header_string(headers: &hyper::HeaderMap, name: hyper::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

const fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2.0",
        Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}
