// Server module entry point
// Accept loop, per-connection serving and graceful shutdown

mod connection;
mod error;
pub mod listener;
pub mod signal;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;

pub use connection::handle_request;
pub use error::ServerError;
pub use listener::create_reusable_listener;

use crate::config::Config;
use crate::handler::Router;
use crate::logger;

/// Runtime knobs for serving connections
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Time allowed to receive request headers
    pub read_timeout: Duration,
    /// Time allowed for the handler chain; zero disables the limit
    pub write_timeout: Duration,
    pub keep_alive: bool,
    pub max_header_bytes: usize,
    pub max_body_size: u64,
    pub max_connections: Option<usize>,
    /// Value of the `Server` header; empty to omit it
    pub server_name: String,
    pub access_log: bool,
    pub access_log_format: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            keep_alive: true,
            max_header_bytes: 1 << 20,
            max_body_size: 10 << 20,
            max_connections: None,
            server_name: "route_chain".to_string(),
            access_log: true,
            access_log_format: "combined".to_string(),
        }
    }
}

/// Bind the configured address and serve until SIGINT/SIGTERM
pub async fn run(config: &Config, router: Router) -> Result<(), ServerError> {
    let addr = config.socket_addr()?;
    let listener = create_reusable_listener(addr)?;

    logger::log_server_start(&addr, config, router.routes().len());
    router.log_routes();

    serve(
        listener,
        Arc::new(router),
        config.server_settings(),
        signal::shutdown_signal(),
    )
    .await
}

/// Accept connections until `shutdown` resolves, then give in-flight
/// connections up to `write_timeout` to finish.
pub async fn serve<F>(
    listener: TcpListener,
    router: Arc<Router>,
    settings: ServerSettings,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()>,
{
    let settings = Arc::new(settings);
    let active_connections = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            () = &mut shutdown => break,

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => connection::accept_connection(
                        stream,
                        peer_addr,
                        &router,
                        &settings,
                        &active_connections,
                    ),
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }
        }
    }

    drop(listener);
    logger::log_shutdown(active_connections.load(Ordering::SeqCst));
    drain(&active_connections, settings.write_timeout).await;
    Ok(())
}

async fn drain(active_connections: &AtomicUsize, grace: Duration) {
    let deadline = Instant::now() + grace;
    while active_connections.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    fn test_router() -> Router {
        let mut router = Router::new();
        router.get("/hello/:name", [handler(|w, r| {
            w.render(format!("hello {}", r.get_url_param("name")))
        })]);
        router.post("/echo", [handler(|w, r| w.render(r.body().clone()))]);
        router.get("/panic", [handler(|_w, _r| panic!("handler blew up"))]);
        router.get("/slow", [handler(|w, _r| {
            std::thread::sleep(Duration::from_millis(600));
            w.render("late")
        })]);
        router
    }

    async fn start(settings: ServerSettings) -> (std::net::SocketAddr, oneshot::Sender<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(serve(listener, Arc::new(test_router()), settings, async move {
            let _ = rx.await;
        }));
        (addr, tx)
    }

    async fn roundtrip(addr: std::net::SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        // a refused connection may already be closed
        let _ = stream.write_all(raw.as_bytes()).await;
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        // a reset after the response still counts as the end of it
        while let Ok(n) = stream.read(&mut chunk).await {
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn quiet() -> ServerSettings {
        ServerSettings {
            access_log: false,
            ..ServerSettings::default()
        }
    }

    #[tokio::test]
    async fn test_serves_routes_end_to_end() {
        let (addr, shutdown) = start(quiet()).await;

        let response = roundtrip(
            addr,
            "GET /hello/world HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("server: route_chain"));
        assert!(response.ends_with("hello world"));

        let response = roundtrip(
            addr,
            "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4\r\nConnection: close\r\n\r\nping",
        )
        .await;
        assert!(response.ends_with("ping"));

        let response = roundtrip(
            addr,
            "GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 404"));
        assert!(response.contains("HTTP 404 Error"));

        shutdown.send(()).unwrap();
    }

    #[tokio::test]
    async fn test_panicking_handler_is_500() {
        let (addr, shutdown) = start(quiet()).await;

        let response = roundtrip(
            addr,
            "GET /panic HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 500"));

        // the server keeps serving
        let response = roundtrip(
            addr,
            "GET /hello/again HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.ends_with("hello again"));

        shutdown.send(()).unwrap();
    }

    #[tokio::test]
    async fn test_body_limit() {
        let (addr, shutdown) = start(ServerSettings {
            max_body_size: 8,
            ..quiet()
        })
        .await;

        let response = roundtrip(
            addr,
            "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 16\r\nConnection: close\r\n\r\n0123456789abcdef",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 413"));

        shutdown.send(()).unwrap();
    }

    #[tokio::test]
    async fn test_connection_limit_drops_connection() {
        let (addr, shutdown) = start(ServerSettings {
            max_connections: Some(0),
            ..quiet()
        })
        .await;

        let response = roundtrip(
            addr,
            "GET /hello/world HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.is_empty(), "unexpected response: {response}");

        shutdown.send(()).unwrap();
    }

    #[tokio::test]
    async fn test_slow_handler_times_out() {
        let (addr, shutdown) = start(ServerSettings {
            write_timeout: Duration::from_millis(150),
            ..quiet()
        })
        .await;

        let response = roundtrip(
            addr,
            "GET /slow HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 503"), "got: {response}");
        assert!(!response.contains("late"));

        shutdown.send(()).unwrap();
    }

    #[tokio::test]
    async fn test_percent_encoded_param_end_to_end() {
        let (addr, shutdown) = start(quiet()).await;

        let response = roundtrip(
            addr,
            "GET /hello/snake%20Plissken HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.ends_with("hello snake Plissken"), "got: {response}");

        shutdown.send(()).unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, Arc::new(test_router()), quiet(), async move {
            let _ = rx.await;
        }));

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), server).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
