// Configuration module entry point
// Loads settings from file + environment and turns declared routes into a router

mod types;

use std::net::SocketAddr;
use std::time::Duration;

pub use types::{
    BasicAuthConfig, Config, HttpConfig, LoggingConfig, PerformanceConfig, RouteConfig,
    RouteHandler, ServerConfig,
};

use crate::handler::{
    basic_auth_handler, directory_handler, file_handler, handler, permanent_redirect_handler,
    redirect_handler, Handler, Router,
};
use crate::server::{ServerError, ServerSettings};

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Environment variables prefixed `ROUTER_` override file values,
    /// e.g. `ROUTER_SERVER__PORT=9000`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        Self::build(
            config::Config::builder()
                .add_source(config::File::with_name(config_path).required(false))
                .add_source(
                    config::Environment::with_prefix("ROUTER")
                        .prefix_separator("_")
                        .separator("__"),
                ),
        )
    }

    /// Load configuration from TOML text
    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        Self::build(
            config::Config::builder()
                .add_source(config::File::from_str(toml, config::FileFormat::Toml)),
        )
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        let settings = builder
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.read_timeout", 10)?
            .set_default("performance.write_timeout", 10)?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.max_header_bytes", 1 << 20)? // 1MB
            .set_default("http.server_name", "route_chain")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .build()?;

        settings.try_deserialize()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse::<SocketAddr>()
            .map_err(|source| ServerError::InvalidAddress { addr, source })
    }

    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            read_timeout: Duration::from_secs(self.performance.read_timeout),
            write_timeout: Duration::from_secs(self.performance.write_timeout),
            keep_alive: self.performance.keep_alive,
            max_header_bytes: self.performance.max_header_bytes,
            max_body_size: self.http.max_body_size,
            max_connections: self.performance.max_connections,
            server_name: self.http.server_name.clone(),
            access_log: self.logging.access_log,
            access_log_format: self.logging.access_log_format.clone(),
        }
    }

    /// Check declared routes before anything is registered
    pub fn validate(&self) -> Result<(), ServerError> {
        for (index, route) in self.routes.iter().enumerate() {
            let reason = if route.method.is_empty()
                || !route.method.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
            {
                Some(format!("invalid method '{}'", route.method))
            } else if !route.pattern.starts_with('/') {
                Some(format!("pattern '{}' must start with '/'", route.pattern))
            } else {
                None
            };

            if let Some(reason) = reason {
                return Err(ServerError::InvalidRoute { index, reason });
            }
        }
        Ok(())
    }

    /// Register every declared route, in file order
    pub fn build_router(&self) -> Result<Router, ServerError> {
        self.validate()?;

        let mut router = Router::new();
        for route in &self.routes {
            let mut handlers = Vec::with_capacity(2);
            if let Some(auth) = &route.basic_auth {
                let BasicAuthConfig { username, password } = auth.clone();
                handlers.push(basic_auth_handler(move |user, pass| {
                    user == username && pass == password
                }));
            }
            handlers.push(route_handler(&route.handler));
            router.add_route(&route.method, &route.pattern, handlers);
        }
        Ok(router)
    }
}

fn route_handler(config: &RouteHandler) -> Handler {
    match config.clone() {
        RouteHandler::Dir { path } => directory_handler(path),
        RouteHandler::File { path } => file_handler(path),
        RouteHandler::Redirect { target } => redirect_handler(target),
        RouteHandler::PermanentRedirect { target } => permanent_redirect_handler(target),
        RouteHandler::Text {
            body,
            status,
            content_type,
        } => handler(move |w, _r| {
            if let Some(content_type) = &content_type {
                w.set_header("Content-Type", content_type);
            }
            w.set_status(status);
            w.render(body.clone())
        }),
    }
}
