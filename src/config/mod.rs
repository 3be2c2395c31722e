// Configuration module entry point
// Loads the relay configuration once at startup and holds the shared state

mod state;
mod types;

use std::net::SocketAddr;

pub use state::AppState;
pub use types::{
    Config, HttpConfig, LoggingConfig, PerformanceConfig, RoutesConfig, ServerConfig,
    UpstreamConfig,
};

/// Upstream agent service address used when nothing else is configured
pub const DEFAULT_UPSTREAM_URL: &str = "http://localhost:3000";

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    ///
    /// Environment overrides use the `RELAY_` prefix with `__` between
    /// nested keys, e.g. `RELAY_UPSTREAM__BASE_URL`.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("upstream.base_url", DEFAULT_UPSTREAM_URL)?
            .set_default("logging.level", "debug")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.shutdown_timeout", 30)?
            .set_default(
                "http.user_agent",
                concat!("news-relay/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("http.enable_cors", false)?
            .set_default("http.max_body_size", 1_048_576)? // 1MB
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
pub(crate) fn test_config(base_url: &str) -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            workers: None,
        },
        upstream: UpstreamConfig {
            base_url: base_url.to_string(),
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            access_log: false,
            show_headers: false,
            access_log_format: "combined".to_string(),
            access_log_file: None,
            error_log_file: None,
        },
        performance: PerformanceConfig {
            keep_alive: true,
            read_timeout: 30,
            shutdown_timeout: 5,
            max_connections: None,
        },
        http: HttpConfig {
            user_agent: "news-relay-test".to_string(),
            enable_cors: false,
            max_body_size: 1024,
        },
        routes: RoutesConfig::default(),
    }
}
