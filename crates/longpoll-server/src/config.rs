//! Server configuration.

use std::time::Duration;

/// Configuration for the HTTP listener.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind; `0` picks a free port.
    pub port: u16,
    /// How long shutdown waits for in-flight requests before giving up.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
