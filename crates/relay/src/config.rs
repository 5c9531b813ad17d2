// Relay server configuration.
//
// Centralizes environment variable parsing with defaults for local
// development.

use std::net::SocketAddr;

use crate::ws::MAX_FRAME_BYTES;

const DEFAULT_PORT: u16 = 5000;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Core relay server configuration.
///
/// Constructed via [`RelayConfig::from_env`] which reads environment
/// variables and falls back to development defaults.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// Comma-separated CORS origins (or `"*"` for any).
    pub cors_origins: Option<String>,
    /// Log filter directive (e.g. `info`, `consult_relay=debug`).
    pub log_filter: String,
    pub log_format: LogFormat,
    /// Largest accepted inbound WebSocket frame.
    pub max_frame_bytes: usize,
}

impl RelayConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `CONSULT_RELAY_HOST` | `0.0.0.0` |
    /// | `CONSULT_RELAY_PORT` (then `PORT`) | `5000` |
    /// | `CONSULT_RELAY_CORS_ORIGINS` | *(unset: mirror request origin)* |
    /// | `CONSULT_RELAY_LOG_FILTER` | `info` |
    /// | `CONSULT_RELAY_LOG_FORMAT` | `text` |
    /// | `CONSULT_RELAY_MAX_FRAME_BYTES` | `262144` |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    pub(crate) fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = env("CONSULT_RELAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env("CONSULT_RELAY_PORT")
            .or_else(|_| env("PORT"))
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let cors_origins =
            env("CONSULT_RELAY_CORS_ORIGINS").ok().filter(|value| !value.trim().is_empty());

        let log_filter = env("CONSULT_RELAY_LOG_FILTER").unwrap_or_else(|_| "info".into());
        let log_format = match env("CONSULT_RELAY_LOG_FORMAT").as_deref().map(str::trim) {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let max_frame_bytes = env("CONSULT_RELAY_MAX_FRAME_BYTES")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|bytes| *bytes > 0)
            .unwrap_or(MAX_FRAME_BYTES);

        Self { listen_addr, cors_origins, log_filter, log_format, max_frame_bytes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from_map(
        map: HashMap<&'static str, &'static str>,
    ) -> impl Fn(&str) -> Result<String, std::env::VarError> {
        move |key: &str| {
            map.get(key).map(|v| v.to_string()).ok_or(std::env::VarError::NotPresent)
        }
    }

    #[test]
    fn defaults_when_no_env_vars() {
        let cfg = RelayConfig::from_env_fn(env_from_map(HashMap::new()));
        assert_eq!(cfg.listen_addr.port(), 5000);
        assert_eq!(cfg.listen_addr.ip().to_string(), "0.0.0.0");
        assert!(cfg.cors_origins.is_none());
        assert_eq!(cfg.log_filter, "info");
        assert_eq!(cfg.log_format, LogFormat::Text);
        assert_eq!(cfg.max_frame_bytes, 262_144);
    }

    #[test]
    fn custom_host_and_port() {
        let mut m = HashMap::new();
        m.insert("CONSULT_RELAY_HOST", "127.0.0.1");
        m.insert("CONSULT_RELAY_PORT", "3000");
        let cfg = RelayConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.listen_addr.to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn platform_port_is_used_as_fallback() {
        let mut m = HashMap::new();
        m.insert("PORT", "8081");
        let cfg = RelayConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.listen_addr.port(), 8081);
    }

    #[test]
    fn relay_port_wins_over_platform_port() {
        let mut m = HashMap::new();
        m.insert("PORT", "8081");
        m.insert("CONSULT_RELAY_PORT", "9090");
        let cfg = RelayConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.listen_addr.port(), 9090);
    }

    #[test]
    fn invalid_port_uses_default() {
        let mut m = HashMap::new();
        m.insert("CONSULT_RELAY_PORT", "not_a_number");
        let cfg = RelayConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.listen_addr.port(), 5000);
    }

    #[test]
    fn invalid_host_falls_back_to_unspecified_address() {
        let mut m = HashMap::new();
        m.insert("CONSULT_RELAY_HOST", "not a host");
        m.insert("CONSULT_RELAY_PORT", "7000");
        let cfg = RelayConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.listen_addr.to_string(), "0.0.0.0:7000");
    }

    #[test]
    fn cors_origins_from_env() {
        let mut m = HashMap::new();
        m.insert("CONSULT_RELAY_CORS_ORIGINS", "https://app.consult.dev");
        let cfg = RelayConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.cors_origins.as_deref(), Some("https://app.consult.dev"));
    }

    #[test]
    fn blank_cors_origins_are_ignored() {
        let mut m = HashMap::new();
        m.insert("CONSULT_RELAY_CORS_ORIGINS", "  ");
        let cfg = RelayConfig::from_env_fn(env_from_map(m));
        assert!(cfg.cors_origins.is_none());
    }

    #[test]
    fn log_filter_and_format_override() {
        let mut m = HashMap::new();
        m.insert("CONSULT_RELAY_LOG_FILTER", "debug,tower_http=trace");
        m.insert("CONSULT_RELAY_LOG_FORMAT", "JSON");
        let cfg = RelayConfig::from_env_fn(env_from_map(m));
        assert_eq!(cfg.log_filter, "debug,tower_http=trace");
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn max_frame_bytes_override_and_fallback() {
        let mut m = HashMap::new();
        m.insert("CONSULT_RELAY_MAX_FRAME_BYTES", "65536");
        assert_eq!(RelayConfig::from_env_fn(env_from_map(m)).max_frame_bytes, 65_536);

        let mut m = HashMap::new();
        m.insert("CONSULT_RELAY_MAX_FRAME_BYTES", "0");
        assert_eq!(RelayConfig::from_env_fn(env_from_map(m)).max_frame_bytes, 262_144);
    }
}
