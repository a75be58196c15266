use axum::http::HeaderValue;

use stockroom_infra::{ConfigError, LedgerConfig};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    pub ledger: LedgerConfig,
}

impl ServerConfig {
    /// | Env Var        | Default                 |
    /// |----------------|-------------------------|
    /// | `HOST`         | `0.0.0.0`               |
    /// | `PORT`         | `8000`                  |
    /// | `CORS_ORIGINS` | `http://localhost:5173` |
    ///
    /// Ledger settings are read by [`LedgerConfig::from_env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError {
                key: "PORT",
                message: format!("expected a port number, got '{raw}'"),
            })?,
            None => 8000,
        };

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for origin in &cors_origins {
            HeaderValue::from_str(origin).map_err(|e| ConfigError {
                key: "CORS_ORIGINS",
                message: format!("invalid origin '{origin}': {e}"),
            })?;
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            ledger: LedgerConfig::from_lookup(&lookup)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            cors_origins: vec!["http://localhost:5173".into()],
            ledger: LedgerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_environment_is_empty() {
        let cfg = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8000");
        assert_eq!(cfg.cors_origins, vec!["http://localhost:5173".to_string()]);
        assert_eq!(cfg.ledger, LedgerConfig::default());
    }

    #[test]
    fn splits_origins_and_rejects_bad_port() {
        let cfg = ServerConfig::from_lookup(|key| match key {
            "CORS_ORIGINS" => Some("http://a.test, http://b.test,".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.cors_origins.len(), 2);

        let err = ServerConfig::from_lookup(|key| (key == "PORT").then(|| "http".to_string())).unwrap_err();
        assert_eq!(err.key, "PORT");
    }
}
