//! Ledger configuration loaded from the environment.

use std::time::Duration;

use thiserror::Error;

use stockroom_core::LocationId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid value for {key}: {message}")]
pub struct ConfigError {
    pub key: &'static str,
    pub message: String,
}

/// Tunables of the stock ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Totals strictly below this are `Low Stock` unless the item overrides it.
    pub low_stock_threshold: u64,
    /// Upper bound on waiting for a lock before failing with `Busy`.
    pub lock_timeout: Duration,
    /// Location used by scan-driven adjustments that name none.
    pub scan_location: Option<LocationId>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: 5,
            lock_timeout: Duration::from_millis(2000),
            scan_location: None,
        }
    }
}

impl LedgerConfig {
    /// | Env Var               | Default |
    /// |-----------------------|---------|
    /// | `LOW_STOCK_THRESHOLD` | `5`     |
    /// | `LOCK_TIMEOUT_MS`     | `2000`  |
    /// | `SCAN_LOCATION_ID`    | unset   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LedgerConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let low_stock_threshold = match lookup("LOW_STOCK_THRESHOLD") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError {
                        key: "LOW_STOCK_THRESHOLD",
                        message: format!("expected a positive integer, got '{raw}'"),
                    });
                }
            },
            None => defaults.low_stock_threshold,
        };

        let lock_timeout = match lookup("LOCK_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError {
                    key: "LOCK_TIMEOUT_MS",
                    message: format!("expected milliseconds, got '{raw}'"),
                })?,
            None => defaults.lock_timeout,
        };

        let scan_location = match lookup("SCAN_LOCATION_ID") {
            Some(raw) if !raw.trim().is_empty() => {
                Some(raw.trim().parse::<LocationId>().map_err(|e| ConfigError {
                    key: "SCAN_LOCATION_ID",
                    message: e.to_string(),
                })?)
            }
            _ => None,
        };

        Ok(Self {
            low_stock_threshold,
            lock_timeout,
            scan_location,
        })
    }
}
