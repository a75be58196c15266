use std::sync::Arc;

use stockroom_infra::{LedgerError, LedgerResult, StockLedger};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppServices {
    ledger: Arc<StockLedger>,
}

impl AppServices {
    pub fn new(ledger: Arc<StockLedger>) -> Self {
        Self { ledger }
    }

    /// Run a ledger call on the blocking pool.
    ///
    /// Ledger operations may wait on row locks, so they never run on the
    /// async executor threads.
    pub async fn run<T, F>(&self, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&StockLedger) -> LedgerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        match tokio::task::spawn_blocking(move || f(&ledger)).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "ledger task failed");
                Err(LedgerError::Store(format!("ledger task failed: {e}")))
            }
        }
    }
}
