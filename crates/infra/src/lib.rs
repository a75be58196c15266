//! Infrastructure layer: shared state, locking, configuration and the ledger service.
//!
//! Domain crates decide; this crate owns every piece of mutable state and the
//! rules for committing to it atomically.

pub mod bom_engine;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod store;
pub mod views;


pub use bom_engine::BomWrite;
pub use config::{ConfigError, LedgerConfig};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{AssembleRequest, StockLedger};
pub use locks::{KeyLocks, LockKey, LockSet};
pub use views::{BomLineView, BomView, PlacementView, ReplayReport, StockFilter, StockView};
