//! Stock rules: placements, movements, bills of materials and status.
//!
//! Pure decision logic (no IO, no locking, no storage). The infra crate feeds
//! it snapshots and commits the movements it returns.

pub mod bom;
pub mod book;
pub mod command;
pub mod status;

pub use bom::Bom;
pub use book::{consumed_by_component, StockBook};
pub use command::{Assembly, DrawSource, StockCommand};
pub use status::StockStatus;
