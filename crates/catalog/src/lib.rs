//! Catalog records: items (parts), locations and categories.
//!
//! Validation of individual records lives here; uniqueness across records is
//! enforced by the store that owns them.

pub mod category;
pub mod item;
pub mod location;

pub use category::{Category, CategoryDraft};
pub use item::{Item, ItemDraft};
pub use location::{Location, LocationDraft};
