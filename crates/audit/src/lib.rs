//! Audit log: append-only ledger entries and read-only queries.
//!
//! Entries are facts. They are appended once, inside the same commit as the
//! stock mutation they describe, and never changed afterwards.

pub mod entry;
pub mod journal;
pub mod query;

pub use entry::{ActionKind, EntryDraft, LedgerEntry};
pub use journal::Journal;
pub use query::{AuditFilter, AuditPage, Pagination, SortOrder};
