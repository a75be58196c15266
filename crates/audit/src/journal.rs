//! Append-only journal of ledger entries.

use chrono::{DateTime, Utc};

use crate::entry::{EntryDraft, LedgerEntry};
use crate::query::{AuditFilter, AuditPage, Pagination, SortOrder};

/// In-memory, append-only sequence of committed entries.
///
/// There is no way to edit or remove an entry once appended. Sequence ids start
/// at 1 and increase by one per append. Timestamps never go backwards: an entry
/// stamped earlier than its predecessor (clock skew) takes the predecessor's
/// timestamp, so timestamp order and sequence order always agree.
#[derive(Debug, Default, Clone)]
pub struct Journal {
    entries: Vec<LedgerEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_sequence(&self) -> u64 {
        self.entries.last().map(|e| e.sequence).unwrap_or(0)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Append a draft, assigning the next sequence id.
    pub fn append(&mut self, draft: EntryDraft, now: DateTime<Utc>) -> &LedgerEntry {
        let timestamp = match self.entries.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        let entry = LedgerEntry::commit(draft, self.last_sequence() + 1, timestamp);
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn query(&self, filter: &AuditFilter, order: SortOrder, page: Pagination) -> AuditPage {
        let matching: Vec<&LedgerEntry> = self.entries.iter().filter(|e| filter.matches(e)).collect();
        let total = matching.len() as u64;

        let skip = page.offset as usize;
        let take = page.limit as usize;
        let entries: Vec<LedgerEntry> = match order {
            SortOrder::Asc => matching.into_iter().skip(skip).take(take).cloned().collect(),
            SortOrder::Desc => matching.into_iter().rev().skip(skip).take(take).cloned().collect(),
        };

        let has_more = (skip as u64).saturating_add(entries.len() as u64) < total;
        AuditPage {
            entries,
            total,
            pagination: page,
            has_more,
        }
    }
}
