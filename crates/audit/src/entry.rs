use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockroom_core::{DomainError, ItemId, LocationId, Movement};

/// What kind of mutation an entry records.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Add,
    Remove,
    Transfer,
    Scrap,
    Assemble,
    BomCreate,
    BomUpdate,
    BomDelete,
    ItemCreate,
    ItemUpdate,
    ItemDelete,
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        ActionKind::Add,
        ActionKind::Remove,
        ActionKind::Transfer,
        ActionKind::Scrap,
        ActionKind::Assemble,
        ActionKind::BomCreate,
        ActionKind::BomUpdate,
        ActionKind::BomDelete,
        ActionKind::ItemCreate,
        ActionKind::ItemUpdate,
        ActionKind::ItemDelete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Add => "add",
            ActionKind::Remove => "remove",
            ActionKind::Transfer => "transfer",
            ActionKind::Scrap => "scrap",
            ActionKind::Assemble => "assemble",
            ActionKind::BomCreate => "bom_create",
            ActionKind::BomUpdate => "bom_update",
            ActionKind::BomDelete => "bom_delete",
            ActionKind::ItemCreate => "item_create",
            ActionKind::ItemUpdate => "item_update",
            ActionKind::ItemDelete => "item_delete",
        }
    }
}

impl core::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ActionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ActionKind::ALL
            .into_iter()
            .find(|a| a.as_str() == wanted)
            .ok_or_else(|| DomainError::validation("action", format!("unknown action '{s}'")))
    }
}

/// An entry ready to be appended (no sequence id or timestamp yet).
///
/// Built inside a ledger transaction and handed to the journal at commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub action: ActionKind,
    pub item: Option<ItemId>,
    pub barcode: Option<String>,
    pub locations: Vec<LocationId>,
    /// Signed quantity change attributed to the subject item.
    pub amount: i64,
    /// Quantity of the subject item after the operation, at the affected
    /// location for single-location actions, otherwise across all locations.
    pub resulting_qty: Option<u64>,
    /// Exact placement changes; replaying these rebuilds stock.
    pub movements: Vec<Movement>,
    pub details: JsonValue,
    pub reason: Option<String>,
}

impl EntryDraft {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            item: None,
            barcode: None,
            locations: Vec::new(),
            amount: 0,
            resulting_qty: None,
            movements: Vec::new(),
            details: JsonValue::Null,
            reason: None,
        }
    }

    pub fn item(mut self, item: ItemId, barcode: Option<String>) -> Self {
        self.item = Some(item);
        self.barcode = barcode;
        self
    }

    pub fn locations(mut self, locations: impl IntoIterator<Item = LocationId>) -> Self {
        self.locations = locations.into_iter().collect();
        self
    }

    pub fn amount(mut self, amount: i64, resulting_qty: Option<u64>) -> Self {
        self.amount = amount;
        self.resulting_qty = resulting_qty;
        self
    }

    pub fn movements(mut self, movements: Vec<Movement>) -> Self {
        self.movements = movements;
        self
    }

    pub fn details(mut self, details: JsonValue) -> Self {
        self.details = details;
        self
    }

    pub fn reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

/// An immutable, committed audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Monotonically increasing, never reused.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub action: ActionKind,
    pub item: Option<ItemId>,
    pub barcode: Option<String>,
    pub locations: Vec<LocationId>,
    pub amount: i64,
    pub resulting_qty: Option<u64>,
    pub movements: Vec<Movement>,
    pub details: JsonValue,
    pub reason: Option<String>,
}

impl LedgerEntry {
    pub(crate) fn commit(draft: EntryDraft, sequence: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            sequence,
            timestamp,
            action: draft.action,
            item: draft.item,
            barcode: draft.barcode,
            locations: draft.locations,
            amount: draft.amount,
            resulting_qty: draft.resulting_qty,
            movements: draft.movements,
            details: draft.details,
            reason: draft.reason,
        }
    }

    /// Whether the entry concerns `item`, as subject or through any movement.
    pub fn touches(&self, item: ItemId) -> bool {
        self.item == Some(item) || self.movements.iter().any(|m| m.item == item)
    }

    /// Units permanently removed from circulation by this entry.
    pub fn scrapped(&self) -> u64 {
        if self.action != ActionKind::Scrap {
            return 0;
        }
        self.movements
            .iter()
            .filter(|m| m.delta < 0)
            .map(|m| m.delta.unsigned_abs())
            .sum()
    }
}
