use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use stockroom_core::validate::{optional_text, require_text};
use stockroom_core::{CategoryId, DomainError, DomainResult, Entity, ItemId};

/// Canonical part record.
///
/// Stock quantities are not stored here; they live in the ledger's placements.
/// `scrap_count` is only ever changed in the same commit as a scrap entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub part_id: String,
    pub name: String,
    pub category: Option<CategoryId>,
    pub barcode: Option<String>,
    pub cost: Decimal,
    pub description: Option<String>,
    pub supplier: Option<String>,
    pub lot_number: Option<String>,
    pub bin_numbers: Option<String>,
    pub production_stage: Option<String>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub file_url: Option<String>,
    /// Overrides the configured low-stock threshold for this item.
    pub low_stock_threshold: Option<u64>,
    pub scrap_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied item fields, used for both create and full update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub part_id: String,
    pub name: String,
    pub category: Option<CategoryId>,
    pub barcode: Option<String>,
    pub cost: Option<Decimal>,
    pub description: Option<String>,
    pub supplier: Option<String>,
    pub lot_number: Option<String>,
    pub bin_numbers: Option<String>,
    pub production_stage: Option<String>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub file_url: Option<String>,
    pub low_stock_threshold: Option<u64>,
}

/// Fields that never show up in an update diff.
const UNDIFFED: [&str; 5] = ["id", "part_id", "scrap_count", "created_at", "updated_at"];

impl Item {
    pub fn create(id: ItemId, draft: ItemDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        let mut item = Self {
            id,
            part_id: require_text("partId", &draft.part_id)?,
            name: String::new(),
            category: None,
            barcode: None,
            cost: Decimal::ZERO,
            description: None,
            supplier: None,
            lot_number: None,
            bin_numbers: None,
            production_stage: None,
            notes: None,
            image_url: None,
            file_url: None,
            low_stock_threshold: None,
            scrap_count: 0,
            created_at: now,
            updated_at: now,
        };
        item.assign(draft)?;
        Ok(item)
    }

    /// Replace the editable fields, returning the updated record.
    ///
    /// The part id is immutable: a draft naming a different one is rejected.
    pub fn updated(&self, draft: ItemDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        let part_id = draft.part_id.trim();
        if !part_id.is_empty() && part_id != self.part_id {
            return Err(DomainError::validation("partId", "part id cannot be changed"));
        }
        let mut next = self.clone();
        next.assign(draft)?;
        next.updated_at = now;
        Ok(next)
    }

    fn assign(&mut self, draft: ItemDraft) -> DomainResult<()> {
        let cost = draft.cost.unwrap_or(Decimal::ZERO);
        if cost.is_sign_negative() && !cost.is_zero() {
            return Err(DomainError::validation("cost", "cost cannot be negative"));
        }
        if draft.low_stock_threshold == Some(0) {
            return Err(DomainError::invalid_quantity(
                "low_stock_threshold",
                "must be greater than zero when set",
            ));
        }

        self.name = require_text("name", &draft.name)?;
        self.category = draft.category;
        self.barcode = optional_text(draft.barcode.as_deref());
        self.cost = cost;
        self.description = optional_text(draft.description.as_deref());
        self.supplier = optional_text(draft.supplier.as_deref());
        self.lot_number = optional_text(draft.lot_number.as_deref());
        self.bin_numbers = optional_text(draft.bin_numbers.as_deref());
        self.production_stage = optional_text(draft.production_stage.as_deref());
        self.notes = optional_text(draft.notes.as_deref());
        self.image_url = optional_text(draft.image_url.as_deref());
        self.file_url = optional_text(draft.file_url.as_deref());
        self.low_stock_threshold = draft.low_stock_threshold;
        Ok(())
    }

    /// Label used in log details and error messages: barcode, else part id.
    pub fn label(&self) -> &str {
        self.barcode.as_deref().unwrap_or(&self.part_id)
    }

    /// Field-level `[before, after]` pairs between two versions of an item.
    pub fn diff(&self, after: &Item) -> Map<String, JsonValue> {
        let before = to_fields(self);
        let after = to_fields(after);

        let mut changes = Map::new();
        for (field, old) in &before {
            if UNDIFFED.contains(&field.as_str()) {
                continue;
            }
            let new = after.get(field).cloned().unwrap_or(JsonValue::Null);
            if *old != new {
                changes.insert(field.clone(), JsonValue::Array(vec![old.clone(), new]));
            }
        }
        changes
    }
}

fn to_fields(item: &Item) -> Map<String, JsonValue> {
    match serde_json::to_value(item) {
        Ok(JsonValue::Object(map)) => map,
        _ => Map::new(),
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
