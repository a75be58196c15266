//! Catalog mutations: items (with their placements), locations and categories.
//!
//! Item changes that move stock are recorded as movements in an
//! `item_create` / `item_update` / `item_delete` entry, so replaying the journal
//! still reproduces every placement.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value as JsonValue};

use stockroom_audit::{ActionKind, EntryDraft, LedgerEntry};
use stockroom_catalog::{Category, CategoryDraft, Item, ItemDraft, Location, LocationDraft};
use stockroom_core::{Aggregate, CategoryId, DomainError, ItemId, LocationId, Movement, PlacementKey, Quantity};
use stockroom_inventory::{StockBook, StockCommand};

use crate::error::LedgerResult;
use crate::ledger::{log_outcome, StockLedger};
use crate::locks::LockKey;
use crate::store::StoreState;
use crate::views::StockView;

impl StockLedger {
    // ---------------------------------------------------------------------
    // Items
    // ---------------------------------------------------------------------

    /// Register a new item, optionally with opening quantities per location.
    pub fn create_item(
        &self,
        draft: ItemDraft,
        opening: BTreeMap<LocationId, u64>,
    ) -> LedgerResult<StockView> {
        let id = ItemId::new();

        let entry = self.transact_in_place("create_item", |state, now| {
            let record = Item::create(id, draft, now)?;
            ensure_unique_item(state, &record)?;
            ensure_category(state, record.category)?;

            let mut placements = Map::new();
            let mut movements = Vec::new();
            for (location, qty) in &opening {
                let place = state.location(*location)?;
                placements.insert(place.name.clone(), json!(qty));
                if *qty > 0 {
                    movements.push(Movement::new(PlacementKey::new(id, *location), to_delta(*qty)?));
                }
            }
            state.check_movements(&movements, Some(id))?;

            let total = opening
                .values()
                .try_fold(0u64, |sum, qty| sum.checked_add(*qty))
                .filter(|total| *total <= Quantity::MAX)
                .ok_or_else(|| DomainError::invalid_quantity("locations", "total exceeds the quantity ceiling"))?;
            let draft = EntryDraft::new(ActionKind::ItemCreate)
                .item(id, record.barcode.clone())
                .locations(opening.keys().copied())
                .amount(to_delta(total)?, Some(total))
                .movements(movements)
                .details(json!({
                    "part_id": record.part_id,
                    "name": record.name,
                    "placements": placements,
                }));

            state.items.insert(record);
            for location in opening.keys() {
                state.placements.entry(PlacementKey::new(id, *location)).or_insert(0);
            }
            Ok(state.apply(draft, now))
        });
        log_outcome("create_item", entry)?;
        self.stock(id)
    }

    /// Replace an item's editable fields and, when given, set exact quantities
    /// at the listed locations. Locations not listed keep their quantity.
    pub fn update_item(
        &self,
        id: ItemId,
        draft: ItemDraft,
        levels: Option<BTreeMap<LocationId, u64>>,
    ) -> LedgerResult<StockView> {
        let levels: BTreeMap<PlacementKey, u64> = levels
            .unwrap_or_default()
            .into_iter()
            .map(|(location, qty)| (PlacementKey::new(id, location), qty))
            .collect();
        let keys = std::iter::once(LockKey::Item(id))
            .chain(levels.keys().map(|k| LockKey::Placement(*k)));
        let _held = self.lock(keys)?;

        let committed = self.transact_in_place("update_item", |state, now| {
            let current = state.item(id)?.clone();
            let next = current.updated(draft, now)?;
            ensure_unique_item(state, &next)?;
            ensure_category(state, next.category)?;
            for key in levels.keys() {
                state.location(key.location)?;
            }

            let book = state.snapshot(levels.keys().copied());
            let movements = book.handle(&StockCommand::SetLevels {
                levels: levels.clone(),
            })?;
            let mut changes = current.diff(&next);
            if changes.is_empty() && movements.is_empty() {
                return Ok(None);
            }

            if !movements.is_empty() {
                let quantities: Map<String, JsonValue> = movements
                    .iter()
                    .map(|m| {
                        let old = book.quantity(&m.key());
                        let new = old.saturating_add_signed(m.delta);
                        (location_name(state, m.location), json!([old, new]))
                    })
                    .collect();
                changes.insert("quantities".to_string(), JsonValue::Object(quantities));
            }
            state.check_movements(&movements, None)?;

            let before_total = state.item_total(id);
            let net: i128 = movements.iter().map(|m| i128::from(m.delta)).sum();
            let net = i64::try_from(net)
                .map_err(|_| DomainError::invalid_quantity("locations", "net change out of range"))?;
            let draft = EntryDraft::new(ActionKind::ItemUpdate)
                .item(id, next.barcode.clone())
                .locations(movements.iter().map(|m| m.location))
                .amount(net, Some(before_total.saturating_add_signed(net)))
                .movements(movements)
                .details(JsonValue::Object(changes));

            state.items.insert(next);
            Ok(Some(state.apply(draft, now)))
        })?;

        if let Some(entry) = committed {
            log_outcome("update_item", Ok(entry))?;
        }
        self.stock(id)
    }

    /// Remove an item and all of its placements.
    ///
    /// Items used by any bill of materials (as product or component) cannot be
    /// deleted.
    pub fn delete_item(&self, id: ItemId) -> LedgerResult<LedgerEntry> {
        let rows: Vec<PlacementKey> = {
            let state = self.read()?;
            state
                .placements_of(id)
                .map(|(location, _)| PlacementKey::new(id, location))
                .collect()
        };
        let keys = std::iter::once(LockKey::Item(id)).chain(rows.iter().map(|k| LockKey::Placement(*k)));
        let _held = self.lock(keys)?;

        let entry = self.transact_in_place("delete_item", |state, now| {
            let record = state.item(id)?.clone();
            if let Some(bom) = state.boms.values().find(|b| b.product() == id || b.uses(id)) {
                return Err(DomainError::conflict(format!(
                    "item {} is referenced by the bill of materials of {}",
                    record.label(),
                    state.label(bom.product())
                ))
                .into());
            }

            let current: Vec<(PlacementKey, u64)> = state
                .placements_of(id)
                .map(|(location, qty)| (PlacementKey::new(id, location), qty))
                .collect();
            let book = StockBook::with_levels(current.iter().copied());
            let movements = book.handle(&StockCommand::Clear {
                keys: current.iter().map(|(k, _)| *k).collect(),
            })?;
            let placements: Map<String, JsonValue> = current
                .iter()
                .map(|(k, qty)| (location_name(state, k.location), json!(qty)))
                .collect();
            let total = current.iter().fold(0u64, |sum, (_, qty)| sum.saturating_add(*qty));

            let draft = EntryDraft::new(ActionKind::ItemDelete)
                .item(id, record.barcode.clone())
                .locations(current.iter().map(|(k, _)| k.location))
                .amount(-to_delta(total)?, Some(0))
                .movements(movements)
                .details(json!({
                    "part_id": record.part_id,
                    "name": record.name,
                    "placements": placements,
                }));
            state.check_movements(&draft.movements, None)?;

            let entry = state.apply(draft, now);
            state.items.remove(id);
            state.placements.retain(|k, _| k.item != id);
            Ok(entry)
        });
        log_outcome("delete_item", entry)
    }

    // ---------------------------------------------------------------------
    // Locations
    // ---------------------------------------------------------------------

    pub fn locations(&self) -> LedgerResult<Vec<Location>> {
        Ok(self.read()?.locations.values().cloned().collect())
    }

    pub fn location(&self, id: LocationId) -> LedgerResult<Location> {
        Ok(self.read()?.location(id)?.clone())
    }

    pub fn create_location(&self, draft: LocationDraft) -> LedgerResult<Location> {
        let location = Location::create(LocationId::new(), draft)?;
        self.transact_in_place("create_location", |state, _| {
            ensure_unique_location(state, &location)?;
            state.locations.insert(location.clone());
            tracing::info!(location_id = %location.id, name = %location.name, "location created");
            Ok(location)
        })
    }

    pub fn update_location(&self, id: LocationId, draft: LocationDraft) -> LedgerResult<Location> {
        let location = Location::create(id, draft)?;
        self.transact_in_place("update_location", |state, _| {
            state.location(id)?;
            ensure_unique_location(state, &location)?;
            state.locations.insert(location.clone());
            tracing::info!(location_id = %id, "location updated");
            Ok(location)
        })
    }

    /// Remove a location that holds no stock. Its empty placement rows go with it.
    pub fn delete_location(&self, id: LocationId) -> LedgerResult<Location> {
        self.transact_in_place("delete_location", |state, _| {
            let location = state.location(id)?.clone();
            let held: u64 = state
                .placements
                .iter()
                .filter(|(k, _)| k.location == id)
                .fold(0u64, |sum, (_, q)| sum.saturating_add(*q));
            if held > 0 {
                return Err(DomainError::conflict(format!(
                    "location {} still holds {held} units",
                    location.name
                ))
                .into());
            }
            state.placements.retain(|k, _| k.location != id);
            state.locations.remove(id);
            tracing::info!(location_id = %id, "location deleted");
            Ok(location)
        })
    }

    // ---------------------------------------------------------------------
    // Categories
    // ---------------------------------------------------------------------

    pub fn categories(&self) -> LedgerResult<Vec<Category>> {
        Ok(self.read()?.categories.values().cloned().collect())
    }

    pub fn create_category(&self, draft: CategoryDraft) -> LedgerResult<Category> {
        let category = Category::create(CategoryId::new(), draft)?;
        self.transact_in_place("create_category", |state, _| {
            ensure_unique_category(state, &category)?;
            state.categories.insert(category.clone());
            tracing::info!(category_id = %category.id, name = %category.name, "category created");
            Ok(category)
        })
    }

    pub fn update_category(&self, id: CategoryId, draft: CategoryDraft) -> LedgerResult<Category> {
        let category = Category::create(id, draft)?;
        self.transact_in_place("update_category", |state, _| {
            ensure_category(state, Some(id))?;
            ensure_unique_category(state, &category)?;
            state.categories.insert(category.clone());
            Ok(category)
        })
    }

    /// Remove a category and clear it from every item filed under it.
    pub fn delete_category(&self, id: CategoryId) -> LedgerResult<Category> {
        self.transact_in_place("delete_category", |state, now| {
            ensure_category(state, Some(id))?;
            let mut cleared = 0usize;
            for item in state.items.values_mut().filter(|i| i.category == Some(id)) {
                item.category = None;
                item.updated_at = now;
                cleared += 1;
            }
            tracing::info!(category_id = %id, items_cleared = cleared, "category deleted");
            state
                .categories
                .remove(id)
                .ok_or_else(|| DomainError::UnknownCategory(id.to_string()).into())
        })
    }
}

fn ensure_unique_item(state: &StoreState, item: &Item) -> Result<(), DomainError> {
    if state
        .items
        .find(|other| other.id != item.id && other.part_id == item.part_id)
        .is_some()
    {
        return Err(DomainError::conflict(format!("part id {} is already in use", item.part_id)));
    }
    if let Some(barcode) = &item.barcode {
        if state
            .items
            .find(|other| other.id != item.id && other.barcode.as_ref() == Some(barcode))
            .is_some()
        {
            return Err(DomainError::conflict(format!("barcode {barcode} is already in use")));
        }
    }
    Ok(())
}

fn ensure_unique_location(state: &StoreState, location: &Location) -> Result<(), DomainError> {
    match state
        .locations
        .find(|other| other.id != location.id && other.has_name(&location.name))
    {
        Some(_) => Err(DomainError::conflict(format!(
            "a location named {} already exists",
            location.name
        ))),
        None => Ok(()),
    }
}

fn ensure_unique_category(state: &StoreState, category: &Category) -> Result<(), DomainError> {
    match state
        .categories
        .find(|other| other.id != category.id && other.has_name(&category.name))
    {
        Some(_) => Err(DomainError::conflict(format!(
            "a category named {} already exists",
            category.name
        ))),
        None => Ok(()),
    }
}

fn ensure_category(state: &StoreState, category: Option<CategoryId>) -> Result<(), DomainError> {
    match category {
        Some(id) if !state.categories.contains(id) => Err(DomainError::UnknownCategory(id.to_string())),
        _ => Ok(()),
    }
}

fn location_name(state: &StoreState, id: LocationId) -> String {
    state
        .locations
        .get(id)
        .map(|l| l.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn to_delta(qty: u64) -> Result<i64, DomainError> {
    i64::try_from(qty).map_err(|_| DomainError::invalid_quantity("quantity", "is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::error::LedgerError;
    use stockroom_audit::{AuditFilter, Pagination, SortOrder};

    fn ledger() -> (StockLedger, LocationId, LocationId) {
        let ledger = StockLedger::new(LedgerConfig::default());
        let a = ledger
            .create_location(LocationDraft {
                name: "Shelf A".into(),
                ..Default::default()
            })
            .unwrap();
        let b = ledger
            .create_location(LocationDraft {
                name: "Shelf B".into(),
                ..Default::default()
            })
            .unwrap();
        (ledger, a.id, b.id)
    }

    fn draft(part_id: &str) -> ItemDraft {
        ItemDraft {
            part_id: part_id.into(),
            name: format!("Part {part_id}"),
            barcode: Some(format!("bc-{part_id}")),
            ..Default::default()
        }
    }

    #[test]
    fn create_item_logs_opening_stock_as_movements() {
        let (ledger, a, b) = ledger();
        let view = ledger
            .create_item(draft("P1"), BTreeMap::from([(a, 7), (b, 0)]))
            .unwrap();
        assert_eq!(view.total, 7);
        assert_eq!(view.placements.len(), 2);

        let page = ledger
            .audit(&AuditFilter::default(), SortOrder::Asc, Pagination::default())
            .unwrap();
        assert_eq!(page.entries[0].action, ActionKind::ItemCreate);
        assert_eq!(page.entries[0].movements.len(), 1);
        assert!(ledger.verify_replay().unwrap().consistent());
    }

    #[test]
    fn opening_stock_beyond_the_ceiling_is_rejected() {
        let (ledger, a, b) = ledger();
        for opening in [
            BTreeMap::from([(a, u64::MAX)]),
            BTreeMap::from([(a, Quantity::MAX), (b, Quantity::MAX)]),
        ] {
            let err = ledger.create_item(draft("P1"), opening).unwrap_err();
            assert!(matches!(err, LedgerError::Domain(DomainError::InvalidQuantity { .. })));
        }
        assert!(ledger.stock_by_barcode("bc-P1").is_err());

        let id = ledger
            .create_item(draft("P1"), BTreeMap::from([(a, Quantity::MAX)]))
            .unwrap()
            .item
            .id;
        let err = ledger
            .update_item(id, draft("P1"), Some(BTreeMap::from([(a, Quantity::MAX), (b, 1)])))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::InvalidQuantity { .. })));
        assert_eq!(ledger.stock(id).unwrap().total, Quantity::MAX);
        assert!(ledger.delete_item(id).is_ok());
    }

    #[test]
    fn duplicate_part_id_or_barcode_conflicts() {
        let (ledger, _, _) = ledger();
        ledger.create_item(draft("P1"), BTreeMap::new()).unwrap();

        let err = ledger.create_item(draft("P1"), BTreeMap::new()).unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::Conflict(_))));

        let mut other = draft("P2");
        other.barcode = Some("bc-P1".into());
        let err = ledger.create_item(other, BTreeMap::new()).unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn update_item_records_field_diff_and_quantity_changes() {
        let (ledger, a, b) = ledger();
        let id = ledger.create_item(draft("P1"), BTreeMap::from([(a, 5)])).unwrap().item.id;

        let mut next = draft("P1");
        next.name = "Renamed".into();
        let view = ledger
            .update_item(id, next, Some(BTreeMap::from([(a, 2), (b, 4)])))
            .unwrap();
        assert_eq!(view.total, 6);

        let page = ledger
            .audit(
                &AuditFilter {
                    action: Some(ActionKind::ItemUpdate),
                    ..Default::default()
                },
                SortOrder::Asc,
                Pagination::default(),
            )
            .unwrap();
        let entry = &page.entries[0];
        assert_eq!(entry.details["name"], json!(["Part P1", "Renamed"]));
        assert_eq!(entry.details["quantities"]["Shelf A"], json!([5, 2]));
        assert_eq!(entry.amount, 1);
        assert!(ledger.verify_replay().unwrap().consistent());
    }

    #[test]
    fn delete_item_clears_placements_and_is_blocked_by_boms() {
        let (ledger, a, _) = ledger();
        let product = ledger.create_item(draft("X"), BTreeMap::new()).unwrap().item.id;
        let part = ledger.create_item(draft("A"), BTreeMap::from([(a, 3)])).unwrap().item.id;
        ledger
            .create_bom(product, None, BTreeMap::from([(part, stockroom_core::Quantity::positive("q", 1).unwrap())]))
            .unwrap();

        let err = ledger.delete_item(part).unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::Conflict(_))));

        ledger.delete_bom(product).unwrap();
        let entry = ledger.delete_item(part).unwrap();
        assert_eq!(entry.amount, -3);
        assert!(ledger.stock(part).is_err());
        assert!(ledger.verify_replay().unwrap().placements_match);
    }

    #[test]
    fn location_with_stock_cannot_be_deleted() {
        let (ledger, a, b) = ledger();
        let id = ledger.create_item(draft("P1"), BTreeMap::from([(a, 1)])).unwrap().item.id;

        let err = ledger.delete_location(a).unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::Conflict(_))));

        ledger.adjust(id, a, -1, None).unwrap();
        ledger.delete_location(a).unwrap();
        ledger.delete_location(b).unwrap();
        assert!(ledger.locations().unwrap().is_empty());
        assert!(ledger.stock(id).unwrap().placements.is_empty());
    }

    #[test]
    fn location_and_category_names_are_unique_ignoring_case() {
        let (ledger, _, _) = ledger();
        let err = ledger
            .create_location(LocationDraft {
                name: "shelf a".into(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::Conflict(_))));

        ledger
            .create_category(CategoryDraft {
                name: "Electronics".into(),
                color: "#00f".into(),
            })
            .unwrap();
        assert!(ledger
            .create_category(CategoryDraft {
                name: "ELECTRONICS".into(),
                color: "#f00".into(),
            })
            .is_err());
    }

    #[test]
    fn deleting_category_clears_it_from_items() {
        let (ledger, _, _) = ledger();
        let cat = ledger
            .create_category(CategoryDraft {
                name: "Boards".into(),
                color: "blue".into(),
            })
            .unwrap();
        let mut d = draft("P1");
        d.category = Some(cat.id);
        let id = ledger.create_item(d, BTreeMap::new()).unwrap().item.id;
        assert_eq!(ledger.stock(id).unwrap().category_name.as_deref(), Some("Boards"));

        ledger.delete_category(cat.id).unwrap();
        assert_eq!(ledger.stock(id).unwrap().item.category, None);
    }
}
