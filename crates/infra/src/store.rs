//! Committed ledger state: catalog registries, placements, recipes and the journal.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use stockroom_audit::{EntryDraft, Journal, LedgerEntry};
use stockroom_catalog::{Category, Item, Location};
use stockroom_core::{DomainError, Entity, ItemId, LocationId, Movement, PlacementKey, Quantity};
use stockroom_inventory::{Bom, StockBook};

/// In-memory map of entities keyed by id, iterated in id (creation) order.
#[derive(Debug, Clone)]
pub struct Registry<E: Entity> {
    rows: BTreeMap<E::Id, E>,
}

impl<E: Entity> Default for Registry<E> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<E: Entity> Registry<E> {
    pub fn get(&self, id: E::Id) -> Option<&E> {
        self.rows.get(&id)
    }

    pub fn contains(&self, id: E::Id) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn insert(&mut self, entity: E) {
        self.rows.insert(entity.id(), entity);
    }

    pub fn remove(&mut self, id: E::Id) -> Option<E> {
        self.rows.remove(&id)
    }

    pub fn find(&self, mut pred: impl FnMut(&E) -> bool) -> Option<&E> {
        self.rows.values().find(|e| pred(e))
    }

    pub fn values(&self) -> impl Iterator<Item = &E> {
        self.rows.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut E> {
        self.rows.values_mut()
    }

    pub fn get_mut(&mut self, id: E::Id) -> Option<&mut E> {
        self.rows.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything the ledger owns. Only mutated inside the ledger's write section.
#[derive(Debug, Default)]
pub struct StoreState {
    pub items: Registry<Item>,
    pub locations: Registry<Location>,
    pub categories: Registry<Category>,
    pub boms: BTreeMap<ItemId, Bom>,
    pub placements: BTreeMap<PlacementKey, u64>,
    pub journal: Journal,
}

impl StoreState {
    pub fn item(&self, id: ItemId) -> Result<&Item, DomainError> {
        self.items
            .get(id)
            .ok_or_else(|| DomainError::UnknownItem(id.to_string()))
    }

    pub fn location(&self, id: LocationId) -> Result<&Location, DomainError> {
        self.locations
            .get(id)
            .ok_or_else(|| DomainError::UnknownLocation(id.to_string()))
    }

    pub fn quantity(&self, key: &PlacementKey) -> u64 {
        self.placements.get(key).copied().unwrap_or(0)
    }

    /// Placement rows of one item in ascending location order.
    pub fn placements_of(&self, item: ItemId) -> impl Iterator<Item = (LocationId, u64)> + '_ {
        self.placements
            .iter()
            .filter(move |(k, _)| k.item == item)
            .map(|(k, q)| (k.location, *q))
    }

    /// Sum of the item's rows. Commits keep it within [`Quantity::MAX`].
    pub fn item_total(&self, item: ItemId) -> u64 {
        self.placements_of(item).fold(0, |total, (_, q)| total.saturating_add(q))
    }

    /// Decision snapshot restricted to `keys`.
    ///
    /// Only rows the caller has locked go in, so nothing decided against the
    /// snapshot can be invalidated before commit.
    pub fn snapshot(&self, keys: impl IntoIterator<Item = PlacementKey>) -> StockBook {
        StockBook::with_levels(
            keys.into_iter()
                .filter_map(|k| self.placements.get(&k).map(|q| (k, *q))),
        )
    }

    /// Display label of an item (barcode, else part id), falling back to the raw id.
    pub fn label(&self, item: ItemId) -> String {
        self.items
            .get(item)
            .map(|i| i.label().to_string())
            .unwrap_or_else(|| item.to_string())
    }

    /// Re-check staged movements against committed state.
    ///
    /// `pending_item` is an item being created in the same commit.
    pub fn check_movements(
        &self,
        movements: &[Movement],
        pending_item: Option<ItemId>,
    ) -> Result<(), DomainError> {
        let ceiling = i128::from(Quantity::MAX);
        let mut net: HashMap<PlacementKey, i128> = HashMap::new();
        for m in movements {
            if Some(m.item) != pending_item && !self.items.contains(m.item) {
                return Err(DomainError::UnknownItem(m.item.to_string()));
            }
            if !self.locations.contains(m.location) {
                return Err(DomainError::UnknownLocation(m.location.to_string()));
            }
            *net.entry(m.key()).or_insert(0) += i128::from(m.delta);
        }

        let mut per_item: HashMap<ItemId, i128> = HashMap::new();
        for (key, delta) in net {
            let held = self.quantity(&key);
            let after = i128::from(held) + delta;
            if after < 0 {
                return Err(DomainError::insufficient(
                    self.label(key.item),
                    format!("location {}", key.location),
                    u64::try_from(-delta).unwrap_or(u64::MAX),
                    held,
                ));
            }
            if after > ceiling {
                return Err(DomainError::invalid_quantity(
                    "quantity",
                    format!(
                        "{} at location {} would exceed {} units",
                        self.label(key.item),
                        key.location,
                        Quantity::MAX
                    ),
                ));
            }
            *per_item.entry(key.item).or_insert(0) += delta;
        }
        for (item, delta) in per_item {
            if i128::from(self.item_total(item)) + delta > ceiling {
                return Err(DomainError::invalid_quantity(
                    "quantity",
                    format!("{} would exceed {} units in total", self.label(item), Quantity::MAX),
                ));
            }
        }
        Ok(())
    }

    /// Apply a checked draft's movements and append it to the journal.
    ///
    /// Units scrapped by the entry are added to the subject item's counter in
    /// the same step.
    pub fn apply(&mut self, draft: EntryDraft, now: DateTime<Utc>) -> LedgerEntry {
        for m in &draft.movements {
            let row = self.placements.entry(m.key()).or_insert(0);
            *row = row.saturating_add_signed(m.delta);
        }
        let entry = self.journal.append(draft, now).clone();
        if let Some(item) = entry.item.and_then(|id| self.items.get_mut(id)) {
            item.scrap_count = item.scrap_count.saturating_add(entry.scrapped());
        }
        entry
    }
}
