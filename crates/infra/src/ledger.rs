//! The stock ledger service.
//!
//! Every mutation follows the same pipeline:
//!
//! ```text
//! acquire LockKeys (sorted, bounded wait)
//!   ↓
//! decide against a read snapshot of the locked rows (pure, StockBook::handle)
//!   ↓
//! re-check movements + apply them + append one entry, in one write section
//!   ↓
//! release locks (drop)
//! ```
//!
//! A rejected operation returns before the write section, so nothing is
//! committed. Readers take the read lock and always see whole commits.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value as JsonValue};

use stockroom_audit::{ActionKind, AuditFilter, AuditPage, EntryDraft, LedgerEntry, Pagination, SortOrder};
use stockroom_core::{Aggregate, DomainError, ItemId, LocationId, Movement, PlacementKey, Quantity};
use stockroom_inventory::{consumed_by_component, Assembly, DrawSource, StockBook, StockCommand};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::locks::{KeyLocks, LockKey, LockSet};
use crate::store::StoreState;
use crate::views::{ReplayReport, StockFilter, StockView};

/// Tries an assembly makes before giving up on component rows that keep moving.
pub const ASSEMBLY_ATTEMPTS: usize = 3;

/// Request to build `quantity` units of `product` at `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleRequest {
    pub product: ItemId,
    pub quantity: Quantity,
    pub target: LocationId,
    /// Draw every component from here; `None` drains oldest locations first.
    pub source: Option<LocationId>,
    pub reason: Option<String>,
}

/// Thread-safe, in-memory stock ledger.
#[derive(Debug, Default)]
pub struct StockLedger {
    state: RwLock<StoreState>,
    locks: KeyLocks,
    config: LedgerConfig,
}

impl StockLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            locks: KeyLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub(crate) fn read(&self) -> LedgerResult<RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| LedgerError::poisoned())
    }

    pub(crate) fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, StoreState>> {
        self.state.write().map_err(|_| LedgerError::poisoned())
    }

    pub(crate) fn lock(&self, keys: impl IntoIterator<Item = LockKey>) -> LedgerResult<LockSet<'_>> {
        self.locks.acquire(keys, self.config.lock_timeout)
    }

    /// Decide under a read snapshot, then check and apply under the write lock.
    ///
    /// The caller must already hold locks on every placement `decide` reads.
    fn transact(
        &self,
        op: &'static str,
        decide: impl FnOnce(&StoreState) -> LedgerResult<EntryDraft>,
    ) -> LedgerResult<LedgerEntry> {
        self.transact_with(op, decide, |_, _| {})
    }

    /// [`transact`](Self::transact) plus a `finish` step that runs in the write
    /// section, after the check, for draft fields that depend on unlocked rows.
    fn transact_with(
        &self,
        op: &'static str,
        decide: impl FnOnce(&StoreState) -> LedgerResult<EntryDraft>,
        finish: impl FnOnce(&StoreState, &mut EntryDraft),
    ) -> LedgerResult<LedgerEntry> {
        let result = (|| -> LedgerResult<LedgerEntry> {
            let mut draft = {
                let state = self.read()?;
                decide(&state)?
            };
            let mut state = self.write()?;
            state.check_movements(&draft.movements, None)?;
            finish(&state, &mut draft);
            Ok(state.apply(draft, Utc::now()))
        })();
        log_outcome(op, result)
    }

    /// Run `mutate` inside the write section.
    ///
    /// Used by catalog and recipe mutations. `mutate` must finish all of its
    /// checks before touching `state`.
    pub(crate) fn transact_in_place<T>(
        &self,
        op: &'static str,
        mutate: impl FnOnce(&mut StoreState, DateTime<Utc>) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let result = self.write().and_then(|mut state| mutate(&mut state, Utc::now()));
        if let Err(err) = &result {
            tracing::warn!(op, error = %err, "ledger mutation rejected");
        }
        result
    }

    // ---------------------------------------------------------------------
    // Stock operations
    // ---------------------------------------------------------------------

    /// Add (positive `delta`) or remove (negative) units at one location.
    pub fn adjust(
        &self,
        item: ItemId,
        location: LocationId,
        delta: i64,
        reason: Option<String>,
    ) -> LedgerResult<LedgerEntry> {
        let key = PlacementKey::new(item, location);
        let _rows = self.lock([LockKey::Placement(key)])?;

        self.transact("adjust", |state| {
            let record = state.item(item)?;
            let place = state.location(location)?;
            let book = state.snapshot([key]);
            let movements = decide(state, &book, &StockCommand::Adjust { key, delta })?;
            let resulting = book.quantity(&key).saturating_add_signed(delta);

            let action = if delta > 0 { ActionKind::Add } else { ActionKind::Remove };
            Ok(EntryDraft::new(action)
                .item(item, record.barcode.clone())
                .locations([location])
                .amount(delta, Some(resulting))
                .movements(movements)
                .details(json!({
                    "location_id": location,
                    "location": place.name,
                }))
                .reason(reason))
        })
    }

    /// Move units between two locations. The item total is unchanged.
    pub fn transfer(
        &self,
        item: ItemId,
        from: LocationId,
        to: LocationId,
        quantity: Quantity,
        reason: Option<String>,
    ) -> LedgerResult<LedgerEntry> {
        let source = PlacementKey::new(item, from);
        let destination = PlacementKey::new(item, to);
        let _rows = self.lock([LockKey::Placement(source), LockKey::Placement(destination)])?;

        let transferred = |state: &StoreState| -> LedgerResult<EntryDraft> {
            let record = state.item(item)?;
            let command = StockCommand::Transfer {
                item,
                from,
                to,
                quantity,
            };
            let book = state.snapshot([source, destination]);
            let movements = decide(state, &book, &command)?;
            let from_name = state.location(from)?.name.clone();
            let to_name = state.location(to)?.name.clone();

            Ok(EntryDraft::new(ActionKind::Transfer)
                .item(item, record.barcode.clone())
                .locations([from, to])
                .amount(quantity.as_delta(), None)
                .movements(movements)
                .details(json!({
                    "from_location_id": from,
                    "from_location": from_name,
                    "to_location_id": to,
                    "to_location": to_name,
                    "from_qty": book.quantity(&source) - quantity.get(),
                    "to_qty": book.quantity(&destination).saturating_add(quantity.get()),
                }))
                .reason(reason))
        };
        // Other rows of the item are not locked; read the total at commit.
        self.transact_with("transfer", transferred, |state, draft| {
            draft.resulting_qty = Some(state.item_total(item));
        })
    }

    /// Permanently remove units at one location and bump the item's scrap counter.
    pub fn scrap(
        &self,
        item: ItemId,
        location: LocationId,
        quantity: Quantity,
        reason: Option<String>,
    ) -> LedgerResult<LedgerEntry> {
        let key = PlacementKey::new(item, location);
        let _rows = self.lock([LockKey::Placement(key)])?;

        self.transact("scrap", |state| {
            let record = state.item(item)?;
            let place = state.location(location)?;
            let book = state.snapshot([key]);
            let movements = decide(state, &book, &StockCommand::Scrap { key, quantity })?;

            Ok(EntryDraft::new(ActionKind::Scrap)
                .item(item, record.barcode.clone())
                .locations([location])
                .amount(-quantity.as_delta(), Some(book.quantity(&key) - quantity.get()))
                .movements(movements)
                .details(json!({
                    "location_id": location,
                    "location": place.name,
                    "scrap_count": record.scrap_count.saturating_add(quantity.get()),
                }))
                .reason(reason))
        })
    }

    /// Consume components per the product's BOM and add the product at the target.
    ///
    /// A sequential draw locks the component rows it saw before locking. If a
    /// component gains stock at another location in between, the attempt is
    /// abandoned and retried with the new rows; after
    /// [`ASSEMBLY_ATTEMPTS`] tries the caller gets `Busy`.
    pub fn assemble(&self, request: AssembleRequest) -> LedgerResult<LedgerEntry> {
        let mut attempt = 1;
        loop {
            let rows_moved = Cell::new(false);
            match self.try_assemble(request.clone(), &rows_moved) {
                Err(LedgerError::Busy(_)) if rows_moved.get() && attempt < ASSEMBLY_ATTEMPTS => {
                    tracing::debug!(attempt, "component rows moved during assembly; retrying");
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    fn try_assemble(&self, request: AssembleRequest, rows_moved: &Cell<bool>) -> LedgerResult<LedgerEntry> {
        let AssembleRequest {
            product,
            quantity,
            target,
            source,
            reason,
        } = request;

        // Bom keys order before placement keys, so taking the recipe first and
        // the rows second keeps the global acquisition order.
        let _recipe = self.lock([LockKey::Bom(product)])?;
        let rows: Vec<PlacementKey> = {
            let state = self.read()?;
            let bom = state
                .boms
                .get(&product)
                .ok_or_else(|| DomainError::NoBom(state.label(product)))?;
            let mut rows = vec![PlacementKey::new(product, target)];
            for component in bom.components().keys() {
                match source {
                    Some(location) => rows.push(PlacementKey::new(*component, location)),
                    None => rows.extend(
                        state
                            .placements_of(*component)
                            .map(|(location, _)| PlacementKey::new(*component, location)),
                    ),
                }
            }
            rows
        };
        let _rows = self.lock(rows.iter().map(|k| LockKey::Placement(*k)))?;

        self.transact("assemble", |state| {
            let record = state.item(product)?;
            state.location(target)?;
            if let Some(location) = source {
                state.location(location)?;
            }
            let bom = state
                .boms
                .get(&product)
                .ok_or_else(|| DomainError::NoBom(state.label(product)))?;
            if source.is_none() {
                let locked: BTreeSet<&PlacementKey> = rows.iter().collect();
                for component in bom.components().keys() {
                    let unlocked = state.placements_of(*component).any(|(location, qty)| {
                        qty > 0 && !locked.contains(&PlacementKey::new(*component, location))
                    });
                    if unlocked {
                        rows_moved.set(true);
                        return Err(LedgerError::Busy(format!(
                            "placements of {} changed while locking",
                            state.label(*component)
                        )));
                    }
                }
            }

            let command = StockCommand::Assemble(Assembly {
                product,
                quantity,
                requirements: bom.requirements(quantity)?,
                source: source.map_or(DrawSource::Sequential, DrawSource::Location),
                target,
            });
            let book = state.snapshot(rows.iter().copied());
            let movements = decide(state, &book, &command)?;

            let components: Map<String, JsonValue> = consumed_by_component(&movements, product)
                .into_iter()
                .map(|(id, units)| (state.label(id), json!(units)))
                .collect();
            let draws: Vec<JsonValue> = movements
                .iter()
                .filter(|m| m.item != product)
                .map(|m| {
                    json!({
                        "component": state.label(m.item),
                        "item_id": m.item,
                        "location_id": m.location,
                        "quantity": m.delta.unsigned_abs(),
                    })
                })
                .collect();
            let locations: BTreeSet<LocationId> = movements.iter().map(|m| m.location).collect();
            let resulting = book
                .quantity(&PlacementKey::new(product, target))
                .saturating_add(quantity.get());

            Ok(EntryDraft::new(ActionKind::Assemble)
                .item(product, record.barcode.clone())
                .locations(locations)
                .amount(quantity.as_delta(), Some(resulting))
                .movements(movements)
                .details(json!({
                    "quantity": quantity.get(),
                    "target_location_id": target,
                    "source_location_id": source,
                    "components": components,
                    "draws": draws,
                }))
                .reason(reason))
        })
    }

    /// Adjust by barcode, as a scanner does.
    ///
    /// Without an explicit location the configured scan location is used, else
    /// the item's only placement.
    pub fn scan(
        &self,
        barcode: &str,
        delta: i64,
        location: Option<LocationId>,
    ) -> LedgerResult<LedgerEntry> {
        let (item, location) = {
            let state = self.read()?;
            let item = find_by_barcode(&state, barcode)?;
            let location = match location.or(self.config.scan_location) {
                Some(location) => location,
                None => {
                    let held: Vec<LocationId> = state.placements_of(item).map(|(l, _)| l).collect();
                    match held.as_slice() {
                        [only] => *only,
                        [] => {
                            return Err(DomainError::validation(
                                "location_id",
                                "item has no placement yet; name a location",
                            )
                            .into());
                        }
                        _ => {
                            return Err(DomainError::validation(
                                "location_id",
                                "item is held at several locations; name one",
                            )
                            .into());
                        }
                    }
                }
            };
            (item, location)
        };
        self.adjust(item, location, delta, Some("scan".to_string()))
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    pub fn stock(&self, item: ItemId) -> LedgerResult<StockView> {
        let state = self.read()?;
        let record = state.item(item)?;
        Ok(StockView::build(&state, record, self.config.low_stock_threshold))
    }

    pub fn stock_by_barcode(&self, barcode: &str) -> LedgerResult<StockView> {
        let state = self.read()?;
        let item = find_by_barcode(&state, barcode)?;
        let record = state.item(item)?;
        Ok(StockView::build(&state, record, self.config.low_stock_threshold))
    }

    pub fn list_stock(&self, filter: &StockFilter) -> LedgerResult<Vec<StockView>> {
        let state = self.read()?;
        Ok(state
            .items
            .values()
            .map(|item| StockView::build(&state, item, self.config.low_stock_threshold))
            .filter(|view| filter.matches(view))
            .collect())
    }

    /// Resolve an item reference: its id, part id or barcode.
    pub fn resolve_item(&self, reference: &str) -> LedgerResult<ItemId> {
        let state = self.read()?;
        let reference = reference.trim();
        if let Ok(id) = reference.parse::<ItemId>() {
            if state.items.contains(id) {
                return Ok(id);
            }
        }
        state
            .items
            .find(|i| i.part_id == reference)
            .or_else(|| state.items.find(|i| i.barcode.as_deref() == Some(reference)))
            .map(|i| i.id)
            .ok_or_else(|| DomainError::UnknownItem(reference.to_string()).into())
    }

    pub fn audit(
        &self,
        filter: &AuditFilter,
        order: SortOrder,
        page: Pagination,
    ) -> LedgerResult<AuditPage> {
        Ok(self.read()?.journal.query(filter, order, page))
    }

    /// Fold the whole journal from empty and compare with live state.
    pub fn verify_replay(&self) -> LedgerResult<ReplayReport> {
        let state = self.read()?;
        let replayed = StockBook::replay(state.journal.entries());

        let live: Vec<(PlacementKey, u64)> = state
            .placements
            .iter()
            .filter(|(_, q)| **q > 0)
            .map(|(k, q)| (*k, *q))
            .collect();
        let placements_match = replayed.levels().into_iter().eq(live);
        let scrap_counts_match = state
            .items
            .values()
            .all(|item| replayed.scrapped(item.id) == item.scrap_count);

        Ok(ReplayReport {
            entries: state.journal.len(),
            placements_match,
            scrap_counts_match,
        })
    }
}

/// Run the pure decision and name items by label in stock errors.
fn decide(state: &StoreState, book: &StockBook, command: &StockCommand) -> LedgerResult<Vec<Movement>> {
    book.handle(command).map_err(|err| relabel(state, err).into())
}

fn relabel(state: &StoreState, err: DomainError) -> DomainError {
    match err {
        DomainError::InsufficientStock {
            item,
            scope,
            requested,
            available,
        } => {
            let item = item
                .parse::<ItemId>()
                .map(|id| state.label(id))
                .unwrap_or(item);
            DomainError::InsufficientStock {
                item,
                scope,
                requested,
                available,
            }
        }
        other => other,
    }
}

pub(crate) fn find_by_barcode(state: &StoreState, barcode: &str) -> LedgerResult<ItemId> {
    let barcode = barcode.trim();
    state
        .items
        .find(|i| i.barcode.as_deref() == Some(barcode))
        .map(|i| i.id)
        .ok_or_else(|| DomainError::UnknownItem(barcode.to_string()).into())
}

pub(crate) fn log_outcome(op: &'static str, result: LedgerResult<LedgerEntry>) -> LedgerResult<LedgerEntry> {
    match &result {
        Ok(entry) => tracing::info!(
            op,
            sequence = entry.sequence,
            action = %entry.action,
            item = ?entry.item,
            amount = entry.amount,
            "ledger entry committed"
        ),
        Err(err) => tracing::warn!(op, error = %err, "ledger mutation rejected"),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_catalog::{ItemDraft, LocationDraft};

    fn ledger_with_item() -> (StockLedger, ItemId, LocationId) {
        let ledger = StockLedger::new(LedgerConfig::default());
        let location = ledger
            .create_location(LocationDraft {
                name: "Main".into(),
                ..Default::default()
            })
            .unwrap();
        let view = ledger
            .create_item(
                ItemDraft {
                    part_id: "CB-302".into(),
                    name: "Circuit Board".into(),
                    barcode: Some("123".into()),
                    ..Default::default()
                },
                Default::default(),
            )
            .unwrap();
        (ledger, view.item.id, location.id)
    }

    #[test]
    fn adjust_records_entry_with_resulting_quantity() {
        let (ledger, item, loc) = ledger_with_item();
        let entry = ledger.adjust(item, loc, 10, Some("restock".into())).unwrap();
        assert_eq!(entry.action, ActionKind::Add);
        assert_eq!(entry.resulting_qty, Some(10));

        let entry = ledger.adjust(item, loc, -4, None).unwrap();
        assert_eq!(entry.action, ActionKind::Remove);
        assert_eq!(entry.amount, -4);
        assert_eq!(entry.resulting_qty, Some(6));
        assert_eq!(ledger.stock(item).unwrap().total, 6);
    }

    #[test]
    fn rejected_adjust_leaves_no_trace() {
        let (ledger, item, loc) = ledger_with_item();
        ledger.adjust(item, loc, 2, None).unwrap();
        let before = ledger.audit(&AuditFilter::default(), SortOrder::Asc, Pagination::default()).unwrap();

        let err = ledger.adjust(item, loc, -3, None).unwrap_err();
        match err {
            LedgerError::Domain(DomainError::InsufficientStock { item: label, .. }) => assert_eq!(label, "123"),
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        let after = ledger.audit(&AuditFilter::default(), SortOrder::Asc, Pagination::default()).unwrap();
        assert_eq!(before.total, after.total);
        assert_eq!(ledger.stock(item).unwrap().total, 2);
    }

    #[test]
    fn adjust_to_unknown_location_fails() {
        let (ledger, item, _) = ledger_with_item();
        let err = ledger.adjust(item, LocationId::new(), 1, None).unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::UnknownLocation(_))));
    }

    #[test]
    fn scrap_bumps_counter_and_status_follows_total() {
        let (ledger, item, loc) = ledger_with_item();
        ledger.adjust(item, loc, 6, None).unwrap();
        ledger
            .scrap(item, loc, Quantity::positive("quantity", 2).unwrap(), Some("cracked".into()))
            .unwrap();

        let view = ledger.stock(item).unwrap();
        assert_eq!(view.total, 4);
        assert_eq!(view.item.scrap_count, 2);
        assert_eq!(view.status, stockroom_inventory::StockStatus::LowStock);
    }

    #[test]
    fn scan_uses_single_placement_when_no_location_given() {
        let (ledger, item, loc) = ledger_with_item();
        let err = ledger.scan("123", 1, None).unwrap_err();
        assert_eq!(err.domain().and_then(|e| e.field()), Some("location_id"));

        ledger.adjust(item, loc, 1, None).unwrap();
        let entry = ledger.scan("123", 2, None).unwrap();
        assert_eq!(entry.locations, vec![loc]);
        assert_eq!(ledger.stock(item).unwrap().total, 3);
        assert!(matches!(
            ledger.scan("nope", 1, None),
            Err(LedgerError::Domain(DomainError::UnknownItem(_)))
        ));
    }

    #[test]
    fn resolve_item_accepts_id_part_id_and_barcode() {
        let (ledger, item, _) = ledger_with_item();
        assert_eq!(ledger.resolve_item(&item.to_string()).unwrap(), item);
        assert_eq!(ledger.resolve_item("CB-302").unwrap(), item);
        assert_eq!(ledger.resolve_item("123").unwrap(), item);
        assert!(ledger.resolve_item("missing").is_err());
    }
}
