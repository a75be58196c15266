use std::collections::BTreeMap;

use stockroom_audit::LedgerEntry;
use stockroom_core::{Aggregate, DomainError, ItemId, LocationId, Movement, PlacementKey, Quantity};

use crate::command::{Assembly, DrawSource, StockCommand};

/// Placement quantities plus per-item scrap totals.
///
/// Used two ways: as the snapshot a ledger transaction decides against (only
/// the rows it locked), and as the fold target when replaying the audit log.
/// Rows that reach zero stay present with quantity 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockBook {
    placements: BTreeMap<PlacementKey, u64>,
    scrapped: BTreeMap<ItemId, u64>,
}

impl StockBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_levels(levels: impl IntoIterator<Item = (PlacementKey, u64)>) -> Self {
        Self {
            placements: levels.into_iter().collect(),
            scrapped: BTreeMap::new(),
        }
    }

    /// Rebuild state by folding every entry's movements from empty.
    pub fn replay<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        let mut book = Self::new();
        for entry in entries {
            for movement in &entry.movements {
                book.apply(movement);
            }
            if let Some(item) = entry.item {
                book.record_scrap(item, entry.scrapped());
            }
        }
        book
    }

    pub fn quantity(&self, key: &PlacementKey) -> u64 {
        self.placements.get(key).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: &PlacementKey) -> bool {
        self.placements.contains_key(key)
    }

    /// All rows, including zero-quantity ones.
    pub fn placements(&self) -> &BTreeMap<PlacementKey, u64> {
        &self.placements
    }

    /// Rows holding at least one unit.
    pub fn levels(&self) -> BTreeMap<PlacementKey, u64> {
        self.placements
            .iter()
            .filter(|(_, q)| **q > 0)
            .map(|(k, q)| (*k, *q))
            .collect()
    }

    /// Placements of one item in ascending location order.
    pub fn placements_of(&self, item: ItemId) -> impl Iterator<Item = (LocationId, u64)> + '_ {
        self.placements
            .iter()
            .filter(move |(k, _)| k.item == item)
            .map(|(k, q)| (k.location, *q))
    }

    pub fn item_total(&self, item: ItemId) -> u64 {
        self.placements_of(item).fold(0, |total, (_, q)| total.saturating_add(q))
    }

    pub fn scrapped(&self, item: ItemId) -> u64 {
        self.scrapped.get(&item).copied().unwrap_or(0)
    }

    pub fn record_scrap(&mut self, item: ItemId, units: u64) {
        if units > 0 {
            *self.scrapped.entry(item).or_insert(0) += units;
        }
    }

    fn require(&self, key: PlacementKey, needed: u64) -> Result<(), DomainError> {
        let available = self.quantity(&key);
        if needed > available {
            return Err(DomainError::insufficient(
                key.item.to_string(),
                format!("location {}", key.location),
                needed,
                available,
            ));
        }
        Ok(())
    }

    /// Fail if adding `added` units would push the row past [`Quantity::MAX`].
    fn ensure_room(&self, key: PlacementKey, added: u64, field: &str) -> Result<(), DomainError> {
        match self.quantity(&key).checked_add(added) {
            Some(total) if total <= Quantity::MAX => Ok(()),
            _ => Err(DomainError::invalid_quantity(
                field,
                format!("location {} would hold more than {} units", key.location, Quantity::MAX),
            )),
        }
    }

    fn decide_assembly(&self, a: &Assembly) -> Result<Vec<Movement>, DomainError> {
        let mut movements = Vec::with_capacity(a.requirements.len() + 1);

        for (component, needed) in &a.requirements {
            let needed = needed.get();
            match a.source {
                DrawSource::Location(source) => {
                    let key = PlacementKey::new(*component, source);
                    self.require(key, needed)?;
                    movements.push(Movement::new(key, -(needed as i64)));
                }
                DrawSource::Sequential => {
                    let available = self.item_total(*component);
                    if needed > available {
                        return Err(DomainError::insufficient(
                            component.to_string(),
                            "all locations",
                            needed,
                            available,
                        ));
                    }
                    let mut remaining = needed;
                    for (location, held) in self.placements_of(*component) {
                        if remaining == 0 {
                            break;
                        }
                        let take = held.min(remaining);
                        if take > 0 {
                            movements.push(Movement::new(
                                PlacementKey::new(*component, location),
                                -(take as i64),
                            ));
                            remaining -= take;
                        }
                    }
                }
            }
        }

        let output = PlacementKey::new(a.product, a.target);
        self.ensure_room(output, a.quantity.get(), "quantity")?;
        movements.push(Movement::new(output, a.quantity.as_delta()));
        Ok(movements)
    }
}

impl Aggregate for StockBook {
    type Command = StockCommand;
    type Event = Movement;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        let row = self.placements.entry(event.key()).or_insert(0);
        *row = row.saturating_add_signed(event.delta);
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockCommand::Adjust { key, delta } => {
                if *delta == 0 {
                    return Err(DomainError::invalid_quantity("amount", "must not be zero"));
                }
                if *delta < 0 {
                    self.require(*key, delta.unsigned_abs())?;
                } else {
                    self.ensure_room(*key, delta.unsigned_abs(), "amount")?;
                }
                Ok(vec![Movement::new(*key, *delta)])
            }
            StockCommand::Transfer {
                item,
                from,
                to,
                quantity,
            } => {
                if from == to {
                    return Err(DomainError::validation(
                        "to_location_id",
                        "destination must differ from the source location",
                    ));
                }
                let source = PlacementKey::new(*item, *from);
                let destination = PlacementKey::new(*item, *to);
                self.require(source, quantity.get())?;
                self.ensure_room(destination, quantity.get(), "quantity")?;
                Ok(vec![
                    Movement::new(source, -quantity.as_delta()),
                    Movement::new(destination, quantity.as_delta()),
                ])
            }
            StockCommand::Scrap { key, quantity } => {
                self.require(*key, quantity.get())?;
                Ok(vec![Movement::new(*key, -quantity.as_delta())])
            }
            StockCommand::Assemble(assembly) => self.decide_assembly(assembly),
            StockCommand::SetLevels { levels } => {
                let mut movements = Vec::new();
                for (key, level) in levels {
                    if *level > Quantity::MAX {
                        return Err(DomainError::invalid_quantity(
                            "quantity",
                            format!("must be at most {}", Quantity::MAX),
                        ));
                    }
                    let delta = i128::from(*level) - i128::from(self.quantity(key));
                    let delta = i64::try_from(delta)
                        .map_err(|_| DomainError::invalid_quantity("quantity", "change is too large"))?;
                    if delta != 0 {
                        movements.push(Movement::new(*key, delta));
                    }
                }
                Ok(movements)
            }
            StockCommand::Clear { keys } => Ok(keys
                .iter()
                .filter_map(|key| {
                    let held = self.quantity(key);
                    (held > 0).then(|| Movement::new(*key, -(held as i64)))
                })
                .collect()),
        }
    }
}

/// Units consumed per component by a set of assembly movements.
pub fn consumed_by_component(movements: &[Movement], product: ItemId) -> BTreeMap<ItemId, u64> {
    let mut consumed = BTreeMap::new();
    for m in movements.iter().filter(|m| m.item != product && m.delta < 0) {
        *consumed.entry(m.item).or_insert(0) += m.delta.unsigned_abs();
    }
    consumed
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn quantity(n: i64) -> Result<Quantity, DomainError> {
        Quantity::positive("quantity", n)
    }

    fn apply_all(book: &mut StockBook, movements: &[Movement]) {
        for m in movements {
            book.apply(m);
        }
    }

    #[test]
    fn adjust_rejects_zero_and_overdraw_without_change() {
        let key = PlacementKey::new(ItemId::new(), LocationId::new());
        let book = StockBook::with_levels([(key, 3)]);

        assert!(matches!(
            book.handle(&StockCommand::Adjust { key, delta: 0 }),
            Err(DomainError::InvalidQuantity { .. })
        ));
        match book.handle(&StockCommand::Adjust { key, delta: -4 }) {
            Err(DomainError::InsufficientStock {
                requested, available, ..
            }) => {
                assert_eq!(requested, 4);
                assert_eq!(available, 3);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(book.quantity(&key), 3);
    }

    #[test]
    fn remove_to_zero_keeps_the_row() {
        let key = PlacementKey::new(ItemId::new(), LocationId::new());
        let mut book = StockBook::with_levels([(key, 3)]);
        let events = book.handle(&StockCommand::Adjust { key, delta: -3 }).unwrap();
        apply_all(&mut book, &events);
        assert!(book.contains(&key));
        assert_eq!(book.quantity(&key), 0);
        assert!(book.levels().is_empty());
    }

    #[test]
    fn transfer_moves_units_and_conserves_total() {
        let item = ItemId::new();
        let (a, b) = (LocationId::new(), LocationId::new());
        let mut book = StockBook::with_levels([(PlacementKey::new(item, a), 10)]);

        let events = book
            .handle(&StockCommand::Transfer {
                item,
                from: a,
                to: b,
                quantity: quantity(4).unwrap(),
            })
            .unwrap();
        apply_all(&mut book, &events);

        assert_eq!(book.quantity(&PlacementKey::new(item, a)), 6);
        assert_eq!(book.quantity(&PlacementKey::new(item, b)), 4);
        assert_eq!(book.item_total(item), 10);
    }

    #[test]
    fn transfer_to_same_location_is_rejected() {
        let item = ItemId::new();
        let a = LocationId::new();
        let book = StockBook::with_levels([(PlacementKey::new(item, a), 10)]);
        let err = book
            .handle(&StockCommand::Transfer {
                item,
                from: a,
                to: a,
                quantity: quantity(1).unwrap(),
            })
            .unwrap_err();
        assert_eq!(err.field(), Some("to_location_id"));
    }

    #[test]
    fn assembly_from_single_location() {
        let (product, comp_a, comp_b) = (ItemId::new(), ItemId::new(), ItemId::new());
        let loc = LocationId::new();
        let mut book = StockBook::with_levels([
            (PlacementKey::new(comp_a, loc), 10),
            (PlacementKey::new(comp_b, loc), 10),
        ]);

        let assembly = Assembly {
            product,
            quantity: quantity(3).unwrap(),
            requirements: BTreeMap::from([(comp_a, quantity(6).unwrap()), (comp_b, quantity(3).unwrap())]),
            source: DrawSource::Location(loc),
            target: loc,
        };
        let events = book.handle(&StockCommand::Assemble(assembly)).unwrap();
        apply_all(&mut book, &events);

        assert_eq!(book.quantity(&PlacementKey::new(comp_a, loc)), 4);
        assert_eq!(book.quantity(&PlacementKey::new(comp_b, loc)), 7);
        assert_eq!(book.quantity(&PlacementKey::new(product, loc)), 3);
        assert_eq!(
            consumed_by_component(&events, product),
            BTreeMap::from([(comp_a, 6), (comp_b, 3)])
        );
    }

    #[test]
    fn sequential_draw_drains_oldest_location_first() {
        let (product, comp) = (ItemId::new(), ItemId::new());
        let older = LocationId::new();
        let newer = LocationId::new();
        let book = StockBook::with_levels([
            (PlacementKey::new(comp, newer), 10),
            (PlacementKey::new(comp, older), 3),
        ]);

        let events = book
            .handle(&StockCommand::Assemble(Assembly {
                product,
                quantity: quantity(1).unwrap(),
                requirements: BTreeMap::from([(comp, quantity(5).unwrap())]),
                source: DrawSource::Sequential,
                target: newer,
            }))
            .unwrap();

        assert_eq!(events[0], Movement::new(PlacementKey::new(comp, older), -3));
        assert_eq!(events[1], Movement::new(PlacementKey::new(comp, newer), -2));
        assert_eq!(events[2], Movement::new(PlacementKey::new(product, newer), 1));
    }

    #[test]
    fn assembly_short_on_any_component_fails_whole() {
        let (product, comp_a, comp_b) = (ItemId::new(), ItemId::new(), ItemId::new());
        let loc = LocationId::new();
        let book = StockBook::with_levels([
            (PlacementKey::new(comp_a, loc), 10),
            (PlacementKey::new(comp_b, loc), 1),
        ]);
        let err = book
            .handle(&StockCommand::Assemble(Assembly {
                product,
                quantity: quantity(2).unwrap(),
                requirements: BTreeMap::from([(comp_a, quantity(2).unwrap()), (comp_b, quantity(2).unwrap())]),
                source: DrawSource::Sequential,
                target: loc,
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));
    }

    #[test]
    fn set_levels_and_clear_emit_deltas() {
        let item = ItemId::new();
        let (a, b) = (LocationId::new(), LocationId::new());
        let ka = PlacementKey::new(item, a);
        let kb = PlacementKey::new(item, b);
        let mut book = StockBook::with_levels([(ka, 5)]);

        let events = book
            .handle(&StockCommand::SetLevels {
                levels: BTreeMap::from([(ka, 5), (kb, 2)]),
            })
            .unwrap();
        assert_eq!(events, vec![Movement::new(kb, 2)]);
        apply_all(&mut book, &events);

        let events = book.handle(&StockCommand::Clear { keys: vec![ka, kb] }).unwrap();
        apply_all(&mut book, &events);
        assert_eq!(book.item_total(item), 0);
    }

    #[test]
    fn rows_never_grow_past_the_quantity_ceiling() {
        let item = ItemId::new();
        let (a, b) = (LocationId::new(), LocationId::new());
        let (ka, kb) = (PlacementKey::new(item, a), PlacementKey::new(item, b));
        let book = StockBook::with_levels([(ka, Quantity::MAX), (kb, 1)]);

        let err = book.handle(&StockCommand::Adjust { key: ka, delta: 1 }).unwrap_err();
        assert_eq!(err.field(), Some("amount"));

        let err = book
            .handle(&StockCommand::Transfer {
                item,
                from: b,
                to: a,
                quantity: quantity(1).unwrap(),
            })
            .unwrap_err();
        assert_eq!(err.field(), Some("quantity"));

        let err = book
            .handle(&StockCommand::SetLevels {
                levels: BTreeMap::from([(kb, u64::MAX)]),
            })
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity { .. }));

        // Draining the full row still works.
        let events = book
            .handle(&StockCommand::Adjust {
                key: ka,
                delta: -i64::MAX,
            })
            .unwrap();
        assert_eq!(events, vec![Movement::new(ka, -i64::MAX)]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Adjust(usize, usize, i64),
        Transfer(usize, usize, usize, i64),
        Scrap(usize, usize, i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..2usize, 0..3usize, -15i64..20).prop_map(|(i, l, d)| Op::Adjust(i, l, d)),
            (0..2usize, 0..3usize, 0..3usize, 1i64..10).prop_map(|(i, f, t, q)| Op::Transfer(i, f, t, q)),
            (0..2usize, 0..3usize, 1i64..8).prop_map(|(i, l, q)| Op::Scrap(i, l, q)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: totals equal added − removed − scrapped and never go negative.
        #[test]
        fn conservation_and_non_negativity(ops in proptest::collection::vec(op_strategy(), 1..60)) {
            let items = [ItemId::new(), ItemId::new()];
            let locations = [LocationId::new(), LocationId::new(), LocationId::new()];
            let mut book = StockBook::new();
            let mut net = [0i64; 2];

            for op in ops {
                let (cmd, item_idx) = match op {
                    Op::Adjust(i, l, d) => (
                        StockCommand::Adjust { key: PlacementKey::new(items[i], locations[l]), delta: d },
                        i,
                    ),
                    Op::Transfer(i, f, t, q) => (
                        StockCommand::Transfer {
                            item: items[i],
                            from: locations[f],
                            to: locations[t],
                            quantity: quantity(q).unwrap(),
                        },
                        i,
                    ),
                    Op::Scrap(i, l, q) => (
                        StockCommand::Scrap {
                            key: PlacementKey::new(items[i], locations[l]),
                            quantity: quantity(q).unwrap(),
                        },
                        i,
                    ),
                };

                let before = book.clone();
                match book.handle(&cmd) {
                    Ok(events) => {
                        for e in &events {
                            net[item_idx] += e.delta;
                        }
                        apply_all(&mut book, &events);
                    }
                    Err(_) => prop_assert_eq!(&book, &before),
                }

                for (i, item) in items.iter().enumerate() {
                    prop_assert!(net[i] >= 0);
                    prop_assert_eq!(book.item_total(*item) as i64, net[i]);
                }
            }
        }

        /// Property: decide never mutates the book.
        #[test]
        fn handle_is_side_effect_free(held in 0u64..50, delta in -60i64..60) {
            let key = PlacementKey::new(ItemId::new(), LocationId::new());
            let book = StockBook::with_levels([(key, held)]);
            let snapshot = book.clone();
            let first = book.handle(&StockCommand::Adjust { key, delta });
            let second = book.handle(&StockCommand::Adjust { key, delta });
            prop_assert_eq!(&book, &snapshot);
            prop_assert_eq!(first, second);
        }
    }
}
