//! Bills of materials: recipe storage, costing and requirement scaling.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde_json::{json, Map, Value as JsonValue};

use stockroom_audit::{ActionKind, EntryDraft, LedgerEntry};
use stockroom_core::validate::optional_text;
use stockroom_core::{DomainError, ItemId, Quantity};
use stockroom_inventory::Bom;

use crate::error::LedgerResult;
use crate::ledger::{log_outcome, StockLedger};
use crate::locks::LockKey;
use crate::store::StoreState;
use crate::views::BomView;

/// How a write treats an existing recipe for the product.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BomWrite {
    /// Fail with `Conflict` if the product already has one.
    Create,
    /// Fail with `NoBom` if the product has none.
    Replace,
    /// Create or replace.
    Upsert,
}

impl StockLedger {
    pub fn boms(&self) -> LedgerResult<Vec<BomView>> {
        let state = self.read()?;
        Ok(state.boms.values().map(|bom| BomView::build(&state, bom)).collect())
    }

    pub fn bom(&self, product: ItemId) -> LedgerResult<BomView> {
        let state = self.read()?;
        let bom = recipe(&state, product)?;
        Ok(BomView::build(&state, bom))
    }

    pub fn create_bom(
        &self,
        product: ItemId,
        description: Option<String>,
        components: BTreeMap<ItemId, Quantity>,
    ) -> LedgerResult<BomView> {
        self.write_bom(BomWrite::Create, product, description, components)
    }

    pub fn update_bom(
        &self,
        product: ItemId,
        description: Option<String>,
        components: BTreeMap<ItemId, Quantity>,
    ) -> LedgerResult<BomView> {
        self.write_bom(BomWrite::Replace, product, description, components)
    }

    pub fn upsert_bom(
        &self,
        product: ItemId,
        description: Option<String>,
        components: BTreeMap<ItemId, Quantity>,
    ) -> LedgerResult<BomView> {
        self.write_bom(BomWrite::Upsert, product, description, components)
    }

    /// Store a recipe, replacing the whole component map of any prior one.
    pub fn write_bom(
        &self,
        mode: BomWrite,
        product: ItemId,
        description: Option<String>,
        components: BTreeMap<ItemId, Quantity>,
    ) -> LedgerResult<BomView> {
        let bom = Bom::new(
            product,
            description.and_then(|d| optional_text(Some(d.as_str()))),
            components,
        )?;
        let _recipe = self.lock([LockKey::Bom(product)])?;

        let entry = self.transact_in_place("write_bom", |state, now| {
            let record = state.item(product)?;
            for component in bom.components().keys() {
                state.item(*component)?;
            }
            let prior = state.boms.get(&product);
            match (mode, prior) {
                (BomWrite::Create, Some(_)) => {
                    return Err(DomainError::conflict(format!(
                        "a bill of materials for {} already exists",
                        record.label()
                    ))
                    .into());
                }
                (BomWrite::Replace, None) => {
                    return Err(DomainError::NoBom(record.label().to_string()).into());
                }
                _ => {}
            }

            let action = if prior.is_some() {
                ActionKind::BomUpdate
            } else {
                ActionKind::BomCreate
            };
            let mut details = json!({
                "description": bom.description(),
                "components": labelled(state, &bom),
            });
            if let Some(prior) = prior {
                details["previous"] = JsonValue::Object(labelled(state, prior));
            }
            let draft = EntryDraft::new(action)
                .item(product, record.barcode.clone())
                .details(details);

            state.boms.insert(product, bom.clone());
            Ok(state.apply(draft, now))
        });
        log_outcome("write_bom", entry)?;
        self.bom(product)
    }

    /// Remove a recipe. Later assembly of the product fails with `NoBom`.
    pub fn delete_bom(&self, product: ItemId) -> LedgerResult<LedgerEntry> {
        let _recipe = self.lock([LockKey::Bom(product)])?;
        let entry = self.transact_in_place("delete_bom", |state, now| {
            let bom = recipe(state, product)?;
            let draft = EntryDraft::new(ActionKind::BomDelete)
                .item(product, state.items.get(product).and_then(|i| i.barcode.clone()))
                .details(json!({
                    "description": bom.description(),
                    "components": labelled(state, bom),
                }));
            state.boms.remove(&product);
            Ok(state.apply(draft, now))
        });
        log_outcome("delete_bom", entry)
    }

    /// Σ component quantity × component cost for one unit of the product.
    pub fn bom_cost(&self, product: ItemId) -> LedgerResult<Decimal> {
        let state = self.read()?;
        let bom = recipe(&state, product)?;
        Ok(bom.total_cost(|id| state.items.get(id).map(|i| i.cost)))
    }

    /// Component quantities needed to build `count` units of the product.
    pub fn bom_requirements(
        &self,
        product: ItemId,
        count: Quantity,
    ) -> LedgerResult<BTreeMap<ItemId, Quantity>> {
        let state = self.read()?;
        Ok(recipe(&state, product)?.requirements(count)?)
    }
}

fn recipe(state: &StoreState, product: ItemId) -> Result<&Bom, DomainError> {
    state
        .boms
        .get(&product)
        .ok_or_else(|| DomainError::NoBom(state.label(product)))
}

fn labelled(state: &StoreState, bom: &Bom) -> Map<String, JsonValue> {
    bom.components()
        .iter()
        .map(|(id, qty)| (state.label(*id), json!(qty.get())))
        .collect()
}
