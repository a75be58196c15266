//! Read models returned by ledger queries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_catalog::Item;
use stockroom_core::{CategoryId, ItemId, LocationId, Quantity};
use stockroom_inventory::{Bom, StockStatus};

use crate::store::StoreState;

/// Quantity of an item at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementView {
    pub location_id: LocationId,
    pub location: String,
    pub quantity: u64,
}

/// An item with its placements, total and derived status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockView {
    #[serde(flatten)]
    pub item: Item,
    pub category_name: Option<String>,
    pub placements: Vec<PlacementView>,
    pub total: u64,
    pub status: StockStatus,
}

impl StockView {
    pub(crate) fn build(state: &StoreState, item: &Item, default_threshold: u64) -> Self {
        let placements: Vec<PlacementView> = state
            .placements_of(item.id)
            .map(|(location_id, quantity)| PlacementView {
                location_id,
                location: state
                    .locations
                    .get(location_id)
                    .map(|l| l.name.clone())
                    .unwrap_or_default(),
                quantity,
            })
            .collect();
        let total = placements.iter().fold(0u64, |total, p| total.saturating_add(p.quantity));
        let threshold = item.low_stock_threshold.unwrap_or(default_threshold);

        Self {
            category_name: item
                .category
                .and_then(|c| state.categories.get(c))
                .map(|c| c.name.clone()),
            item: item.clone(),
            placements,
            total,
            status: StockStatus::derive(total, threshold),
        }
    }

    pub fn quantity_at(&self, location: LocationId) -> u64 {
        self.placements
            .iter()
            .find(|p| p.location_id == location)
            .map(|p| p.quantity)
            .unwrap_or(0)
    }
}

/// Stock list filters. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockFilter {
    pub category: Option<CategoryId>,
    pub status: Option<StockStatus>,
    /// Items holding at least one unit at this location.
    pub location: Option<LocationId>,
}

impl StockFilter {
    pub fn matches(&self, view: &StockView) -> bool {
        if let Some(category) = self.category {
            if view.item.category != Some(category) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if view.status != status {
                return false;
            }
        }
        if let Some(location) = self.location {
            if view.quantity_at(location) == 0 {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomLineView {
    pub item_id: ItemId,
    pub barcode: Option<String>,
    pub part_id: String,
    pub name: String,
    pub quantity: Quantity,
    pub unit_cost: Decimal,
}

/// A recipe with its component details resolved from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomView {
    pub product_id: ItemId,
    pub product_barcode: Option<String>,
    pub product_name: String,
    pub description: Option<String>,
    pub components: Vec<BomLineView>,
    pub total_cost: Decimal,
}

impl BomView {
    pub(crate) fn build(state: &StoreState, bom: &Bom) -> Self {
        let product = state.items.get(bom.product());
        let components = bom
            .components()
            .iter()
            .map(|(id, quantity)| {
                let item = state.items.get(*id);
                BomLineView {
                    item_id: *id,
                    barcode: item.and_then(|i| i.barcode.clone()),
                    part_id: item.map(|i| i.part_id.clone()).unwrap_or_default(),
                    name: item.map(|i| i.name.clone()).unwrap_or_default(),
                    quantity: *quantity,
                    unit_cost: item.map(|i| i.cost).unwrap_or(Decimal::ZERO),
                }
            })
            .collect();

        Self {
            product_id: bom.product(),
            product_barcode: product.and_then(|p| p.barcode.clone()),
            product_name: product.map(|p| p.name.clone()).unwrap_or_default(),
            description: bom.description().map(str::to_string),
            components,
            total_cost: bom.total_cost(|id| state.items.get(id).map(|i| i.cost)),
        }
    }
}

/// Outcome of replaying the journal against the live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub entries: usize,
    pub placements_match: bool,
    pub scrap_counts_match: bool,
}

impl ReplayReport {
    pub fn consistent(&self) -> bool {
        self.placements_match && self.scrap_counts_match
    }
}
