use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, ItemId, Quantity};

/// Bill of materials: components needed to build one unit of `product`.
///
/// A recipe may list no components; assembling it only adds the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bom {
    product: ItemId,
    description: Option<String>,
    components: BTreeMap<ItemId, Quantity>,
}

impl Bom {
    pub fn new(
        product: ItemId,
        description: Option<String>,
        components: BTreeMap<ItemId, Quantity>,
    ) -> DomainResult<Self> {
        if components.contains_key(&product) {
            return Err(DomainError::validation(
                "components",
                "a product cannot be a component of itself",
            ));
        }
        Ok(Self {
            product,
            description,
            components,
        })
    }

    pub fn product(&self) -> ItemId {
        self.product
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn components(&self) -> &BTreeMap<ItemId, Quantity> {
        &self.components
    }

    /// Whether `item` appears as a component.
    pub fn uses(&self, item: ItemId) -> bool {
        self.components.contains_key(&item)
    }

    /// Component quantities needed to build `count` units.
    pub fn requirements(&self, count: Quantity) -> DomainResult<BTreeMap<ItemId, Quantity>> {
        self.components
            .iter()
            .map(|(component, per_unit)| Ok((*component, per_unit.checked_mul("quantity", count)?)))
            .collect()
    }

    /// Σ component quantity × component cost. Components without a known cost add nothing.
    pub fn total_cost(&self, cost_of: impl Fn(ItemId) -> Option<Decimal>) -> Decimal {
        self.components
            .iter()
            .filter_map(|(component, qty)| cost_of(*component).map(|c| c * Decimal::from(qty.get())))
            .sum()
    }
}
