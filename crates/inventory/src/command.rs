use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stockroom_core::{ItemId, LocationId, PlacementKey, Quantity};

/// Where assembly takes its components from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "location")]
pub enum DrawSource {
    /// Every component comes from this one location.
    Location(LocationId),
    /// Each component is drained from its placements in ascending location id
    /// order (oldest location first) until the requirement is met.
    Sequential,
}

/// Build `quantity` units of `product` from already-scaled component requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assembly {
    pub product: ItemId,
    pub quantity: Quantity,
    pub requirements: BTreeMap<ItemId, Quantity>,
    pub source: DrawSource,
    pub target: LocationId,
}

/// Intent to change stock. Decided against a [`crate::StockBook`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    /// Positive delta adds, negative removes.
    Adjust { key: PlacementKey, delta: i64 },
    Transfer {
        item: ItemId,
        from: LocationId,
        to: LocationId,
        quantity: Quantity,
    },
    Scrap { key: PlacementKey, quantity: Quantity },
    Assemble(Assembly),
    /// Set placements to exact quantities (catalog edits). Missing keys are untouched.
    SetLevels { levels: BTreeMap<PlacementKey, u64> },
    /// Empty every listed placement (item deletion).
    Clear { keys: Vec<PlacementKey> },
}

impl StockCommand {
    /// Placement rows the command reads or writes, when knowable up front.
    ///
    /// Sequential assembly draws also touch whatever placements each component
    /// currently has; the caller resolves those before locking.
    pub fn touched_keys(&self) -> Vec<PlacementKey> {
        match self {
            StockCommand::Adjust { key, .. } | StockCommand::Scrap { key, .. } => vec![*key],
            StockCommand::Transfer { item, from, to, .. } => {
                vec![PlacementKey::new(*item, *from), PlacementKey::new(*item, *to)]
            }
            StockCommand::Assemble(a) => {
                let mut keys = vec![PlacementKey::new(a.product, a.target)];
                if let DrawSource::Location(source) = a.source {
                    keys.extend(a.requirements.keys().map(|c| PlacementKey::new(*c, source)));
                }
                keys
            }
            StockCommand::SetLevels { levels } => levels.keys().copied().collect(),
            StockCommand::Clear { keys } => keys.clone(),
        }
    }
}
