use serde::{Deserialize, Serialize};

use stockroom_core::validate::require_text;
use stockroom_core::{CategoryId, DomainResult, Entity};

/// A colored tag items can be filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Hex or tailwind-style color token, stored as given.
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    pub color: String,
}

impl Category {
    pub fn create(id: CategoryId, draft: CategoryDraft) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: require_text("name", &draft.name)?,
            color: require_text("color", &draft.color)?,
        })
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
