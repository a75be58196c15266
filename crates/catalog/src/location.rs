use serde::{Deserialize, Serialize};

use stockroom_core::validate::{optional_text, require_text};
use stockroom_core::{DomainResult, Entity, LocationId};

pub const DEFAULT_LOCATION_TYPE: &str = "Internal Location";
pub const DEFAULT_COMPANY: &str = "My Company";

/// A place stock can be held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub location_type: String,
    pub storage_category: String,
    pub company: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationDraft {
    pub name: String,
    pub location_type: Option<String>,
    pub storage_category: Option<String>,
    pub company: Option<String>,
}

impl Location {
    pub fn create(id: LocationId, draft: LocationDraft) -> DomainResult<Self> {
        Ok(Self {
            id,
            name: require_text("name", &draft.name)?,
            location_type: optional_text(draft.location_type.as_deref())
                .unwrap_or_else(|| DEFAULT_LOCATION_TYPE.to_string()),
            storage_category: optional_text(draft.storage_category.as_deref()).unwrap_or_default(),
            company: optional_text(draft.company.as_deref())
                .unwrap_or_else(|| DEFAULT_COMPANY.to_string()),
        })
    }

    /// Case-insensitive name comparison used for uniqueness.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }
}

impl Entity for Location {
    type Id = LocationId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
