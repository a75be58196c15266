use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use stockroom_audit::SortOrder;
use stockroom_catalog::{CategoryDraft, ItemDraft, LocationDraft};
use stockroom_core::{CategoryId, DomainError, DomainResult, LocationId, Quantity};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct PlacementRequest {
    pub location_id: String,
    pub quantity: i64,
}

/// Body of `POST /stock` and `PUT /stock/:id`.
#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    #[serde(alias = "partId")]
    pub part_id: String,
    pub name: String,
    pub category: Option<String>,
    pub barcode: Option<String>,
    pub cost: Option<Decimal>,
    pub description: Option<String>,
    pub supplier: Option<String>,
    pub lot_number: Option<String>,
    pub bin_numbers: Option<String>,
    pub production_stage: Option<String>,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub file_url: Option<String>,
    pub low_stock_threshold: Option<u64>,
    pub locations: Option<Vec<PlacementRequest>>,
}

impl ItemRequest {
    /// Split into catalog fields and the requested per-location quantities.
    pub fn into_parts(self) -> DomainResult<(ItemDraft, Option<BTreeMap<LocationId, u64>>)> {
        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_id::<CategoryId>("category", raw)?),
        };
        let levels = match self.locations {
            None => None,
            Some(rows) => {
                let mut levels = BTreeMap::new();
                for row in rows {
                    let location = parse_id::<LocationId>("location_id", &row.location_id)?;
                    let quantity = u64::try_from(row.quantity).map_err(|_| {
                        DomainError::invalid_quantity("quantity", "must not be negative")
                    })?;
                    if levels.insert(location, quantity).is_some() {
                        return Err(DomainError::validation(
                            "locations",
                            format!("location {location} listed twice"),
                        ));
                    }
                }
                Some(levels)
            }
        };

        let draft = ItemDraft {
            part_id: self.part_id,
            name: self.name,
            category,
            barcode: self.barcode,
            cost: self.cost,
            description: self.description,
            supplier: self.supplier,
            lot_number: self.lot_number,
            bin_numbers: self.bin_numbers,
            production_stage: self.production_stage,
            notes: self.notes,
            image_url: self.image_url,
            file_url: self.file_url,
            low_stock_threshold: self.low_stock_threshold,
        };
        Ok((draft, levels))
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustMode {
    Add,
    Remove,
}

impl AdjustMode {
    pub fn signed(self, amount: Quantity) -> i64 {
        match self {
            AdjustMode::Add => amount.as_delta(),
            AdjustMode::Remove => -amount.as_delta(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    /// Item id or part id.
    #[serde(alias = "partId")]
    pub part_id: String,
    pub amount: i64,
    pub mode: AdjustMode,
    pub location_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub stock_id: String,
    pub location_id: String,
    pub to_location_id: String,
    pub quantity: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScrapRequest {
    pub stock_id: String,
    pub location_id: String,
    pub quantity: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssembleRequest {
    pub product_barcode: String,
    pub quantity: i64,
    pub to_location_id: String,
    pub from_location_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub barcode: String,
    pub action: AdjustMode,
    #[serde(default = "one")]
    pub amount: i64,
    pub location_id: Option<String>,
}

fn one() -> i64 {
    1
}

/// Body of `POST /boms` and `PUT /boms/:barcode`. Components are keyed by barcode.
#[derive(Debug, Deserialize)]
pub struct BomRequest {
    pub product_barcode: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub components: BTreeMap<String, i64>,
}

#[derive(Debug, Deserialize)]
pub struct RequirementsQuery {
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub name: String,
    #[serde(alias = "locationType", alias = "type")]
    pub location_type: Option<String>,
    #[serde(alias = "storageCategory")]
    pub storage_category: Option<String>,
    pub company: Option<String>,
}

impl From<LocationRequest> for LocationDraft {
    fn from(body: LocationRequest) -> Self {
        LocationDraft {
            name: body.name,
            location_type: body.location_type,
            storage_category: body.storage_category,
            company: body.company,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub color: String,
}

impl From<CategoryRequest> for CategoryDraft {
    fn from(body: CategoryRequest) -> Self {
        CategoryDraft {
            name: body.name,
            color: body.color,
        }
    }
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct StockQuery {
    /// Category id or name.
    pub category: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    /// Item id, part id or barcode.
    pub item: Option<String>,
    pub action: Option<String>,
    pub barcode: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub order: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// -------------------------
// Parsing helpers
// -------------------------

/// Parse an id, reporting failures against `field`.
pub fn parse_id<T>(field: &str, raw: &str) -> DomainResult<T>
where
    T: core::str::FromStr,
{
    raw.trim()
        .parse::<T>()
        .map_err(|_| DomainError::validation(field, format!("'{raw}' is not a valid id")))
}

pub fn parse_optional_id<T>(field: &str, raw: Option<&str>) -> DomainResult<Option<T>>
where
    T: core::str::FromStr,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_id(field, raw).map(Some),
    }
}

pub fn parse_timestamp(field: &str, raw: Option<&str>) -> DomainResult<Option<DateTime<Utc>>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| DomainError::validation(field, format!("expected an RFC 3339 timestamp: {e}"))),
    }
}

pub fn parse_order(raw: Option<&str>) -> DomainResult<SortOrder> {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        None | Some("") | Some("asc") => Ok(SortOrder::Asc),
        Some("desc") => Ok(SortOrder::Desc),
        Some(other) => Err(DomainError::validation(
            "order",
            format!("order must be asc or desc, got '{other}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_request_accepts_part_id_alias_and_placements() {
        let location = LocationId::new();
        let body: ItemRequest = serde_json::from_value(serde_json::json!({
            "partId": "P-1",
            "name": "Resistor",
            "cost": "0.25",
            "locations": [{"location_id": location.to_string(), "quantity": 0}],
        }))
        .unwrap();

        let (draft, levels) = body.into_parts().unwrap();
        assert_eq!(draft.part_id, "P-1");
        assert_eq!(draft.cost, Some(Decimal::new(25, 2)));
        assert_eq!(levels.unwrap()[&location], 0);
    }

    #[test]
    fn negative_opening_quantity_is_rejected() {
        let body: ItemRequest = serde_json::from_value(serde_json::json!({
            "part_id": "P-1",
            "name": "Resistor",
            "locations": [{"location_id": LocationId::new().to_string(), "quantity": -1}],
        }))
        .unwrap();

        let err = body.into_parts().unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity { .. }));
    }

    #[test]
    fn location_request_accepts_original_aliases() {
        let body: LocationRequest = serde_json::from_value(serde_json::json!({
            "name": "Shelf A",
            "type": "Internal Location",
            "storageCategory": "Small Parts",
        }))
        .unwrap();
        let draft = LocationDraft::from(body);
        assert_eq!(draft.location_type.as_deref(), Some("Internal Location"));
        assert_eq!(draft.storage_category.as_deref(), Some("Small Parts"));
    }

    #[test]
    fn query_helpers_name_the_failing_field() {
        assert_eq!(parse_order(Some("DESC")).unwrap(), SortOrder::Desc);
        assert_eq!(parse_order(Some("sideways")).unwrap_err().field(), Some("order"));
        assert_eq!(
            parse_timestamp("from", Some("yesterday")).unwrap_err().field(),
            Some("from")
        );
        assert_eq!(
            parse_id::<LocationId>("to_location_id", "nope").unwrap_err().field(),
            Some("to_location_id")
        );
    }
}
