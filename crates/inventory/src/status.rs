use serde::{Deserialize, Serialize};

use stockroom_core::DomainError;

/// Stock status derived from an item's total quantity. Never stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    #[serde(rename = "In Stock")]
    InStock,
    #[serde(rename = "Low Stock")]
    LowStock,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
}

impl StockStatus {
    /// `Out of Stock` at zero, `Low Stock` strictly below `low_threshold`, else `In Stock`.
    pub fn derive(total: u64, low_threshold: u64) -> Self {
        if total == 0 {
            StockStatus::OutOfStock
        } else if total < low_threshold {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StockStatus::InStock => "In Stock",
            StockStatus::LowStock => "Low Stock",
            StockStatus::OutOfStock => "Out of Stock",
        }
    }
}

impl core::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for StockStatus {
    type Err = DomainError;

    /// Accepts the display form ("Low Stock") or a slug ("low_stock", "low-stock").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "instock" => Ok(StockStatus::InStock),
            "lowstock" => Ok(StockStatus::LowStock),
            "outofstock" => Ok(StockStatus::OutOfStock),
            _ => Err(DomainError::validation("status", format!("unknown status '{s}'"))),
        }
    }
}
