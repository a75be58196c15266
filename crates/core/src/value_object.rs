//! Value objects: equality by value, not identity.
//!
//! Value objects have **no identity** - they are defined entirely by their
//! attribute values. The ledger's placements, movements and quantities are all
//! value objects.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{ItemId, LocationId};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A strictly positive unit count.
///
/// This is the single place where "how many units" coming from a caller is
/// validated. Every ledger operation that moves a positive amount takes one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u64")]
pub struct Quantity(u64);

impl Quantity {
    /// Largest count a quantity, a placement row or an item total may reach.
    pub const MAX: u64 = i64::MAX as u64;

    /// Validate a caller-supplied amount, naming `field` on failure.
    pub fn positive(field: &str, value: i64) -> DomainResult<Self> {
        if value <= 0 {
            return Err(DomainError::invalid_quantity(
                field,
                format!("must be a positive integer (got {value})"),
            ));
        }
        Ok(Self(value as u64))
    }

    /// Wrap an already-positive count.
    pub fn new(field: &str, value: u64) -> DomainResult<Self> {
        if value == 0 {
            return Err(DomainError::invalid_quantity(field, "must be greater than zero"));
        }
        if value > Self::MAX {
            return Err(DomainError::invalid_quantity(field, "is too large"));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Signed view, for building movements.
    pub fn as_delta(self) -> i64 {
        self.0 as i64
    }

    /// `self × factor`, failing instead of overflowing.
    pub fn checked_mul(self, field: &str, factor: Quantity) -> DomainResult<Self> {
        let product = self
            .0
            .checked_mul(factor.0)
            .ok_or_else(|| DomainError::invalid_quantity(field, "requirement overflows"))?;
        Self::new(field, product)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::positive("quantity", value)
    }
}

impl From<Quantity> for u64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl ValueObject for Quantity {}

/// Composite key of a stock placement: one item at one location.
///
/// Ordered by item then location; lock acquisition relies on this order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlacementKey {
    pub item: ItemId,
    pub location: LocationId,
}

impl PlacementKey {
    pub fn new(item: ItemId, location: LocationId) -> Self {
        Self { item, location }
    }
}

impl ValueObject for PlacementKey {}

/// One signed change to one placement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub item: ItemId,
    pub location: LocationId,
    pub delta: i64,
}

impl Movement {
    pub fn new(key: PlacementKey, delta: i64) -> Self {
        Self {
            item: key.item,
            location: key.location,
            delta,
        }
    }

    pub fn key(&self) -> PlacementKey {
        PlacementKey::new(self.item, self.location)
    }
}

impl ValueObject for Movement {}
