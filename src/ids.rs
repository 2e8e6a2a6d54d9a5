//! Typed Identifiers
//!
//! Every entity the engine touches is keyed by a v7 UUID tagged with the type
//! it identifies, so a product id can never be passed where a category id is
//! expected.

use std::{
    cmp::Ordering,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    hash::{Hash, Hasher},
    marker::PhantomData,
};

use uuid::Uuid;

use crate::{campaigns::Campaign, rules::DiscountRule, usage::CampaignUsage};

/// A UUID tagged with the type it identifies.
pub struct TypedUuid<T>(Uuid, PhantomData<fn() -> T>);

impl<T> TypedUuid<T> {
    /// Generate a fresh, time-ordered identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::from_uuid(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid, PhantomData)
    }

    /// Unwrap into the raw UUID.
    #[must_use]
    pub const fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl<T> Default for TypedUuid<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for TypedUuid<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypedUuid<T> {}

impl<T> Debug for TypedUuid<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Debug::fmt(&self.0, f)
    }
}

impl<T> Display for TypedUuid<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}

impl<T> PartialEq for TypedUuid<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for TypedUuid<T> {}

impl<T> Hash for TypedUuid<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T> PartialOrd for TypedUuid<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for TypedUuid<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T> From<Uuid> for TypedUuid<T> {
    fn from(value: Uuid) -> Self {
        Self::from_uuid(value)
    }
}

impl<T> From<TypedUuid<T>> for Uuid {
    fn from(value: TypedUuid<T>) -> Self {
        value.into_uuid()
    }
}

/// Marker for catalogue products.
#[derive(Debug)]
pub enum Product {}

/// Marker for catalogue categories.
#[derive(Debug)]
pub enum Category {}

/// Marker for catalogue brands.
#[derive(Debug)]
pub enum Brand {}

/// Marker for customers.
#[derive(Debug)]
pub enum Customer {}

/// Marker for orders.
#[derive(Debug)]
pub enum Order {}

/// Marker for order line items.
#[derive(Debug)]
pub enum OrderItem {}

/// Campaign id
pub type CampaignUuid = TypedUuid<Campaign>;

/// Discount rule id
pub type RuleUuid = TypedUuid<DiscountRule>;

/// Campaign usage id
pub type UsageUuid = TypedUuid<CampaignUsage>;

/// Product id
pub type ProductUuid = TypedUuid<Product>;

/// Category id
pub type CategoryUuid = TypedUuid<Category>;

/// Brand id
pub type BrandUuid = TypedUuid<Brand>;

/// Customer id
pub type CustomerUuid = TypedUuid<Customer>;

/// Order id
pub type OrderUuid = TypedUuid<Order>;

/// Order item id
pub type OrderItemUuid = TypedUuid<OrderItem>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_distinct() {
        assert_ne!(ProductUuid::new(), ProductUuid::new());
    }

    #[test]
    fn round_trips_through_uuid() {
        let uuid = Uuid::now_v7();
        let id = CategoryUuid::from_uuid(uuid);

        assert_eq!(Uuid::from(id), uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }
}
