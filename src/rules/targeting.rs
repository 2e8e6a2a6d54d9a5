//! Rule Targeting
//!
//! Product and customer targeting dimensions. Each dimension is a closed sum
//! type whose variants carry only the id set they select by, so a rule can
//! never hold a brand set while targeting categories.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::ids::{BrandUuid, CategoryUuid, CustomerUuid, ProductUuid};

/// Loyalty tier a customer belongs to, e.g. `gold`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerTier(String);

impl CustomerTier {
    /// Create a tier from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Tier name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CustomerTier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for CustomerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalogue facts about a product, resolved by the caller.
///
/// `category_ancestors` holds every ancestor of `category`; walking the
/// category tree is not the rule's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductContext {
    /// Product id.
    pub product: ProductUuid,

    /// The product's own category.
    pub category: Option<CategoryUuid>,

    /// Ancestors of `category`, nearest first.
    pub category_ancestors: SmallVec<[CategoryUuid; 4]>,

    /// The product's brand.
    pub brand: Option<BrandUuid>,
}

impl ProductContext {
    /// A product with no category or brand.
    pub fn new(product: ProductUuid) -> Self {
        Self {
            product,
            category: None,
            category_ancestors: SmallVec::new(),
            brand: None,
        }
    }

    /// Set the category and its ancestor chain.
    #[must_use]
    pub fn with_category(
        mut self,
        category: CategoryUuid,
        ancestors: impl IntoIterator<Item = CategoryUuid>,
    ) -> Self {
        self.category = Some(category);
        self.category_ancestors = ancestors.into_iter().collect();
        self
    }

    /// Set the brand.
    #[must_use]
    pub fn with_brand(mut self, brand: BrandUuid) -> Self {
        self.brand = Some(brand);
        self
    }
}

/// Dimension a target id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetDimension {
    /// Product ids
    Product,

    /// Category ids
    Category,

    /// Brand ids
    Brand,

    /// Customer ids
    Customer,

    /// Customer tiers
    CustomerTier,
}

impl fmt::Display for TargetDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Product => "product",
            Self::Category => "category",
            Self::Brand => "brand",
            Self::Customer => "customer",
            Self::CustomerTier => "customer tier",
        })
    }
}

/// A single target to add to a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
    /// A product for `SpecificProducts` rules.
    Product(ProductUuid),

    /// A category for `Categories` rules.
    Category(CategoryUuid),

    /// A brand for `Brands` rules.
    Brand(BrandUuid),

    /// A customer for `SpecificCustomers` rules.
    Customer(CustomerUuid),

    /// A tier for `CustomerTiers` rules.
    CustomerTier(CustomerTier),
}

impl RuleTarget {
    /// Dimension this target belongs to.
    pub const fn dimension(&self) -> TargetDimension {
        match self {
            Self::Product(_) => TargetDimension::Product,
            Self::Category(_) => TargetDimension::Category,
            Self::Brand(_) => TargetDimension::Brand,
            Self::Customer(_) => TargetDimension::Customer,
            Self::CustomerTier(_) => TargetDimension::CustomerTier,
        }
    }
}

/// How a rule selects products, without its id set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductTargetType {
    /// Every product
    #[default]
    AllProducts,

    /// Listed products
    SpecificProducts,

    /// Products in listed categories or their descendants
    Categories,

    /// Products of listed brands
    Brands,
}

/// How a rule selects customers, without its id set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerTargetType {
    /// Every customer
    #[default]
    AllCustomers,

    /// Listed customers
    SpecificCustomers,

    /// Customers in listed tiers
    CustomerTiers,
}

/// Product targeting of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProductTarget {
    /// Every product.
    #[default]
    AllProducts,

    /// Only the listed products.
    SpecificProducts(FxHashSet<ProductUuid>),

    /// Products whose category, or any ancestor of it, is listed.
    Categories(FxHashSet<CategoryUuid>),

    /// Products of the listed brands.
    Brands(FxHashSet<BrandUuid>),
}

impl ProductTarget {
    /// An empty target of the given type.
    pub fn empty(target_type: ProductTargetType) -> Self {
        match target_type {
            ProductTargetType::AllProducts => Self::AllProducts,
            ProductTargetType::SpecificProducts => Self::SpecificProducts(FxHashSet::default()),
            ProductTargetType::Categories => Self::Categories(FxHashSet::default()),
            ProductTargetType::Brands => Self::Brands(FxHashSet::default()),
        }
    }

    /// The target type.
    pub const fn target_type(&self) -> ProductTargetType {
        match self {
            Self::AllProducts => ProductTargetType::AllProducts,
            Self::SpecificProducts(_) => ProductTargetType::SpecificProducts,
            Self::Categories(_) => ProductTargetType::Categories,
            Self::Brands(_) => ProductTargetType::Brands,
        }
    }

    /// Name of the target type, for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AllProducts => "all products",
            Self::SpecificProducts(_) => "specific products",
            Self::Categories(_) => "categories",
            Self::Brands(_) => "brands",
        }
    }

    /// Whether the product falls inside this target.
    pub fn matches(
        &self,
        product: ProductUuid,
        category: Option<CategoryUuid>,
        category_ancestors: &[CategoryUuid],
        brand: Option<BrandUuid>,
    ) -> bool {
        match self {
            Self::AllProducts => true,
            Self::SpecificProducts(products) => products.contains(&product),
            Self::Categories(categories) => {
                category.is_some_and(|category| categories.contains(&category))
                    || category_ancestors
                        .iter()
                        .any(|ancestor| categories.contains(ancestor))
            }
            Self::Brands(brands) => brand.is_some_and(|brand| brands.contains(&brand)),
        }
    }
}

/// Customer targeting of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CustomerTarget {
    /// Every customer.
    #[default]
    AllCustomers,

    /// Only the listed customers.
    SpecificCustomers(FxHashSet<CustomerUuid>),

    /// Customers in the listed tiers.
    CustomerTiers(FxHashSet<CustomerTier>),
}

impl CustomerTarget {
    /// An empty target of the given type.
    pub fn empty(target_type: CustomerTargetType) -> Self {
        match target_type {
            CustomerTargetType::AllCustomers => Self::AllCustomers,
            CustomerTargetType::SpecificCustomers => {
                Self::SpecificCustomers(FxHashSet::default())
            }
            CustomerTargetType::CustomerTiers => Self::CustomerTiers(FxHashSet::default()),
        }
    }

    /// The target type.
    pub const fn target_type(&self) -> CustomerTargetType {
        match self {
            Self::AllCustomers => CustomerTargetType::AllCustomers,
            Self::SpecificCustomers(_) => CustomerTargetType::SpecificCustomers,
            Self::CustomerTiers(_) => CustomerTargetType::CustomerTiers,
        }
    }

    /// Name of the target type, for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AllCustomers => "all customers",
            Self::SpecificCustomers(_) => "specific customers",
            Self::CustomerTiers(_) => "customer tiers",
        }
    }

    /// Whether the customer falls inside this target.
    pub fn matches(&self, customer: CustomerUuid, tier: Option<&CustomerTier>) -> bool {
        match self {
            Self::AllCustomers => true,
            Self::SpecificCustomers(customers) => customers.contains(&customer),
            Self::CustomerTiers(tiers) => tier.is_some_and(|tier| tiers.contains(tier)),
        }
    }
}
