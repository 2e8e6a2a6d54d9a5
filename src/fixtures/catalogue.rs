//! Catalogue Fixtures
//!
//! Categories, products and customers are declared by name; loading assigns
//! each a fresh typed id and resolves category ancestor chains.

use rustc_hash::FxHashMap;
use serde::Deserialize;
use smallvec::SmallVec;

use crate::{
    fixtures::FixtureError,
    ids::{BrandUuid, CampaignUuid, CategoryUuid, CustomerUuid, ProductUuid},
    rules::targeting::{CustomerTier, ProductContext},
};

/// Category fixture from YAML
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryFixture {
    /// Parent category name
    #[serde(default)]
    pub parent: Option<String>,
}

/// Product fixture from YAML
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductFixture {
    /// Category name
    #[serde(default)]
    pub category: Option<String>,

    /// Brand name
    #[serde(default)]
    pub brand: Option<String>,
}

/// Customer fixture from YAML
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerFixture {
    /// Loyalty tier
    #[serde(default)]
    pub tier: Option<CustomerTier>,
}

/// A customer loaded from a fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureCustomer {
    /// Generated id
    pub uuid: CustomerUuid,

    /// Declared tier
    pub tier: Option<CustomerTier>,
}

/// Fixture names resolved to generated ids.
#[derive(Debug, Default)]
pub struct Catalogue {
    categories: FxHashMap<String, CategoryUuid>,
    brands: FxHashMap<String, BrandUuid>,
    products: FxHashMap<String, ProductContext>,
    customers: FxHashMap<String, FixtureCustomer>,
    campaigns: FxHashMap<String, CampaignUuid>,
}

impl Catalogue {
    pub(super) fn build(
        categories: &FxHashMap<String, CategoryFixture>,
        products: &FxHashMap<String, ProductFixture>,
        customers: &FxHashMap<String, CustomerFixture>,
    ) -> Result<Self, FixtureError> {
        let mut catalogue = Self {
            categories: categories
                .keys()
                .map(|name| (name.clone(), CategoryUuid::new()))
                .collect(),
            ..Self::default()
        };

        for category in categories.values() {
            if let Some(parent) = &category.parent {
                catalogue.category(parent)?;
            }
        }

        for (name, product) in products {
            let mut context = ProductContext::new(ProductUuid::new());

            if let Some(category) = &product.category {
                let ancestors = catalogue.ancestors(categories, category)?;

                context = context.with_category(catalogue.category(category)?, ancestors);
            }

            if let Some(brand) = &product.brand {
                let uuid = *catalogue
                    .brands
                    .entry(brand.clone())
                    .or_insert_with(BrandUuid::new);

                context = context.with_brand(uuid);
            }

            catalogue.products.insert(name.clone(), context);
        }

        catalogue.customers = customers
            .iter()
            .map(|(name, customer)| {
                (
                    name.clone(),
                    FixtureCustomer {
                        uuid: CustomerUuid::new(),
                        tier: customer.tier.clone(),
                    },
                )
            })
            .collect();

        Ok(catalogue)
    }

    /// Ancestors of `name`, nearest first.
    fn ancestors(
        &self,
        categories: &FxHashMap<String, CategoryFixture>,
        name: &str,
    ) -> Result<SmallVec<[CategoryUuid; 4]>, FixtureError> {
        let mut chain = SmallVec::new();
        let mut parent = categories.get(name).and_then(|c| c.parent.as_deref());

        while let Some(current) = parent {
            if chain.len() >= categories.len() {
                return Err(FixtureError::CategoryCycle(name.to_string()));
            }

            chain.push(self.category(current)?);
            parent = categories.get(current).and_then(|c| c.parent.as_deref());
        }

        Ok(chain)
    }

    pub(super) fn register_campaign(&mut self, name: &str, uuid: CampaignUuid) {
        self.campaigns.insert(name.to_string(), uuid);
    }

    /// A category id by name.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::UnknownCategory`] for an undeclared name.
    pub fn category(&self, name: &str) -> Result<CategoryUuid, FixtureError> {
        self.categories
            .get(name)
            .copied()
            .ok_or_else(|| FixtureError::UnknownCategory(name.to_string()))
    }

    /// A brand id by name. Brands are declared by the products using them.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::UnknownBrand`] if no product has the brand.
    pub fn brand(&self, name: &str) -> Result<BrandUuid, FixtureError> {
        self.brands
            .get(name)
            .copied()
            .ok_or_else(|| FixtureError::UnknownBrand(name.to_string()))
    }

    /// A product with its category chain and brand.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::UnknownProduct`] for an undeclared name.
    pub fn product(&self, name: &str) -> Result<&ProductContext, FixtureError> {
        self.products
            .get(name)
            .ok_or_else(|| FixtureError::UnknownProduct(name.to_string()))
    }

    /// A customer and their tier.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::UnknownCustomer`] for an undeclared name.
    pub fn customer(&self, name: &str) -> Result<&FixtureCustomer, FixtureError> {
        self.customers
            .get(name)
            .ok_or_else(|| FixtureError::UnknownCustomer(name.to_string()))
    }

    /// A seeded campaign id by fixture key.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::UnknownCampaign`] for an undeclared key.
    pub fn campaign(&self, name: &str) -> Result<CampaignUuid, FixtureError> {
        self.campaigns
            .get(name)
            .copied()
            .ok_or_else(|| FixtureError::UnknownCampaign(name.to_string()))
    }

    /// The fixture key a campaign was seeded under.
    pub fn campaign_name(&self, uuid: CampaignUuid) -> Option<&str> {
        self.campaigns
            .iter()
            .find_map(|(name, candidate)| (*candidate == uuid).then_some(name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn categories(pairs: &[(&str, Option<&str>)]) -> FxHashMap<String, CategoryFixture> {
        pairs
            .iter()
            .map(|(name, parent)| {
                (
                    (*name).to_string(),
                    CategoryFixture {
                        parent: parent.map(str::to_string),
                    },
                )
            })
            .collect()
    }

    fn product(category: Option<&str>, brand: Option<&str>) -> ProductFixture {
        ProductFixture {
            category: category.map(str::to_string),
            brand: brand.map(str::to_string),
        }
    }

    #[test]
    fn resolves_ancestor_chain_nearest_first() -> TestResult {
        let categories = categories(&[
            ("electronics", None),
            ("computers", Some("electronics")),
            ("laptops", Some("computers")),
        ]);

        let mut products = FxHashMap::default();
        products.insert("ultrabook".to_string(), product(Some("laptops"), Some("acme")));

        let catalogue = Catalogue::build(&categories, &products, &FxHashMap::default())?;
        let ultrabook = catalogue.product("ultrabook")?;

        assert_eq!(ultrabook.category, Some(catalogue.category("laptops")?));
        assert_eq!(
            ultrabook.category_ancestors.as_slice(),
            &[
                catalogue.category("computers")?,
                catalogue.category("electronics")?
            ]
        );
        assert_eq!(ultrabook.brand, Some(catalogue.brand("acme")?));

        Ok(())
    }

    #[test]
    fn rejects_unknown_parent() {
        let categories = categories(&[("laptops", Some("missing"))]);

        let result = Catalogue::build(&categories, &FxHashMap::default(), &FxHashMap::default());

        assert!(matches!(result, Err(FixtureError::UnknownCategory(name)) if name == "missing"));
    }

    #[test]
    fn rejects_category_cycles() {
        let categories = categories(&[("a", Some("b")), ("b", Some("a"))]);

        let mut products = FxHashMap::default();
        products.insert("widget".to_string(), product(Some("a"), None));

        let result = Catalogue::build(&categories, &products, &FxHashMap::default());

        assert!(matches!(result, Err(FixtureError::CategoryCycle(_))));
    }

    #[test]
    fn unknown_names_are_errors() -> TestResult {
        let catalogue = Catalogue::build(
            &FxHashMap::default(),
            &FxHashMap::default(),
            &FxHashMap::default(),
        )?;

        assert!(matches!(
            catalogue.product("nope"),
            Err(FixtureError::UnknownProduct(_))
        ));
        assert!(matches!(
            catalogue.customer("nope"),
            Err(FixtureError::UnknownCustomer(_))
        ));
        assert!(matches!(
            catalogue.brand("nope"),
            Err(FixtureError::UnknownBrand(_))
        ));

        Ok(())
    }
}
