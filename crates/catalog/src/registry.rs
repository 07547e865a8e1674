//! In-memory catalog registry.

use std::collections::HashMap;
use std::sync::RwLock;

use farmgate_core::{DomainError, DomainResult};

use crate::enterprise::{Enterprise, EnterpriseId};
use crate::product::{Product, ProductId, TaxCategory, TaxCategoryId, Variant, VariantId};

/// Lookup tables for the catalog entities the engine reads.
///
/// Reads clone the stored row, so callers never hold the internal locks across
/// their own work.
#[derive(Debug, Default)]
pub struct Catalog {
    enterprises: RwLock<HashMap<EnterpriseId, Enterprise>>,
    products: RwLock<HashMap<ProductId, Product>>,
    variants: RwLock<HashMap<VariantId, Variant>>,
    tax_categories: RwLock<HashMap<TaxCategoryId, TaxCategory>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_enterprise(&self, enterprise: Enterprise) -> EnterpriseId {
        let id = enterprise.id;
        if let Ok(mut map) = self.enterprises.write() {
            map.insert(id, enterprise);
        }
        id
    }

    pub fn add_product(&self, product: Product) -> ProductId {
        let id = product.id;
        if let Ok(mut map) = self.products.write() {
            map.insert(id, product);
        }
        id
    }

    pub fn add_variant(&self, variant: Variant) -> VariantId {
        let id = variant.id;
        if let Ok(mut map) = self.variants.write() {
            map.insert(id, variant);
        }
        id
    }

    pub fn add_tax_category(&self, category: TaxCategory) -> TaxCategoryId {
        let id = category.id;
        if let Ok(mut map) = self.tax_categories.write() {
            map.insert(id, category);
        }
        id
    }

    pub fn enterprise(&self, id: EnterpriseId) -> Option<Enterprise> {
        self.enterprises.read().ok()?.get(&id).cloned()
    }

    pub fn product(&self, id: ProductId) -> Option<Product> {
        self.products.read().ok()?.get(&id).cloned()
    }

    pub fn variant(&self, id: VariantId) -> DomainResult<Variant> {
        self.variants
            .read()
            .map_err(|_| DomainError::conflict("catalog lock poisoned"))?
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    pub fn tax_category(&self, id: TaxCategoryId) -> Option<TaxCategory> {
        self.tax_categories.read().ok()?.get(&id).cloned()
    }

    /// Tax category of a variant, falling back to its product's.
    pub fn tax_category_for(&self, variant: &Variant) -> Option<TaxCategoryId> {
        variant
            .tax_category
            .or_else(|| self.product(variant.product)?.tax_category)
    }
}
