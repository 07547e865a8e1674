//! Products, variants and tax categories.

use farmgate_core::{DomainError, DomainResult, Entity, Money, entity_id};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enterprise::EnterpriseId;

entity_id!(
    /// Product identifier.
    ProductId
);

entity_id!(
    /// Variant identifier (the stock-keeping unit of the engine).
    VariantId
);

entity_id!(
    /// Tax category identifier.
    TaxCategoryId
);

/// Grouping that links a variant to the tax rates that may apply to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxCategory {
    pub id: TaxCategoryId,
    pub name: String,
    pub is_default: bool,
}

impl TaxCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TaxCategoryId::new(),
            name: name.into(),
            is_default: false,
        }
    }

    pub fn default_category(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Product: a named good supplied by an enterprise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub supplier: EnterpriseId,
    pub tax_category: Option<TaxCategoryId>,
}

impl Product {
    pub fn new(name: impl Into<String>, supplier: EnterpriseId) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        Ok(Self {
            id: ProductId::new(),
            name,
            supplier,
            tax_category: None,
        })
    }

    pub fn with_tax_category(mut self, category: TaxCategoryId) -> Self {
        self.tax_category = Some(category);
        self
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A sellable variant of a product.
///
/// Carries the master price and per-unit weight the engine snapshots onto line
/// items. The tax category falls back to the product's when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product: ProductId,
    pub sku: String,
    pub price: Money,
    pub tax_category: Option<TaxCategoryId>,
    /// Per-unit weight, used by weight-based calculators.
    pub weight: Decimal,
}

impl Variant {
    pub fn new(product: ProductId, sku: impl Into<String>, price: Money) -> DomainResult<Self> {
        let sku = sku.into();
        if sku.trim().is_empty() {
            return Err(DomainError::validation("variant sku cannot be empty"));
        }
        if price.is_negative() {
            return Err(DomainError::validation("variant price cannot be negative"));
        }
        Ok(Self {
            id: VariantId::new(),
            product,
            sku,
            price,
            tax_category: None,
            weight: Decimal::ZERO,
        })
    }

    pub fn with_tax_category(mut self, category: TaxCategoryId) -> Self {
        self.tax_category = Some(category);
        self
    }

    pub fn with_weight(mut self, weight: Decimal) -> Self {
        self.weight = weight;
        self
    }
}

impl Entity for Variant {
    type Id = VariantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_supplier() -> EnterpriseId {
        EnterpriseId::new()
    }

    #[test]
    fn product_requires_a_name() {
        let err = Product::new("   ", test_supplier()).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("name") => {}
            _ => panic!("Expected validation error for empty name"),
        }
    }

    #[test]
    fn variant_rejects_negative_price() {
        let product = Product::new("Sourdough", test_supplier()).unwrap();
        let err = Variant::new(product.id, "LOAF", Money::new(dec!(-1.00))).unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("price") => {}
            _ => panic!("Expected validation error for negative price"),
        }
    }

    #[test]
    fn variant_carries_tax_category_and_weight() {
        let product = Product::new("Sourdough", test_supplier()).unwrap();
        let category = TaxCategory::new("Food");
        let variant = Variant::new(product.id, "LOAF", Money::from_cents(650))
            .unwrap()
            .with_tax_category(category.id)
            .with_weight(dec!(0.8));
        assert_eq!(variant.tax_category, Some(category.id));
        assert_eq!(variant.weight, dec!(0.8));
    }
}
