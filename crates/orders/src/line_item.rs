//! Line items: a priced quantity of one variant.

use farmgate_catalog::{TaxCategoryId, Variant, VariantId};
use farmgate_core::{DomainError, DomainResult, Entity, Money, entity_id};
use farmgate_pricing::ChargeBasis;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

entity_id!(
    /// Line item identifier.
    LineItemId
);

/// A quantity of one variant on an order.
///
/// `price` is captured at add time (after hub scoping) and never re-read from
/// the catalog, so later price changes leave existing orders untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub variant: VariantId,
    pub quantity: i64,
    pub price: Money,
    pub tax_category: Option<TaxCategoryId>,
    /// Per-unit weight, for weight-based calculators.
    pub weight: Decimal,
}

impl LineItem {
    pub fn new(
        variant: &Variant,
        price: Money,
        tax_category: Option<TaxCategoryId>,
        quantity: i64,
    ) -> DomainResult<Self> {
        if quantity < 1 {
            return Err(DomainError::validation(
                "line item quantity must be at least 1",
            ));
        }
        Ok(Self {
            id: LineItemId::new(),
            variant: variant.id,
            quantity,
            price,
            tax_category,
            weight: variant.weight,
        })
    }

    /// Extended price: unit price times quantity.
    pub fn amount(&self) -> Money {
        self.price.times(self.quantity)
    }

    pub fn set_quantity(&mut self, quantity: i64) -> DomainResult<()> {
        if quantity < 0 {
            return Err(DomainError::validation(
                "line item quantity cannot be negative",
            ));
        }
        self.quantity = quantity;
        Ok(())
    }

    pub fn charge_basis(&self) -> ChargeBasis {
        ChargeBasis::LineItem {
            quantity: self.quantity,
            price: self.price,
            amount: self.amount(),
            weight: self.weight * Decimal::from(self.quantity),
        }
    }
}

impl Entity for LineItem {
    type Id = LineItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
