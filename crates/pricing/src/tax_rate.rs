//! Tax rates: zone-scoped percentage rules with inclusive/exclusive semantics.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use farmgate_catalog::TaxCategoryId;
use farmgate_core::{Money, entity_id};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::zone::Zone;

entity_id!(
    /// Tax rate identifier.
    TaxRateId
);

/// A percentage tax rule attached to a zone and a tax category.
///
/// `amount` is the rate as a fraction (`0.10` = 10%). Inclusive rates describe
/// tax already embedded in the displayed price; exclusive rates add on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxRate {
    pub id: TaxRateId,
    pub name: String,
    pub amount: Decimal,
    pub zone: Arc<Zone>,
    pub tax_category: TaxCategoryId,
    pub included_in_price: bool,
    pub show_rate_in_label: bool,
    pub created_at: DateTime<Utc>,
}

impl TaxRate {
    pub fn new(
        name: impl Into<String>,
        amount: Decimal,
        zone: Arc<Zone>,
        tax_category: TaxCategoryId,
    ) -> Self {
        Self {
            id: TaxRateId::new(),
            name: name.into(),
            amount,
            zone,
            tax_category,
            included_in_price: false,
            show_rate_in_label: true,
            created_at: Utc::now(),
        }
    }

    pub fn inclusive(mut self) -> Self {
        self.included_in_price = true;
        self
    }

    pub fn without_rate_in_label(mut self) -> Self {
        self.show_rate_in_label = false;
        self
    }

    /// Tax on a pre-computed basis amount.
    ///
    /// Exclusive: `amount * rate`, added on top of the price.
    /// Inclusive: the tax portion already inside the price,
    /// `amount - amount / (1 + rate)`.
    pub fn compute_tax(&self, basis: Money) -> Money {
        if self.included_in_price {
            basis - Money::new(basis.amount() / (Decimal::ONE + self.amount))
        } else {
            basis * self.amount
        }
    }

    /// Human-readable adjustment label.
    ///
    /// `refund` marks the negated inclusive-tax case (out-of-zone sale of an
    /// inclusive-price item). `category_name` substitutes when the rate has no
    /// name of its own.
    pub fn label(&self, refund: bool, category_name: Option<&str>) -> String {
        let mut label = String::new();
        if refund {
            label.push_str("Refund ");
        }
        if self.name.is_empty() {
            label.push_str(category_name.unwrap_or("Tax"));
        } else {
            label.push_str(&self.name);
        }
        if self.show_rate_in_label {
            let percent = self.amount * Decimal::ONE_HUNDRED;
            label.push_str(&format!(" {}%", percent.normalize()));
        }
        if self.included_in_price {
            label.push_str(" (included in price)");
        }
        label
    }
}
