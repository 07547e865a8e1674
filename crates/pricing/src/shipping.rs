//! Shipping methods and their fee calculators.

use std::sync::Arc;

use farmgate_core::{Money, entity_id};

use crate::calculator::{Calculator, ChargeBasis};

entity_id!(
    /// Shipping method identifier.
    ShippingMethodId
);

/// A way of delivering a shipment, pricing itself via a [`Calculator`].
#[derive(Debug, Clone)]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub name: String,
    pub calculator: Arc<dyn Calculator>,
    pub require_ship_address: bool,
}

impl ShippingMethod {
    pub fn new(name: impl Into<String>, calculator: Arc<dyn Calculator>) -> Self {
        Self {
            id: ShippingMethodId::new(),
            name: name.into(),
            calculator,
            require_ship_address: true,
        }
    }

    pub fn pickup(mut self) -> Self {
        self.require_ship_address = false;
        self
    }

    pub fn compute(&self, basis: &ChargeBasis) -> Money {
        self.calculator.compute(basis)
    }

    pub fn label(&self) -> String {
        format!("Shipping ({})", self.name)
    }
}
