//! Payment methods and their optional transaction fees.

use std::sync::Arc;

use farmgate_core::{Money, entity_id};

use crate::calculator::{Calculator, ChargeBasis};

entity_id!(
    /// Payment method identifier.
    PaymentMethodId
);

/// A way of paying for an order.
///
/// Gateway interaction is external; the engine only needs the optional
/// transaction-fee calculator and the method's identity.
#[derive(Debug, Clone)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
    pub calculator: Option<Arc<dyn Calculator>>,
}

impl PaymentMethod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PaymentMethodId::new(),
            name: name.into(),
            calculator: None,
        }
    }

    pub fn with_fee(mut self, calculator: Arc<dyn Calculator>) -> Self {
        self.calculator = Some(calculator);
        self
    }

    /// Transaction fee for the given basis, if the method charges one.
    pub fn compute_fee(&self, basis: &ChargeBasis) -> Option<Money> {
        self.calculator.as_ref().map(|c| c.compute(basis))
    }

    pub fn fee_label(&self) -> String {
        format!("{} transaction fee", self.name)
    }
}
