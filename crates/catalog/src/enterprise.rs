//! Enterprises: the suppliers and distributor hubs of the marketplace.

use farmgate_core::{Entity, entity_id};
use serde::{Deserialize, Serialize};

entity_id!(
    /// Enterprise identifier (supplier or distributor hub).
    EnterpriseId
);

/// A supplier or distributor hub.
///
/// Only the attributes the fulfillment engine reads are modeled; profile and
/// storefront data live with the catalog-management collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enterprise {
    pub id: EnterpriseId,
    pub name: String,
    /// Distributors that do not charge sales tax short-circuit tax matching.
    pub charges_sales_tax: bool,
}

impl Enterprise {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EnterpriseId::new(),
            name: name.into(),
            charges_sales_tax: true,
        }
    }

    pub fn without_sales_tax(mut self) -> Self {
        self.charges_sales_tax = false;
        self
    }
}

impl Entity for Enterprise {
    type Id = EnterpriseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
