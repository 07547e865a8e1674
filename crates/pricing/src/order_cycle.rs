//! Distribution cycles: the time-boxed windows in which suppliers' stock is
//! available to distributor hubs, and the fees that apply inside them.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use farmgate_catalog::{EnterpriseId, VariantId};
use farmgate_core::entity_id;

use crate::enterprise_fee::EnterpriseFee;

entity_id!(
    /// Distribution cycle identifier.
    OrderCycleId
);

/// A distribution cycle.
///
/// Supplies a set of variants and carries the enterprise fees charged on line
/// items of those variants plus the fees charged once per order.
#[derive(Debug, Clone)]
pub struct OrderCycle {
    pub id: OrderCycleId,
    pub name: String,
    pub coordinator: EnterpriseId,
    pub orders_open_at: DateTime<Utc>,
    pub orders_close_at: DateTime<Utc>,
    pub variants: HashSet<VariantId>,
    pub line_item_fees: Vec<Arc<EnterpriseFee>>,
    pub order_fees: Vec<Arc<EnterpriseFee>>,
}

impl OrderCycle {
    pub fn new(
        name: impl Into<String>,
        coordinator: EnterpriseId,
        orders_open_at: DateTime<Utc>,
        orders_close_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderCycleId::new(),
            name: name.into(),
            coordinator,
            orders_open_at,
            orders_close_at,
            variants: HashSet::new(),
            line_item_fees: Vec::new(),
            order_fees: Vec::new(),
        }
    }

    pub fn with_variant(mut self, variant: VariantId) -> Self {
        self.variants.insert(variant);
        self
    }

    pub fn with_line_item_fee(mut self, fee: Arc<EnterpriseFee>) -> Self {
        self.line_item_fees.push(fee);
        self
    }

    pub fn with_order_fee(mut self, fee: Arc<EnterpriseFee>) -> Self {
        self.order_fees.push(fee);
        self
    }

    pub fn open_at(&self, now: DateTime<Utc>) -> bool {
        self.orders_open_at <= now && now < self.orders_close_at
    }

    /// Whether the cycle supplies this variant.
    pub fn supplies(&self, variant: VariantId) -> bool {
        self.variants.contains(&variant)
    }
}
