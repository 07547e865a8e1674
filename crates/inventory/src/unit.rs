//! Inventory units: one record per ordered item instance.

use chrono::{DateTime, Utc};
use farmgate_catalog::VariantId;
use farmgate_core::{DomainError, DomainResult, Entity, entity_id};
use serde::{Deserialize, Serialize};

entity_id!(
    /// Inventory unit identifier.
    InventoryUnitId
);

/// Lifecycle of a single ordered unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryUnitState {
    OnHand,
    Backordered,
    Shipped,
    Returned,
}

impl core::fmt::Display for InventoryUnitState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            InventoryUnitState::OnHand => "on_hand",
            InventoryUnitState::Backordered => "backordered",
            InventoryUnitState::Shipped => "shipped",
            InventoryUnitState::Returned => "returned",
        };
        f.write_str(s)
    }
}

/// One physical (or promised) unit allocated to an order.
///
/// Units are owned by their shipment; the order/shipment relation is the
/// ownership edge, not a stored foreign key. Ordering for oldest-first
/// backorder fulfillment uses `(created_at, id)`; ids are time-ordered
/// UUIDv7, so the pair is a stable tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUnit {
    pub id: InventoryUnitId,
    pub variant: VariantId,
    pub state: InventoryUnitState,
    pub created_at: DateTime<Utc>,
}

impl InventoryUnit {
    pub fn on_hand(variant: VariantId) -> Self {
        Self::new(variant, InventoryUnitState::OnHand)
    }

    pub fn backordered(variant: VariantId) -> Self {
        Self::new(variant, InventoryUnitState::Backordered)
    }

    fn new(variant: VariantId, state: InventoryUnitState) -> Self {
        Self {
            id: InventoryUnitId::new(),
            variant,
            state,
            created_at: Utc::now(),
        }
    }

    fn transition(&mut self, to: InventoryUnitState) -> DomainResult<()> {
        use InventoryUnitState::*;
        let legal = matches!(
            (self.state, to),
            (OnHand, Shipped) | (Backordered, OnHand) | (Shipped, Returned)
        );
        if !legal {
            return Err(DomainError::transition("inventory unit", self.state, to));
        }
        self.state = to;
        Ok(())
    }

    /// Backordered → OnHand, when stock becomes available.
    pub fn fill_backorder(&mut self) -> DomainResult<()> {
        self.transition(InventoryUnitState::OnHand)
    }

    /// OnHand → Shipped, via shipment finalize.
    pub fn ship(&mut self) -> DomainResult<()> {
        self.transition(InventoryUnitState::Shipped)
    }

    /// Shipped → Returned, via return authorization.
    pub fn return_unit(&mut self) -> DomainResult<()> {
        self.transition(InventoryUnitState::Returned)
    }

    pub fn is_backordered(&self) -> bool {
        self.state == InventoryUnitState::Backordered
    }

    pub fn is_shipped(&self) -> bool {
        self.state == InventoryUnitState::Shipped
    }

    /// Counts toward the order's allocation (everything but returned).
    pub fn counts_for_allocation(&self) -> bool {
        self.state != InventoryUnitState::Returned
    }
}

impl Entity for InventoryUnit {
    type Id = InventoryUnitId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
