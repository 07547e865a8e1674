//! Shipments: the delivery grouping of an order's inventory units.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use farmgate_catalog::VariantId;
use farmgate_core::{DomainError, DomainResult, Entity, Money, entity_id};
use farmgate_inventory::{InventoryUnit, InventoryUnitState};
use farmgate_pricing::ShippingMethod;

entity_id!(
    /// Shipment identifier.
    ShipmentId
);

/// Lifecycle of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentState {
    Pending,
    Ready,
    Shipped,
    Canceled,
}

impl core::fmt::Display for ShipmentState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            ShipmentState::Pending => "pending",
            ShipmentState::Ready => "ready",
            ShipmentState::Shipped => "shipped",
            ShipmentState::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// The order facts shipment state is derived from.
///
/// Passed by value so state sync never needs a second borrow of the order.
#[derive(Debug, Clone, Copy)]
pub struct OrderContext {
    pub canceled: bool,
    pub completed: bool,
    pub paid: bool,
}

/// A delivery of inventory units, costed by a shipping method.
#[derive(Debug, Clone)]
pub struct Shipment {
    pub id: ShipmentId,
    pub number: String,
    pub state: ShipmentState,
    pub units: Vec<InventoryUnit>,
    pub shipping_method: Option<Arc<ShippingMethod>>,
    /// Current shipping charge, mirrored from the shipping fee adjustment.
    pub cost: Money,
    /// Non-tax adjustments scoped to this shipment.
    pub adjustment_total: Money,
    pub included_tax_total: Money,
    pub additional_tax_total: Money,
    pub shipped_at: Option<DateTime<Utc>>,
    pub tracking: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Shipment {
    pub fn new() -> Self {
        let id = ShipmentId::new();
        Self {
            id,
            number: Self::generate_number(id),
            state: ShipmentState::Pending,
            units: Vec::new(),
            shipping_method: None,
            cost: Money::zero(),
            adjustment_total: Money::zero(),
            included_tax_total: Money::zero(),
            additional_tax_total: Money::zero(),
            shipped_at: None,
            tracking: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_method(mut self, method: Arc<ShippingMethod>) -> Self {
        self.shipping_method = Some(method);
        self
    }

    // Human-facing shipment number, derived from the time-ordered id.
    fn generate_number(id: ShipmentId) -> String {
        let digits: String = id
            .to_string()
            .chars()
            .filter(|c| c.is_ascii_hexdigit())
            .take(11)
            .collect();
        format!("H{}", digits.to_uppercase())
    }

    fn transition(&mut self, to: ShipmentState) -> DomainResult<()> {
        use ShipmentState::*;
        let legal = matches!(
            (self.state, to),
            (Pending, Ready)
                | (Pending, Canceled)
                | (Ready, Pending)
                | (Ready, Shipped)
                | (Ready, Canceled)
                | (Canceled, Pending)
                | (Canceled, Ready)
        );
        if !legal {
            return Err(DomainError::transition("shipment", self.state, to));
        }
        self.state = to;
        Ok(())
    }

    pub fn is_shipped(&self) -> bool {
        self.state == ShipmentState::Shipped
    }

    pub fn is_canceled(&self) -> bool {
        self.state == ShipmentState::Canceled
    }

    /// Any unit still waiting on stock.
    pub fn backordered(&self) -> bool {
        self.units.iter().any(InventoryUnit::is_backordered)
    }

    /// Units of `variant` still counting toward the order's allocation.
    pub fn units_for(&self, variant: VariantId) -> i64 {
        self.units
            .iter()
            .filter(|u| u.variant == variant && u.counts_for_allocation())
            .count() as i64
    }

    /// On-hand unit counts per variant; the quantities a finalize or cancel
    /// books against the stock ledger.
    pub fn on_hand_counts(&self) -> HashMap<VariantId, i64> {
        let mut counts = HashMap::new();
        for unit in &self.units {
            if unit.state == InventoryUnitState::OnHand {
                *counts.entry(unit.variant).or_insert(0) += 1;
            }
        }
        counts
    }

    /// The state this shipment should be in given the order's current facts.
    ///
    /// Shipped is sticky; an order-level cancel does not un-ship goods that
    /// already left the building.
    pub fn determine_state(&self, order: &OrderContext) -> ShipmentState {
        if self.is_shipped() {
            return ShipmentState::Shipped;
        }
        if order.canceled {
            return ShipmentState::Canceled;
        }
        if !order.completed || self.backordered() {
            return ShipmentState::Pending;
        }
        if order.paid {
            ShipmentState::Ready
        } else {
            ShipmentState::Pending
        }
    }

    /// Move to the derived state, if it differs. Returns whether it changed.
    pub fn sync_state(&mut self, order: &OrderContext) -> DomainResult<bool> {
        let target = self.determine_state(order);
        if target == self.state {
            return Ok(false);
        }
        self.transition(target)?;
        Ok(true)
    }

    /// Ship: every unit goes out the door and the timestamp is recorded.
    ///
    /// Only a ready shipment may ship; a backordered unit in a ready shipment
    /// is an upstream bookkeeping failure and surfaces as a unit transition
    /// error here.
    pub fn ship(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition(ShipmentState::Shipped)?;
        for unit in &mut self.units {
            unit.ship()?;
        }
        self.shipped_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        self.transition(ShipmentState::Canceled)
    }
}

impl Default for Shipment {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_variant_id() -> VariantId {
        VariantId::new()
    }

    fn complete_paid() -> OrderContext {
        OrderContext {
            canceled: false,
            completed: true,
            paid: true,
        }
    }

    #[test]
    fn number_is_prefixed_and_stable() {
        let shipment = Shipment::new();
        assert!(shipment.number.starts_with('H'));
        assert_eq!(shipment.number.len(), 12);
    }

    #[test]
    fn pending_until_order_completes_and_pays() {
        let variant = test_variant_id();
        let mut shipment = Shipment::new();
        shipment.units.push(InventoryUnit::on_hand(variant));

        let mut ctx = complete_paid();
        ctx.completed = false;
        assert_eq!(shipment.determine_state(&ctx), ShipmentState::Pending);

        ctx.completed = true;
        ctx.paid = false;
        assert_eq!(shipment.determine_state(&ctx), ShipmentState::Pending);

        assert_eq!(shipment.determine_state(&complete_paid()), ShipmentState::Ready);
    }

    #[test]
    fn backordered_unit_holds_shipment_pending() {
        let variant = test_variant_id();
        let mut shipment = Shipment::new();
        shipment.units.push(InventoryUnit::backordered(variant));

        assert_eq!(
            shipment.determine_state(&complete_paid()),
            ShipmentState::Pending
        );

        shipment.units[0].fill_backorder().unwrap();
        assert_eq!(
            shipment.determine_state(&complete_paid()),
            ShipmentState::Ready
        );
    }

    #[test]
    fn shipped_is_sticky_through_order_cancel() {
        let variant = test_variant_id();
        let mut shipment = Shipment::new();
        shipment.units.push(InventoryUnit::on_hand(variant));
        shipment.sync_state(&complete_paid()).unwrap();
        shipment.ship(Utc::now()).unwrap();

        let ctx = OrderContext {
            canceled: true,
            completed: true,
            paid: true,
        };
        assert_eq!(shipment.determine_state(&ctx), ShipmentState::Shipped);
        assert!(!shipment.sync_state(&ctx).unwrap());
    }

    #[test]
    fn ship_moves_every_unit_and_stamps_time() {
        let variant = test_variant_id();
        let mut shipment = Shipment::new();
        shipment.units.push(InventoryUnit::on_hand(variant));
        shipment.units.push(InventoryUnit::on_hand(variant));
        shipment.sync_state(&complete_paid()).unwrap();

        shipment.ship(Utc::now()).unwrap();
        assert!(shipment.units.iter().all(InventoryUnit::is_shipped));
        assert!(shipment.shipped_at.is_some());
    }

    #[test]
    fn pending_shipment_cannot_ship() {
        let mut shipment = Shipment::new();
        let err = shipment.ship(Utc::now()).unwrap_err();
        match err {
            DomainError::IllegalTransition { entity, from, to } => {
                assert_eq!(entity, "shipment");
                assert_eq!(from, "pending");
                assert_eq!(to, "shipped");
            }
            _ => panic!("Expected IllegalTransition"),
        }
    }

    #[test]
    fn canceled_shipment_can_resume() {
        let mut shipment = Shipment::new();
        shipment.cancel().unwrap();
        assert!(shipment.sync_state(&complete_paid()).unwrap());
        assert_eq!(shipment.state, ShipmentState::Ready);
    }
}
