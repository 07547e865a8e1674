//! Inventory allocation: keeping an order's inventory units in lockstep with
//! its line item quantities, and booking the matching stock movements.

use farmgate_catalog::{Catalog, StockScoper, StockSnapshot, VariantId};
use farmgate_core::{DomainError, DomainResult, EngineConfig};
use farmgate_inventory::{
    BackorderQueue, InventoryUnit, InventoryUnitState, NoBackorders, StockLedger,
};
use tracing::debug;

use crate::order::Order;
use crate::shipment::{Shipment, ShipmentId};

/// How a desired quantity splits against available stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillPlan {
    pub on_hand: i64,
    pub backordered: i64,
    /// Stock movements book against the hub override, not the shared ledger.
    pub overridden: bool,
}

/// Reconciles inventory units with line item quantities.
///
/// Borrow-only view over the engine's shared services; the reconciler builds
/// one per operation.
pub struct InventoryAllocator<'a> {
    config: &'a EngineConfig,
    catalog: &'a Catalog,
    stock: &'a StockLedger,
    scoper: &'a dyn StockScoper,
}

impl<'a> InventoryAllocator<'a> {
    pub fn new(
        config: &'a EngineConfig,
        catalog: &'a Catalog,
        stock: &'a StockLedger,
        scoper: &'a dyn StockScoper,
    ) -> Self {
        Self {
            config,
            catalog,
            stock,
            scoper,
        }
    }

    /// Split `desired` units of a variant into on-hand and backordered, as
    /// seen through the order's hub.
    ///
    /// Errors with `InsufficientStock` when the shortfall cannot be
    /// backordered.
    pub fn plan_fill(
        &self,
        order: &Order,
        variant: VariantId,
        desired: i64,
    ) -> DomainResult<FillPlan> {
        if !self.config.track_inventory {
            return Ok(FillPlan {
                on_hand: desired,
                backordered: 0,
                overridden: false,
            });
        }
        let scoped = self.scoped_snapshot(order, variant)?;
        let on_hand = desired.min(scoped.on_hand.max(0));
        let backordered = desired - on_hand;
        if backordered > 0 && !scoped.backorderable {
            return Err(DomainError::insufficient_stock(format!(
                "variant {variant}: {} on hand, {desired} requested",
                scoped.on_hand
            )));
        }
        Ok(FillPlan {
            on_hand,
            backordered,
            overridden: scoped.overridden,
        })
    }

    fn scoped_snapshot(&self, order: &Order, variant: VariantId) -> DomainResult<StockSnapshot> {
        let variant = self.catalog.variant(variant)?;
        let base = self.stock.snapshot(&variant)?;
        Ok(self.scoper.scope(order.distributor, &variant, base))
    }

    /// Bring the order's units for one line item in line with its quantity.
    ///
    /// No-op before checkout completes unless a target shipment is named:
    /// carts carry no units, the proposed shipment is built at checkout.
    /// Growth allocates into the target shipment (or the first open shipment
    /// already carrying the variant, or a new one) and, for a completed
    /// order, decrements stock for the on-hand portion. Shrink removes
    /// backordered units first, never touches shipped shipments, and
    /// restocks only what was actually held on hand.
    pub fn reconcile(
        &self,
        order: &mut Order,
        line_item_id: crate::line_item::LineItemId,
        target: Option<ShipmentId>,
        restock: bool,
        backorders: &dyn BackorderQueue,
    ) -> DomainResult<()> {
        if !order.is_complete() && target.is_none() {
            return Ok(());
        }
        let li = order.line_item(line_item_id)?;
        let (variant, desired) = (li.variant, li.quantity);
        let have = order.unit_count_for(variant);

        if desired > have {
            self.grow(order, variant, desired - have, target)?;
        } else if desired < have {
            self.shrink(order, variant, have - desired, target, restock, backorders)?;
        }
        Ok(())
    }

    fn grow(
        &self,
        order: &mut Order,
        variant: VariantId,
        delta: i64,
        target: Option<ShipmentId>,
    ) -> DomainResult<()> {
        let plan = self.plan_fill(order, variant, delta)?;

        // Book the decrement before any unit exists. The planned snapshot can
        // go stale under a concurrent checkout; if the booking then fails the
        // order must be untouched, or a later shrink would restock units
        // that never left the shelf.
        if order.is_complete() && self.config.track_inventory && plan.on_hand > 0 {
            self.book_movement(order, variant, -plan.on_hand, plan.overridden, &NoBackorders)?;
        }

        let shipment_id = self.resolve_shipment(order, variant, target);
        let shipment = order.shipment_mut(shipment_id)?;
        for _ in 0..plan.on_hand {
            shipment.units.push(InventoryUnit::on_hand(variant));
        }
        for _ in 0..plan.backordered {
            shipment.units.push(InventoryUnit::backordered(variant));
        }
        debug!(
            order = %order.id,
            %variant,
            on_hand = plan.on_hand,
            backordered = plan.backordered,
            "allocated units"
        );
        Ok(())
    }

    fn resolve_shipment(
        &self,
        order: &mut Order,
        variant: VariantId,
        target: Option<ShipmentId>,
    ) -> ShipmentId {
        if let Some(id) = target {
            return id;
        }
        let open = |s: &Shipment| !s.is_shipped() && !s.is_canceled();
        if let Some(s) = order
            .shipments
            .iter()
            .find(|s| open(s) && s.units_for(variant) > 0)
        {
            return s.id;
        }
        if let Some(s) = order.shipments.iter().find(|s| open(s)) {
            return s.id;
        }
        let shipment = Shipment::new();
        let id = shipment.id;
        order.shipments.push(shipment);
        id
    }

    fn shrink(
        &self,
        order: &mut Order,
        variant: VariantId,
        excess: i64,
        target: Option<ShipmentId>,
        restock: bool,
        backorders: &dyn BackorderQueue,
    ) -> DomainResult<()> {
        let shipment_ids: Vec<ShipmentId> = match target {
            Some(id) => vec![id],
            None => order.shipments.iter().map(|s| s.id).collect(),
        };

        let mut remaining = excess;
        let mut removed_on_hand = 0;
        let mut touched = Vec::new();
        // Backordered units go first: they represent nothing physical yet.
        for state in [InventoryUnitState::Backordered, InventoryUnitState::OnHand] {
            for &sid in &shipment_ids {
                let shipment = order.shipment_mut(sid)?;
                if shipment.is_shipped() {
                    continue;
                }
                while remaining > 0 {
                    let Some(pos) = shipment
                        .units
                        .iter()
                        .position(|u| u.variant == variant && u.state == state)
                    else {
                        break;
                    };
                    shipment.units.remove(pos);
                    remaining -= 1;
                    if state == InventoryUnitState::OnHand {
                        removed_on_hand += 1;
                    }
                    if !touched.contains(&sid) {
                        touched.push(sid);
                    }
                }
            }
        }

        // A shipment emptied by the removal has nothing left to deliver.
        order
            .shipments
            .retain(|s| !(touched.contains(&s.id) && s.units.is_empty()));

        if restock
            && removed_on_hand > 0
            && order.is_complete()
            && self.config.track_inventory
        {
            let overridden = self.scoped_snapshot(order, variant)?.overridden;
            self.book_movement(order, variant, removed_on_hand, overridden, backorders)?;
        }
        debug!(
            order = %order.id,
            %variant,
            removed = excess - remaining,
            restocked = removed_on_hand,
            "released units"
        );
        Ok(())
    }

    fn book_movement(
        &self,
        order: &Order,
        variant: VariantId,
        delta: i64,
        overridden: bool,
        backorders: &dyn BackorderQueue,
    ) -> DomainResult<()> {
        if overridden {
            if let Some(hub) = order.distributor {
                self.scoper.adjust(hub, variant, delta);
            }
        } else {
            self.stock.adjust_count_on_hand(variant, delta, backorders)?;
        }
        Ok(())
    }

    /// Build (or rebuild) the proposed shipment for checkout.
    ///
    /// Units are created so the customer sees the backorder split, but no
    /// stock counter moves until the order completes.
    pub fn propose_shipment(&self, order: &mut Order) -> DomainResult<ShipmentId> {
        let shipment_id = match order.shipments.iter().find(|s| !s.is_shipped()) {
            Some(s) => s.id,
            None => {
                let shipment = Shipment::new();
                let id = shipment.id;
                order.shipments.push(shipment);
                id
            }
        };
        let items: Vec<(VariantId, i64)> = order
            .line_items
            .iter()
            .map(|li| (li.variant, li.quantity))
            .collect();

        order.shipment_mut(shipment_id)?.units.clear();
        for (variant, quantity) in items {
            let plan = self.plan_fill(order, variant, quantity)?;
            let shipment = order.shipment_mut(shipment_id)?;
            for _ in 0..plan.on_hand {
                shipment.units.push(InventoryUnit::on_hand(variant));
            }
            for _ in 0..plan.backordered {
                shipment.units.push(InventoryUnit::backordered(variant));
            }
        }
        Ok(shipment_id)
    }

    /// Decrement stock for every on-hand unit in the order's open shipments.
    ///
    /// Called at checkout completion. Availability is validated across all
    /// variants before the first decrement so a late failure does not leave
    /// half the order booked.
    pub fn commit_stock(&self, order: &Order) -> DomainResult<()> {
        if !self.config.track_inventory {
            return Ok(());
        }
        let mut movements = Vec::new();
        for shipment in order.shipments.iter().filter(|s| !s.is_shipped()) {
            for (variant, count) in shipment.on_hand_counts() {
                let scoped = self.scoped_snapshot(order, variant)?;
                if !scoped.overridden && scoped.on_hand < count && !scoped.backorderable {
                    return Err(DomainError::insufficient_stock(format!(
                        "variant {variant}: {} on hand, {count} requested",
                        scoped.on_hand
                    )));
                }
                movements.push((variant, count, scoped.overridden));
            }
        }
        for (variant, count, overridden) in movements {
            self.book_movement(order, variant, -count, overridden, &NoBackorders)?;
        }
        Ok(())
    }

    /// Credit `count` units of a variant back to stock on behalf of an
    /// order, feeding any backorders waiting elsewhere.
    pub fn credit_stock(
        &self,
        order: &Order,
        variant: VariantId,
        count: i64,
        backorders: &dyn BackorderQueue,
    ) -> DomainResult<()> {
        if !self.config.track_inventory || count <= 0 {
            return Ok(());
        }
        let overridden = self.scoped_snapshot(order, variant)?.overridden;
        self.book_movement(order, variant, count, overridden, backorders)
    }

    /// Return the on-hand units of the order's non-shipped shipments to
    /// stock, feeding any backorders waiting elsewhere.
    pub fn release_stock(
        &self,
        order: &Order,
        backorders: &dyn BackorderQueue,
    ) -> DomainResult<()> {
        if !self.config.track_inventory {
            return Ok(());
        }
        for shipment in order.shipments.iter().filter(|s| !s.is_shipped()) {
            for (variant, count) in shipment.on_hand_counts() {
                let overridden = self.scoped_snapshot(order, variant)?.overridden;
                self.book_movement(order, variant, count, overridden, backorders)?;
            }
        }
        Ok(())
    }
}
