//! The order reconciler: the single entry point through which orders are
//! created, edited, charged, completed, shipped, and unwound.
//!
//! Every public operation takes the order's row lock for its whole duration,
//! so concurrent edits of one order serialize while different orders proceed
//! in parallel. Operations that feed freed stock to other orders go through
//! the store's backorder queue, which skips the locked order and any busy
//! rows instead of waiting on them.

use std::sync::Arc;

use chrono::Utc;
use farmgate_catalog::{Catalog, EnterpriseId, NullScoper, StockScoper, StockSnapshot, VariantId};
use farmgate_core::{DomainError, DomainResult, EngineConfig, Money};
use farmgate_inventory::StockLedger;
use farmgate_pricing::{Address, OrderCycle, PaymentMethod, ShippingMethod, TaxRate, Zone};
use tracing::{info, warn};

use crate::adjustment::{
    Adjustable, Adjustment, AdjustmentState, Originator, ReturnAuthorizationId,
};
use crate::allocator::InventoryAllocator;
use crate::fees::FeeEngine;
use crate::line_item::{LineItem, LineItemId};
use crate::notify::{Notifier, NullNotifier};
use crate::order::{Order, OrderId, OrderState};
use crate::payment::{Payment, PaymentId};
use crate::shipment::ShipmentId;
use crate::store::OrderStore;
use crate::tax::TaxEngine;

/// Coordinates orders, stock, fees, taxes, and payments.
pub struct OrderReconciler {
    config: EngineConfig,
    store: Arc<OrderStore>,
    catalog: Arc<Catalog>,
    stock: Arc<StockLedger>,
    scoper: Arc<dyn StockScoper>,
    tax_rates: Vec<Arc<TaxRate>>,
    zones: Vec<Arc<Zone>>,
    notifier: Arc<dyn Notifier>,
}

impl OrderReconciler {
    pub fn new(
        config: EngineConfig,
        store: Arc<OrderStore>,
        catalog: Arc<Catalog>,
        stock: Arc<StockLedger>,
    ) -> Self {
        Self {
            config,
            store,
            catalog,
            stock,
            scoper: Arc::new(NullScoper),
            tax_rates: Vec::new(),
            zones: Vec::new(),
            notifier: Arc::new(NullNotifier),
        }
    }

    pub fn with_scoper(mut self, scoper: Arc<dyn StockScoper>) -> Self {
        self.scoper = scoper;
        self
    }

    pub fn with_tax_rates(mut self, rates: Vec<Arc<TaxRate>>, zones: Vec<Arc<Zone>>) -> Self {
        self.tax_rates = rates;
        self.zones = zones;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &Arc<OrderStore> {
        &self.store
    }

    /// Read a point-in-time copy of an order.
    pub fn order(&self, id: OrderId) -> DomainResult<Order> {
        self.store.get(id)
    }

    fn allocator(&self) -> InventoryAllocator<'_> {
        InventoryAllocator::new(&self.config, &self.catalog, &self.stock, self.scoper.as_ref())
    }

    fn tax_engine(&self) -> TaxEngine<'_> {
        TaxEngine::new(&self.config, &self.catalog, &self.tax_rates, &self.zones)
    }

    // ---- order setup -----------------------------------------------------

    pub fn create_order(&self) -> DomainResult<OrderId> {
        let id = self.store.insert(Order::new(self.config.currency.clone()))?;
        info!(order = %id, "created order");
        Ok(id)
    }

    /// Attach the distributor hub and order cycle. Rejected when the cycle's
    /// ordering window is closed.
    pub fn set_distribution(
        &self,
        order_id: OrderId,
        distributor: EnterpriseId,
        cycle: Option<Arc<OrderCycle>>,
    ) -> DomainResult<()> {
        if let Some(cycle) = &cycle
            && !cycle.open_at(Utc::now())
        {
            return Err(DomainError::validation("order cycle is not open for orders"));
        }
        self.store.with_order(order_id, |order| {
            order.distributor = Some(distributor);
            order.order_cycle = cycle;
            self.recalculate_locked(order)
        })
    }

    pub fn set_addresses(
        &self,
        order_id: OrderId,
        bill_address: Option<Address>,
        ship_address: Option<Address>,
    ) -> DomainResult<()> {
        self.store.with_order(order_id, |order| {
            order.bill_address = bill_address;
            order.ship_address = ship_address;
            self.recalculate_locked(order)
        })
    }

    // ---- line items ------------------------------------------------------

    /// Add `quantity` of a variant, merging into an existing line item.
    ///
    /// The captured price is the hub-scoped price at add time. Fails with
    /// `InsufficientStock` when the resulting quantity cannot be covered by
    /// stock or backorders.
    pub fn add_item(
        &self,
        order_id: OrderId,
        variant_id: VariantId,
        quantity: i64,
    ) -> DomainResult<LineItemId> {
        if quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        self.store.with_order(order_id, |order| {
            if let Some(li) = order.line_item_for_variant(variant_id) {
                let id = li.id;
                let target = li.quantity + quantity;
                self.set_quantity_locked(order, id, target)?;
                return Ok(id);
            }

            let variant = self.catalog.variant(variant_id)?;
            self.allocator().plan_fill(order, variant_id, quantity)?;
            let price = self.scoped_price(order, &variant)?;
            let tax_category = self.catalog.tax_category_for(&variant);
            let li = LineItem::new(&variant, price, tax_category, quantity)?;
            let id = li.id;
            order.line_items.push(li);

            if order.is_complete() {
                let queue = self.store.backorder_queue(Some(order.id));
                self.allocator().reconcile(order, id, None, true, &queue)?;
            }
            self.recalculate_locked(order)?;
            Ok(id)
        })
    }

    /// Set a line item's quantity; zero removes it.
    pub fn set_quantity(
        &self,
        order_id: OrderId,
        line_item_id: LineItemId,
        quantity: i64,
    ) -> DomainResult<()> {
        self.store.with_order(order_id, |order| {
            self.set_quantity_locked(order, line_item_id, quantity)
        })
    }

    pub fn remove_item(&self, order_id: OrderId, line_item_id: LineItemId) -> DomainResult<()> {
        self.set_quantity(order_id, line_item_id, 0)
    }

    fn set_quantity_locked(
        &self,
        order: &mut Order,
        line_item_id: LineItemId,
        quantity: i64,
    ) -> DomainResult<()> {
        let previous = order.line_item(line_item_id)?.quantity;
        order.line_item_mut(line_item_id)?.set_quantity(quantity)?;

        let queue = self.store.backorder_queue(Some(order.id));
        if let Err(err) = self
            .allocator()
            .reconcile(order, line_item_id, None, true, &queue)
        {
            // Leave the order exactly as it was.
            order.line_item_mut(line_item_id)?.set_quantity(previous)?;
            return Err(err);
        }
        if quantity == 0 {
            order.remove_line_item(line_item_id)?;
        }
        self.recalculate_locked(order)
    }

    fn scoped_price(&self, order: &Order, variant: &farmgate_catalog::Variant) -> DomainResult<Money> {
        let base = if self.config.track_inventory {
            self.stock.snapshot(variant)?
        } else {
            StockSnapshot {
                on_hand: 0,
                backorderable: true,
                price: variant.price,
                overridden: false,
            }
        };
        Ok(self.scoper.scope(order.distributor, variant, base).price)
    }

    // ---- charges ---------------------------------------------------------

    /// Recreate the enterprise fees of the order's cycle.
    ///
    /// Idempotent: open and closed fee adjustments are replaced wholesale,
    /// finalized ones stay on the books.
    pub fn update_distribution_charge(&self, order_id: OrderId) -> DomainResult<()> {
        self.store.with_order(order_id, |order| {
            self.update_distribution_charge_locked(order);
            order.refresh_totals();
            order.update_payment_state();
            Ok(())
        })
    }

    fn update_distribution_charge_locked(&self, order: &mut Order) {
        FeeEngine::clear_fee_adjustments(order);
        FeeEngine::create_line_item_fees(order);
        FeeEngine::create_order_fees(order);
    }

    /// Recreate the tax adjustments of every line item.
    pub fn create_tax_charge(&self, order_id: OrderId) -> DomainResult<()> {
        self.store.with_order(order_id, |order| {
            self.tax_engine().adjust(order)?;
            order.refresh_totals();
            order.update_payment_state();
            Ok(())
        })
    }

    /// Recompute shipping fee adjustments for every open shipment.
    ///
    /// Closed fees are reopened, recomputed, and closed again; a state race
    /// (another actor finalizing mid-flight) keeps the stale fee and logs.
    pub fn update_shipping_fees(&self, order_id: OrderId) -> DomainResult<()> {
        self.store.with_order(order_id, |order| {
            self.refresh_shipping_fees_locked(order)?;
            order.refresh_totals();
            order.update_payment_state();
            Ok(())
        })
    }

    fn refresh_shipping_fees_locked(&self, order: &mut Order) -> DomainResult<()> {
        let ids: Vec<ShipmentId> = order
            .shipments
            .iter()
            .filter(|s| !s.is_shipped() && !s.is_canceled())
            .map(|s| s.id)
            .collect();
        for sid in ids {
            if let Err(err) = self.refresh_shipping_fee_locked(order, sid) {
                match err {
                    DomainError::IllegalTransition { .. } => {
                        warn!(order = %order.id, shipment = %sid, %err, "keeping stale shipping fee");
                    }
                    other => return Err(other),
                }
            }
        }
        Ok(())
    }

    fn refresh_shipping_fee_locked(
        &self,
        order: &mut Order,
        shipment_id: ShipmentId,
    ) -> DomainResult<()> {
        let Some(method) = order.shipment(shipment_id)?.shipping_method.clone() else {
            return Ok(());
        };
        let basis = order.shipment_basis(shipment_id)?;
        let existing = order.adjustments.iter().position(|a| {
            a.adjustable == Adjustable::Shipment(shipment_id) && a.originator.is_shipping()
        });
        let cost = match existing {
            Some(idx) => {
                let adj = &mut order.adjustments[idx];
                if !adj.is_finalized() {
                    let was_closed = adj.state == AdjustmentState::Closed;
                    if was_closed {
                        adj.reopen()?;
                    }
                    adj.recompute(Some(&basis), false);
                    if was_closed {
                        adj.close()?;
                    }
                }
                adj.amount
            }
            None => {
                let amount = method.compute(&basis);
                order.adjustments.push(
                    Adjustment::new(
                        method.label(),
                        amount,
                        Adjustable::Shipment(shipment_id),
                        Originator::ShippingMethod(Arc::clone(&method)),
                    )
                    .mandatory(),
                );
                amount
            }
        };
        order.shipment_mut(shipment_id)?.cost = cost;
        order.refresh_shipment_adjustment_totals(shipment_id)
    }

    /// Recompute payment method transaction fees.
    pub fn update_payment_fees(&self, order_id: OrderId) -> DomainResult<()> {
        self.store.with_order(order_id, |order| {
            self.refresh_payment_fees_locked(order)?;
            order.refresh_totals();
            order.update_payment_state();
            Ok(())
        })
    }

    fn refresh_payment_fees_locked(&self, order: &mut Order) -> DomainResult<()> {
        let basis = order.charge_basis();
        let payments: Vec<(PaymentId, Arc<PaymentMethod>)> = order
            .payments
            .iter()
            .map(|p| (p.id, Arc::clone(&p.method)))
            .collect();
        for (payment_id, method) in payments {
            let Some(amount) = method.compute_fee(&basis) else {
                continue;
            };
            let existing = order
                .adjustments
                .iter()
                .position(|a| a.source_payment == Some(payment_id));
            match existing {
                Some(idx) => {
                    let adj = &mut order.adjustments[idx];
                    if adj.is_finalized() {
                        continue;
                    }
                    let was_closed = adj.state == AdjustmentState::Closed;
                    let refreshed = (|| -> DomainResult<()> {
                        if was_closed {
                            adj.reopen()?;
                        }
                        adj.recompute(Some(&basis), false);
                        if was_closed {
                            adj.close()?;
                        }
                        Ok(())
                    })();
                    if let Err(err) = refreshed {
                        warn!(order = %order.id, payment = %payment_id, %err, "keeping stale payment fee");
                    }
                }
                None => {
                    if amount.is_zero() {
                        continue;
                    }
                    order.adjustments.push(
                        Adjustment::new(
                            method.fee_label(),
                            amount,
                            Adjustable::Order,
                            Originator::PaymentMethod(Arc::clone(&method)),
                        )
                        .for_payment(payment_id),
                    );
                }
            }
        }
        Ok(())
    }

    /// Full recomputation pass: fees, taxes, shipping and payment fees,
    /// totals, and derived states. Idempotent.
    fn recalculate_locked(&self, order: &mut Order) -> DomainResult<()> {
        self.update_distribution_charge_locked(order);
        self.tax_engine().adjust(order)?;
        self.refresh_shipping_fees_locked(order)?;
        self.refresh_payment_fees_locked(order)?;
        order.adjustments.retain(|a| !a.is_droppable());
        order.refresh_totals();
        order.update_payment_state();
        order.sync_shipment_states()?;
        order.update_shipment_state();
        Ok(())
    }

    /// Manually entered order-level charge or credit.
    pub fn add_admin_adjustment(
        &self,
        order_id: OrderId,
        label: impl Into<String>,
        amount: Money,
    ) -> DomainResult<()> {
        let label = label.into();
        self.store.with_order(order_id, |order| {
            order.adjustments.push(
                Adjustment::new(label, amount, Adjustable::Order, Originator::None).mandatory(),
            );
            order.refresh_totals();
            order.update_payment_state();
            Ok(())
        })
    }

    // ---- checkout --------------------------------------------------------

    /// Build the proposed shipment and attach a shipping method.
    ///
    /// Units are created so the customer sees any backorder split, but no
    /// stock moves until completion.
    pub fn select_shipping(
        &self,
        order_id: OrderId,
        method: Arc<ShippingMethod>,
    ) -> DomainResult<ShipmentId> {
        self.store.with_order(order_id, |order| {
            if method.require_ship_address && order.ship_address.is_none() {
                return Err(DomainError::validation(
                    "shipping method requires a ship address",
                ));
            }
            let shipment_id = self.allocator().propose_shipment(order)?;
            order.shipment_mut(shipment_id)?.shipping_method = Some(method);
            self.refresh_shipping_fees_locked(order)?;
            order.refresh_totals();
            order.update_payment_state();
            Ok(shipment_id)
        })
    }

    /// Record a payment attempt and its method's transaction fee.
    pub fn register_payment(
        &self,
        order_id: OrderId,
        method: Arc<PaymentMethod>,
        amount: Money,
    ) -> DomainResult<PaymentId> {
        let identifier = self.store.claim_payment_identifier()?;
        self.store.with_order(order_id, |order| {
            let payment = Payment::new(amount, Arc::clone(&method), identifier);
            let payment_id = payment.id;
            order.payments.push(payment);
            self.refresh_payment_fees_locked(order)?;
            order.refresh_totals();
            order.update_payment_state();
            Ok(payment_id)
        })
    }

    /// Apply the gateway's verdict on a payment.
    pub fn payment_result(
        &self,
        order_id: OrderId,
        payment_id: PaymentId,
        success: bool,
    ) -> DomainResult<()> {
        self.store.with_order(order_id, |order| {
            let payment = order.payment_mut(payment_id)?;
            if success {
                payment.complete()?;
            } else {
                payment.fail()?;
            }
            order.refresh_totals();
            order.update_payment_state();
            order.sync_shipment_states()?;
            order.update_shipment_state();
            Ok(())
        })
    }

    /// Drive the order from wherever it stands to completion.
    ///
    /// Walks the checkout chain with a guard per step; completion commits
    /// stock, recomputes every charge, closes open adjustments, and emits
    /// the confirmation. Completing a complete order is a no-op.
    pub fn complete_checkout(&self, order_id: OrderId) -> DomainResult<()> {
        self.store.with_order(order_id, |order| {
            loop {
                match order.state {
                    OrderState::Cart => {
                        if order.line_items.is_empty() {
                            return Err(DomainError::validation(
                                "cannot check out an empty cart",
                            ));
                        }
                        order.transition_to(OrderState::Address)?;
                    }
                    OrderState::Address => {
                        if order.bill_address.is_none() && order.ship_address.is_none() {
                            return Err(DomainError::validation(
                                "an address is required to check out",
                            ));
                        }
                        order.transition_to(OrderState::Delivery)?;
                    }
                    OrderState::Delivery => {
                        if order.shipments.is_empty() {
                            self.allocator().propose_shipment(order)?;
                        }
                        order.transition_to(OrderState::Payment)?;
                    }
                    OrderState::Payment => {
                        let all_failed = !order.payments.is_empty()
                            && order.payments.iter().all(Payment::is_failed);
                        if all_failed && !self.config.allow_checkout_on_gateway_error {
                            return Err(DomainError::validation(
                                "payment could not be processed",
                            ));
                        }
                        return self.finalize_locked(order);
                    }
                    OrderState::Complete => return Ok(()),
                    OrderState::Canceled | OrderState::Resumed => {
                        return Err(DomainError::transition(
                            "order",
                            order.state,
                            OrderState::Complete,
                        ));
                    }
                }
            }
        })
    }

    fn finalize_locked(&self, order: &mut Order) -> DomainResult<()> {
        // Stock first: a failed commit leaves the order in the payment step.
        self.allocator().commit_stock(order)?;
        order.transition_to(OrderState::Complete)?;
        order.completed_at = Some(Utc::now());

        // Items added after the proposal get their units (and stock) now.
        let item_ids: Vec<LineItemId> = order.line_items.iter().map(|li| li.id).collect();
        let queue = self.store.backorder_queue(Some(order.id));
        for id in item_ids {
            self.allocator().reconcile(order, id, None, true, &queue)?;
        }

        self.recalculate_locked(order)?;
        for adj in &mut order.adjustments {
            if adj.is_open() {
                adj.close()?;
            }
        }
        order.update_payment_state();
        order.sync_shipment_states()?;
        order.update_shipment_state();

        self.notifier.order_confirmation(order.id);
        info!(order = %order.id, total = %order.total, "order completed");
        Ok(())
    }

    // ---- post-checkout ---------------------------------------------------

    /// Cancel a completed order: cancel open shipments and return their
    /// on-hand stock, feeding backorders elsewhere.
    pub fn cancel(&self, order_id: OrderId) -> DomainResult<()> {
        self.store.with_order(order_id, |order| {
            order.transition_to(OrderState::Canceled)?;
            let queue = self.store.backorder_queue(Some(order.id));
            self.allocator().release_stock(order, &queue)?;
            order.sync_shipment_states()?;
            order.update_shipment_state();
            order.update_payment_state();
            info!(order = %order.id, "canceled order");
            Ok(())
        })
    }

    /// Resume a canceled order, taking its stock back.
    ///
    /// Fails with `InsufficientStock` when the goods have since been sold
    /// through, leaving the order canceled.
    pub fn resume(&self, order_id: OrderId) -> DomainResult<()> {
        self.store.with_order(order_id, |order| {
            self.allocator().commit_stock(order)?;
            order.transition_to(OrderState::Resumed)?;
            order.sync_shipment_states()?;
            order.update_shipment_state();
            order.update_payment_state();
            info!(order = %order.id, "resumed order");
            Ok(())
        })
    }

    /// Ship a ready shipment and finalize its shipping fee.
    pub fn ship(&self, order_id: OrderId, shipment_id: ShipmentId) -> DomainResult<()> {
        self.store.with_order(order_id, |order| {
            order.sync_shipment_states()?;
            order.shipment_mut(shipment_id)?.ship(Utc::now())?;
            for adj in order.adjustments.iter_mut().filter(|a| {
                a.adjustable == Adjustable::Shipment(shipment_id) && !a.is_finalized()
            }) {
                adj.finalize()?;
            }
            order.update_shipment_state();
            order.refresh_totals();
            self.notifier.shipment_confirmation(order.id, shipment_id);
            info!(order = %order.id, shipment = %shipment_id, "shipped");
            Ok(())
        })
    }

    /// Accept returned units from a shipped shipment and credit the refund.
    ///
    /// The credit is a fixed-amount adjustment that later recomputations
    /// never touch; the returned goods go back on the shelf.
    pub fn return_units(
        &self,
        order_id: OrderId,
        shipment_id: ShipmentId,
        variant: VariantId,
        quantity: i64,
        refund: Money,
    ) -> DomainResult<ReturnAuthorizationId> {
        if quantity < 1 {
            return Err(DomainError::validation("return quantity must be at least 1"));
        }
        self.store.with_order(order_id, |order| {
            let shipment = order.shipment_mut(shipment_id)?;
            if !shipment.is_shipped() {
                return Err(DomainError::validation(
                    "only shipped shipments accept returns",
                ));
            }
            let shipped = shipment
                .units
                .iter()
                .filter(|u| u.variant == variant && u.is_shipped())
                .count() as i64;
            if shipped < quantity {
                return Err(DomainError::validation(format!(
                    "only {shipped} shipped units of variant {variant} to return"
                )));
            }
            let mut remaining = quantity;
            for unit in shipment.units.iter_mut() {
                if remaining == 0 {
                    break;
                }
                if unit.variant == variant && unit.is_shipped() {
                    unit.return_unit()?;
                    remaining -= 1;
                }
            }

            let authorization = ReturnAuthorizationId::new();
            let mut credit = Adjustment::new(
                "Return credit",
                -refund,
                Adjustable::Order,
                Originator::ReturnAuthorization(authorization),
            )
            .mandatory();
            credit.close()?;
            order.adjustments.push(credit);

            let queue = self.store.backorder_queue(Some(order.id));
            self.allocator().credit_stock(order, variant, quantity, &queue)?;

            order.refresh_totals();
            order.update_payment_state();
            info!(order = %order.id, %variant, quantity, "accepted return");
            Ok(authorization)
        })
    }

    /// Receive stock, filling the oldest backordered units anywhere first.
    pub fn restock(&self, variant: VariantId, delta: i64) -> DomainResult<i64> {
        self.stock
            .adjust_count_on_hand(variant, delta, &self.store.backorder_queue(None))
    }
}
