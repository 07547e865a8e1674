//! The order aggregate: line items, shipments, payments, adjustments, and
//! the cached totals derived from them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use farmgate_catalog::{EnterpriseId, VariantId};
use farmgate_core::{CurrencyCode, DomainError, DomainResult, EngineConfig, Entity, Money, entity_id};
use farmgate_pricing::{Address, ChargeBasis, OrderCycle};
use serde::{Deserialize, Serialize};

use crate::adjustment::{Adjustable, Adjustment, RecomputeOutcome};
use crate::line_item::{LineItem, LineItemId};
use crate::payment::Payment;
use crate::shipment::{OrderContext, Shipment, ShipmentId, ShipmentState};

entity_id!(
    /// Order identifier.
    OrderId
);

/// Checkout and post-checkout lifecycle of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Cart,
    Address,
    Delivery,
    Payment,
    Complete,
    Canceled,
    Resumed,
}

impl core::fmt::Display for OrderState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            OrderState::Cart => "cart",
            OrderState::Address => "address",
            OrderState::Delivery => "delivery",
            OrderState::Payment => "payment",
            OrderState::Complete => "complete",
            OrderState::Canceled => "canceled",
            OrderState::Resumed => "resumed",
        };
        f.write_str(s)
    }
}

/// Derived summary of where the money stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStateSummary {
    BalanceDue,
    Paid,
    CreditOwed,
    Failed,
}

/// Derived summary of where the goods stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStateSummary {
    Backorder,
    Pending,
    Partial,
    Ready,
    Shipped,
    Canceled,
}

/// A customer order through one distributor and order cycle.
///
/// Totals are cached fields refreshed by `refresh_totals`; every mutation path
/// through the reconciler ends with a refresh, so readers never recompute.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub number: String,
    pub state: OrderState,
    pub currency: CurrencyCode,
    pub distributor: Option<EnterpriseId>,
    pub order_cycle: Option<Arc<OrderCycle>>,
    pub ship_address: Option<Address>,
    pub bill_address: Option<Address>,
    pub line_items: Vec<LineItem>,
    pub shipments: Vec<Shipment>,
    pub payments: Vec<Payment>,
    pub adjustments: Vec<Adjustment>,
    pub item_total: Money,
    /// Eligible, non-included adjustments (taxes, fees, shipping, credits).
    pub adjustment_total: Money,
    pub included_tax_total: Money,
    pub additional_tax_total: Money,
    pub ship_total: Money,
    pub payment_total: Money,
    pub total: Money,
    pub payment_state: Option<PaymentStateSummary>,
    pub shipment_state: Option<ShipmentStateSummary>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(currency: CurrencyCode) -> Self {
        let id = OrderId::new();
        Self {
            id,
            number: Self::generate_number(id),
            state: OrderState::Cart,
            currency,
            distributor: None,
            order_cycle: None,
            ship_address: None,
            bill_address: None,
            line_items: Vec::new(),
            shipments: Vec::new(),
            payments: Vec::new(),
            adjustments: Vec::new(),
            item_total: Money::zero(),
            adjustment_total: Money::zero(),
            included_tax_total: Money::zero(),
            additional_tax_total: Money::zero(),
            ship_total: Money::zero(),
            payment_total: Money::zero(),
            total: Money::zero(),
            payment_state: None,
            shipment_state: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    fn generate_number(id: OrderId) -> String {
        let digits: String = id
            .to_string()
            .chars()
            .filter(|c| c.is_ascii_hexdigit())
            .take(9)
            .collect();
        format!("R{}", digits.to_uppercase())
    }

    pub fn transition_to(&mut self, to: OrderState) -> DomainResult<()> {
        use OrderState::*;
        let legal = matches!(
            (self.state, to),
            (Cart, Address)
                | (Address, Delivery)
                | (Delivery, Payment)
                | (Payment, Complete)
                | (Complete, Canceled)
                | (Resumed, Canceled)
                | (Canceled, Resumed)
        );
        if !legal {
            return Err(DomainError::transition("order", self.state, to));
        }
        self.state = to;
        Ok(())
    }

    /// Checkout has finished; the order is part of the books.
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn is_canceled(&self) -> bool {
        self.state == OrderState::Canceled
    }

    /// Fully paid (or overpaid) according to the derived payment state.
    pub fn is_paid(&self) -> bool {
        matches!(
            self.payment_state,
            Some(PaymentStateSummary::Paid) | Some(PaymentStateSummary::CreditOwed)
        )
    }

    pub fn context(&self) -> OrderContext {
        OrderContext {
            canceled: self.is_canceled(),
            completed: self.is_complete(),
            paid: self.is_paid(),
        }
    }

    /// The address tax matching uses, per configuration.
    pub fn tax_address(&self, config: &EngineConfig) -> Option<&Address> {
        if config.tax_using_ship_address {
            self.ship_address.as_ref().or(self.bill_address.as_ref())
        } else {
            self.bill_address.as_ref().or(self.ship_address.as_ref())
        }
    }

    pub fn line_item(&self, id: LineItemId) -> DomainResult<&LineItem> {
        self.line_items
            .iter()
            .find(|li| li.id == id)
            .ok_or(DomainError::NotFound)
    }

    pub fn line_item_mut(&mut self, id: LineItemId) -> DomainResult<&mut LineItem> {
        self.line_items
            .iter_mut()
            .find(|li| li.id == id)
            .ok_or(DomainError::NotFound)
    }

    pub fn line_item_for_variant(&self, variant: VariantId) -> Option<&LineItem> {
        self.line_items.iter().find(|li| li.variant == variant)
    }

    /// Remove a line item and every adjustment charging it.
    pub fn remove_line_item(&mut self, id: LineItemId) -> DomainResult<LineItem> {
        let pos = self
            .line_items
            .iter()
            .position(|li| li.id == id)
            .ok_or(DomainError::NotFound)?;
        self.adjustments
            .retain(|a| a.adjustable != Adjustable::LineItem(id));
        Ok(self.line_items.remove(pos))
    }

    pub fn shipment(&self, id: ShipmentId) -> DomainResult<&Shipment> {
        self.shipments
            .iter()
            .find(|s| s.id == id)
            .ok_or(DomainError::NotFound)
    }

    pub fn shipment_mut(&mut self, id: ShipmentId) -> DomainResult<&mut Shipment> {
        self.shipments
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(DomainError::NotFound)
    }

    pub fn payment_mut(&mut self, id: crate::payment::PaymentId) -> DomainResult<&mut Payment> {
        self.payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(DomainError::NotFound)
    }

    /// Allocated units of a variant across every shipment (returned excluded).
    pub fn unit_count_for(&self, variant: VariantId) -> i64 {
        self.shipments.iter().map(|s| s.units_for(variant)).sum()
    }

    pub fn adjustments_for(&self, adjustable: Adjustable) -> impl Iterator<Item = &Adjustment> {
        self.adjustments
            .iter()
            .filter(move |a| a.adjustable == adjustable)
    }

    /// Order-level basis for fee and payment-fee calculators.
    pub fn charge_basis(&self) -> ChargeBasis {
        ChargeBasis::Order {
            item_total: self.line_items.iter().map(LineItem::amount).sum(),
            item_count: self.line_items.iter().map(|li| li.quantity).sum(),
            ship_total: self.ship_total,
        }
    }

    /// Shipment-level basis: the value of the goods packed in it.
    pub fn shipment_basis(&self, shipment_id: ShipmentId) -> DomainResult<ChargeBasis> {
        let shipment = self.shipment(shipment_id)?;
        let prices: HashMap<VariantId, Money> = self
            .line_items
            .iter()
            .map(|li| (li.variant, li.price))
            .collect();
        let amount = shipment
            .units
            .iter()
            .filter(|u| u.counts_for_allocation())
            .filter_map(|u| prices.get(&u.variant))
            .copied()
            .sum();
        Ok(ChargeBasis::Shipment { amount })
    }

    /// Re-derive every cached money total from current children.
    ///
    /// Idempotent: calling twice in a row changes nothing.
    pub fn refresh_totals(&mut self) {
        self.item_total = self.line_items.iter().map(LineItem::amount).sum();
        self.adjustment_total = self
            .adjustments
            .iter()
            .filter(|a| a.eligible && !a.included)
            .map(|a| a.amount)
            .sum();
        self.included_tax_total = self
            .adjustments
            .iter()
            .filter(|a| a.originator.is_tax() && a.included)
            .map(|a| a.amount)
            .sum();
        self.additional_tax_total = self
            .adjustments
            .iter()
            .filter(|a| a.originator.is_tax() && a.eligible && !a.included)
            .map(|a| a.amount)
            .sum();
        self.ship_total = self
            .adjustments
            .iter()
            .filter(|a| a.originator.is_shipping() && a.eligible)
            .map(|a| a.amount)
            .sum();
        self.payment_total = self
            .payments
            .iter()
            .filter(|p| p.is_completed())
            .map(|p| p.amount)
            .sum();
        self.total = self.item_total + self.adjustment_total;
    }

    pub fn outstanding_balance(&self) -> Money {
        self.total - self.payment_total
    }

    /// Re-derive the payment summary from the payments and the balance.
    pub fn update_payment_state(&mut self) {
        if self.payments.is_empty() && !self.is_complete() {
            self.payment_state = None;
            return;
        }
        let all_failed =
            !self.payments.is_empty() && self.payments.iter().all(Payment::is_failed);
        self.payment_state = Some(if all_failed {
            PaymentStateSummary::Failed
        } else {
            let balance = self.outstanding_balance();
            if balance.is_negative() {
                PaymentStateSummary::CreditOwed
            } else if balance.is_zero() {
                PaymentStateSummary::Paid
            } else {
                PaymentStateSummary::BalanceDue
            }
        });
    }

    /// Push every shipment to the state the order's facts imply.
    pub fn sync_shipment_states(&mut self) -> DomainResult<()> {
        let ctx = self.context();
        for shipment in &mut self.shipments {
            shipment.sync_state(&ctx)?;
        }
        Ok(())
    }

    /// Re-derive the shipment summary from the shipments.
    pub fn update_shipment_state(&mut self) {
        if self.shipments.is_empty() {
            self.shipment_state = None;
            return;
        }
        let states: Vec<ShipmentState> = self.shipments.iter().map(|s| s.state).collect();
        let backordered = self.shipments.iter().any(Shipment::backordered);
        self.shipment_state = Some(if states.iter().all(|s| *s == ShipmentState::Canceled) {
            ShipmentStateSummary::Canceled
        } else if backordered {
            ShipmentStateSummary::Backorder
        } else if states.iter().all(|s| *s == ShipmentState::Shipped) {
            ShipmentStateSummary::Shipped
        } else if states.iter().any(|s| *s == ShipmentState::Shipped) {
            ShipmentStateSummary::Partial
        } else if states.iter().all(|s| *s == ShipmentState::Ready) {
            ShipmentStateSummary::Ready
        } else {
            ShipmentStateSummary::Pending
        });
    }

    /// Recompute the adjustments scoped to one shipment and refresh the
    /// shipment's cached tax/adjustment splits.
    pub fn refresh_shipment_adjustment_totals(
        &mut self,
        shipment_id: ShipmentId,
    ) -> DomainResult<()> {
        let basis = self.shipment_basis(shipment_id)?;
        let scope = Adjustable::Shipment(shipment_id);

        let mut deleted = Vec::new();
        for adj in self.adjustments.iter_mut().filter(|a| a.adjustable == scope) {
            if adj.recompute(Some(&basis), false) == RecomputeOutcome::Delete {
                deleted.push(adj.id);
            }
        }
        self.adjustments.retain(|a| !deleted.contains(&a.id));

        let scoped = || self.adjustments.iter().filter(|a| a.adjustable == scope);
        let adjustment_total: Money = scoped()
            .filter(|a| !a.originator.is_tax() && a.eligible && !a.included)
            .map(|a| a.amount)
            .sum();
        let included_tax_total: Money = scoped()
            .filter(|a| a.originator.is_tax() && a.included)
            .map(|a| a.amount)
            .sum();
        let additional_tax_total: Money = scoped()
            .filter(|a| a.originator.is_tax() && a.eligible && !a.included)
            .map(|a| a.amount)
            .sum();

        let shipment = self.shipment_mut(shipment_id)?;
        shipment.adjustment_total = adjustment_total;
        shipment.included_tax_total = included_tax_total;
        shipment.additional_tax_total = additional_tax_total;
        Ok(())
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
