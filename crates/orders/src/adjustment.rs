//! Adjustments: every non-item charge or credit on an order.
//!
//! Taxes, enterprise fees, shipping and payment fees, and return credits are
//! all adjustments. Each one records what it charges (`adjustable`), where the
//! amount came from (`originator`), and a lifecycle state that controls
//! whether recomputation may still touch it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use farmgate_core::{DomainError, DomainResult, Entity, Money, entity_id};
use farmgate_pricing::{ChargeBasis, EnterpriseFee, PaymentMethod, ShippingMethod, TaxRate};
use serde::{Deserialize, Serialize};

use crate::line_item::LineItemId;
use crate::payment::PaymentId;
use crate::shipment::ShipmentId;

entity_id!(
    /// Adjustment identifier.
    AdjustmentId
);

entity_id!(
    /// Return authorization identifier.
    ReturnAuthorizationId
);

/// Lifecycle of an adjustment.
///
/// Open adjustments are recomputed freely; closed ones survive recomputation
/// but can be reopened; finalized ones are permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentState {
    Open,
    Closed,
    Finalized,
}

impl core::fmt::Display for AdjustmentState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            AdjustmentState::Open => "open",
            AdjustmentState::Closed => "closed",
            AdjustmentState::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// What the adjustment charges against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Adjustable {
    Order,
    LineItem(LineItemId),
    Shipment(ShipmentId),
}

/// Where the adjustment's amount comes from on recomputation.
#[derive(Debug, Clone)]
pub enum Originator {
    TaxRate(Arc<TaxRate>),
    EnterpriseFee(Arc<EnterpriseFee>),
    ShippingMethod(Arc<ShippingMethod>),
    PaymentMethod(Arc<PaymentMethod>),
    /// Fixed credit entered at return time; never recomputed.
    ReturnAuthorization(ReturnAuthorizationId),
    /// Manually entered amount with no source to recompute from.
    None,
}

impl Originator {
    pub fn is_tax(&self) -> bool {
        matches!(self, Originator::TaxRate(_))
    }

    pub fn is_fee(&self) -> bool {
        matches!(self, Originator::EnterpriseFee(_))
    }

    pub fn is_shipping(&self) -> bool {
        matches!(self, Originator::ShippingMethod(_))
    }

    pub fn is_payment(&self) -> bool {
        matches!(self, Originator::PaymentMethod(_))
    }
}

/// What recomputation decided about an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeOutcome {
    /// Amount refreshed (possibly unchanged in value).
    Updated,
    /// Left alone: finalized, or a fixed-amount originator.
    Kept,
    /// No originator to recompute from; caller should drop it.
    Delete,
}

/// One charge or credit attached to an order, line item, or shipment.
#[derive(Debug, Clone)]
pub struct Adjustment {
    pub id: AdjustmentId,
    pub label: String,
    pub amount: Money,
    pub adjustable: Adjustable,
    pub originator: Originator,
    pub state: AdjustmentState,
    /// Mandatory adjustments survive at zero; optional ones are dropped.
    pub mandatory: bool,
    /// Ineligible adjustments are kept for display but excluded from totals.
    pub eligible: bool,
    /// Tax already inside the price: never added to the order total.
    pub included: bool,
    /// Payment whose fee this is, when the originator is a payment method.
    pub source_payment: Option<PaymentId>,
    pub created_at: DateTime<Utc>,
}

impl Adjustment {
    pub fn new(
        label: impl Into<String>,
        amount: Money,
        adjustable: Adjustable,
        originator: Originator,
    ) -> Self {
        Self {
            id: AdjustmentId::new(),
            label: label.into(),
            amount,
            adjustable,
            originator,
            state: AdjustmentState::Open,
            mandatory: false,
            eligible: true,
            included: false,
            source_payment: None,
            created_at: Utc::now(),
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn included_in_price(mut self) -> Self {
        self.included = true;
        self
    }

    pub fn for_payment(mut self, payment: PaymentId) -> Self {
        self.source_payment = Some(payment);
        self
    }

    fn transition(&mut self, to: AdjustmentState) -> DomainResult<()> {
        use AdjustmentState::*;
        let legal = matches!(
            (self.state, to),
            (Open, Closed) | (Closed, Open) | (Open, Finalized) | (Closed, Finalized)
        );
        if !legal {
            return Err(DomainError::transition("adjustment", self.state, to));
        }
        self.state = to;
        Ok(())
    }

    pub fn close(&mut self) -> DomainResult<()> {
        self.transition(AdjustmentState::Closed)
    }

    pub fn reopen(&mut self) -> DomainResult<()> {
        self.transition(AdjustmentState::Open)
    }

    pub fn finalize(&mut self) -> DomainResult<()> {
        self.transition(AdjustmentState::Finalized)
    }

    pub fn is_open(&self) -> bool {
        self.state == AdjustmentState::Open
    }

    pub fn is_finalized(&self) -> bool {
        self.state == AdjustmentState::Finalized
    }

    /// Recompute the amount from the originator against `basis`.
    ///
    /// Finalized adjustments are untouched unless `force` is set. Adjustments
    /// with no originator report `Delete`: they were entered against something
    /// that no longer exists and cannot be refreshed. Return credits keep
    /// their entered amount.
    pub fn recompute(&mut self, basis: Option<&ChargeBasis>, force: bool) -> RecomputeOutcome {
        if self.is_finalized() && !force {
            return RecomputeOutcome::Kept;
        }
        if matches!(self.originator, Originator::None) {
            return RecomputeOutcome::Delete;
        }
        let Some(basis) = basis else {
            return RecomputeOutcome::Kept;
        };
        let outcome = match &self.originator {
            Originator::None => return RecomputeOutcome::Delete,
            Originator::ReturnAuthorization(_) => return RecomputeOutcome::Kept,
            Originator::TaxRate(rate) => {
                let tax = rate.compute_tax(basis.amount());
                // Out-of-zone inclusive refunds were stored negated; keep the sign.
                self.amount = if self.amount.is_negative() { -tax } else { tax };
                RecomputeOutcome::Updated
            }
            Originator::EnterpriseFee(fee) => {
                self.amount = fee.compute(basis);
                RecomputeOutcome::Updated
            }
            Originator::ShippingMethod(method) => {
                self.amount = method.compute(basis);
                RecomputeOutcome::Updated
            }
            Originator::PaymentMethod(method) => {
                if let Some(fee) = method.compute_fee(basis) {
                    self.amount = fee;
                    RecomputeOutcome::Updated
                } else {
                    RecomputeOutcome::Kept
                }
            }
        };
        self.eligible = self.mandatory || !self.amount.is_zero();
        outcome
    }

    /// Optional adjustments that computed to zero are removed from the order.
    pub fn is_droppable(&self) -> bool {
        !self.mandatory && self.amount.is_zero() && self.is_open()
    }
}

impl Entity for Adjustment {
    type Id = AdjustmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmgate_pricing::{FlatPercent, FlatRate};
    use rust_decimal_macros::dec;

    fn percent_fee() -> Arc<EnterpriseFee> {
        Arc::new(EnterpriseFee::new(
            farmgate_catalog::EnterpriseId::new(),
            "Handling",
            farmgate_pricing::FeeType::Packing,
            Arc::new(FlatPercent { percent: dec!(10) }),
        ))
    }

    fn fee_adjustment() -> Adjustment {
        Adjustment::new(
            "Handling fee",
            Money::new(dec!(2.00)),
            Adjustable::Order,
            Originator::EnterpriseFee(percent_fee()),
        )
    }

    fn order_basis(item_total: Money) -> ChargeBasis {
        ChargeBasis::Order {
            item_total,
            item_count: 1,
            ship_total: Money::zero(),
        }
    }

    #[test]
    fn lifecycle_open_close_reopen_finalize() {
        let mut adj = fee_adjustment();
        adj.close().unwrap();
        adj.reopen().unwrap();
        adj.close().unwrap();
        adj.finalize().unwrap();
        assert!(adj.is_finalized());
    }

    #[test]
    fn finalized_rejects_reopen() {
        let mut adj = fee_adjustment();
        adj.finalize().unwrap();
        let err = adj.reopen().unwrap_err();
        match err {
            DomainError::IllegalTransition { entity, from, to } => {
                assert_eq!(entity, "adjustment");
                assert_eq!(from, "finalized");
                assert_eq!(to, "open");
            }
            _ => panic!("Expected IllegalTransition"),
        }
    }

    #[test]
    fn recompute_refreshes_from_originator() {
        let mut adj = fee_adjustment();
        let outcome = adj.recompute(Some(&order_basis(Money::new(dec!(30.00)))), false);
        assert_eq!(outcome, RecomputeOutcome::Updated);
        assert_eq!(adj.amount, Money::new(dec!(3.00)));
    }

    #[test]
    fn finalized_amount_is_immutable_without_force() {
        let mut adj = fee_adjustment();
        adj.finalize().unwrap();
        let outcome = adj.recompute(Some(&order_basis(Money::new(dec!(99.00)))), false);
        assert_eq!(outcome, RecomputeOutcome::Kept);
        assert_eq!(adj.amount, Money::new(dec!(2.00)));

        let outcome = adj.recompute(Some(&order_basis(Money::new(dec!(99.00)))), true);
        assert_eq!(outcome, RecomputeOutcome::Updated);
        assert_eq!(adj.amount, Money::new(dec!(9.90)));
    }

    #[test]
    fn orphaned_manual_adjustment_is_deleted_on_recompute() {
        let mut adj = Adjustment::new(
            "Discount",
            Money::new(dec!(-1.00)),
            Adjustable::Order,
            Originator::None,
        );
        let outcome = adj.recompute(Some(&order_basis(Money::new(dec!(10.00)))), false);
        assert_eq!(outcome, RecomputeOutcome::Delete);
    }

    #[test]
    fn return_credit_keeps_entered_amount() {
        let mut adj = Adjustment::new(
            "Return",
            Money::new(dec!(-5.00)),
            Adjustable::Order,
            Originator::ReturnAuthorization(ReturnAuthorizationId::new()),
        );
        let outcome = adj.recompute(Some(&order_basis(Money::new(dec!(10.00)))), false);
        assert_eq!(outcome, RecomputeOutcome::Kept);
        assert_eq!(adj.amount, Money::new(dec!(-5.00)));
    }

    #[test]
    fn optional_zero_adjustment_is_droppable() {
        let mut adj = Adjustment::new(
            "Shipping",
            Money::zero(),
            Adjustable::Order,
            Originator::ShippingMethod(Arc::new(ShippingMethod::new(
                "Free post",
                Arc::new(FlatRate {
                    amount: Money::zero(),
                }),
            ))),
        );
        assert!(adj.is_droppable());
        adj.mandatory = true;
        assert!(!adj.is_droppable());
    }
}
