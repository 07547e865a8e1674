//! Enterprise fee application: the distribution charge of an order cycle.

use std::sync::Arc;

use farmgate_core::Money;
use tracing::debug;

use crate::adjustment::{Adjustable, Adjustment, AdjustmentState, Originator};
use crate::order::Order;

/// Applies order cycle fees to an order.
///
/// Stateless; every method is a full pass over the order. The contract is
/// clear-then-recreate: running it twice leaves the same fees.
pub struct FeeEngine;

impl FeeEngine {
    /// Delete every fee-originated adjustment that is not finalized.
    ///
    /// Finalized fees belong to the books and survive recomputation.
    pub fn clear_fee_adjustments(order: &mut Order) {
        order
            .adjustments
            .retain(|a| !a.originator.is_fee() || a.state == AdjustmentState::Finalized);
    }

    /// One adjustment per (supplied line item, line-item fee) pair.
    pub fn create_line_item_fees(order: &mut Order) {
        let Some(cycle) = order.order_cycle.clone() else {
            return;
        };
        let items: Vec<_> = order.line_items.clone();
        let mut created = 0;
        for li in items {
            if !cycle.supplies(li.variant) {
                continue;
            }
            for fee in &cycle.line_item_fees {
                let amount = fee.compute(&li.charge_basis());
                if amount.is_zero() {
                    continue;
                }
                order.adjustments.push(Adjustment::new(
                    fee.label(),
                    amount,
                    Adjustable::LineItem(li.id),
                    Originator::EnterpriseFee(Arc::clone(fee)),
                ));
                created += 1;
            }
        }
        debug!(order = %order.id, created, "created line item fees");
    }

    /// One adjustment per whole-order fee.
    pub fn create_order_fees(order: &mut Order) {
        let Some(cycle) = order.order_cycle.clone() else {
            return;
        };
        let basis = order.charge_basis();
        for fee in &cycle.order_fees {
            let amount = fee.compute(&basis);
            if amount.is_zero() {
                continue;
            }
            order.adjustments.push(Adjustment::new(
                fee.label(),
                amount,
                Adjustable::Order,
                Originator::EnterpriseFee(Arc::clone(fee)),
            ));
        }
    }

    /// Sum of all eligible fee adjustments; the order's distribution charge.
    pub fn fee_total(order: &Order) -> Money {
        order
            .adjustments
            .iter()
            .filter(|a| a.originator.is_fee() && a.eligible)
            .map(|a| a.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_item::LineItem;
    use farmgate_catalog::{EnterpriseId, ProductId, Variant};
    use farmgate_core::{CurrencyCode, Money};
    use farmgate_pricing::{EnterpriseFee, FeeType, FlatPercent, FlatRate, OrderCycle, PerItem};
    use rust_decimal_macros::dec;

    fn percent_fee(enterprise: EnterpriseId) -> Arc<EnterpriseFee> {
        Arc::new(EnterpriseFee::new(
            enterprise,
            "Handling",
            FeeType::Packing,
            Arc::new(FlatPercent { percent: dec!(10) }),
        ))
    }

    fn order_with_cycle() -> (Order, farmgate_catalog::VariantId) {
        let enterprise = EnterpriseId::new();
        let variant = Variant::new(ProductId::new(), "SKU-1", Money::new(dec!(10.00))).unwrap();
        let li = LineItem::new(&variant, variant.price, None, 2).unwrap();

        let now = chrono::Utc::now();
        let cycle = OrderCycle::new(
            "Weekly",
            enterprise,
            now - chrono::Duration::days(1),
            now + chrono::Duration::days(1),
        )
        .with_variant(variant.id)
        .with_line_item_fee(percent_fee(enterprise))
        .with_order_fee(Arc::new(EnterpriseFee::new(
            enterprise,
            "Admin",
            FeeType::Admin,
            Arc::new(FlatRate {
                amount: Money::new(dec!(1.50)),
            }),
        )));

        let mut order = Order::new(CurrencyCode::default());
        order.order_cycle = Some(Arc::new(cycle));
        order.line_items.push(li);
        (order, variant.id)
    }

    #[test]
    fn ten_percent_fee_on_twenty_dollars_is_two() {
        let (mut order, _) = order_with_cycle();
        FeeEngine::create_line_item_fees(&mut order);

        let fees: Vec<_> = order
            .adjustments
            .iter()
            .filter(|a| a.originator.is_fee())
            .collect();
        assert_eq!(fees.len(), 1);
        assert_eq!(fees[0].amount, Money::new(dec!(2.00)));
        assert_eq!(fees[0].state, AdjustmentState::Open);
        assert_eq!(fees[0].label, "Handling fee (packing)");
    }

    #[test]
    fn order_fees_charge_the_order_itself() {
        let (mut order, _) = order_with_cycle();
        FeeEngine::create_order_fees(&mut order);

        let fees: Vec<_> = order
            .adjustments
            .iter()
            .filter(|a| a.originator.is_fee())
            .collect();
        assert_eq!(fees.len(), 1);
        assert_eq!(fees[0].adjustable, Adjustable::Order);
        assert_eq!(fees[0].amount, Money::new(dec!(1.50)));
    }

    #[test]
    fn clear_and_recreate_is_idempotent() {
        let (mut order, _) = order_with_cycle();
        for _ in 0..3 {
            FeeEngine::clear_fee_adjustments(&mut order);
            FeeEngine::create_line_item_fees(&mut order);
            FeeEngine::create_order_fees(&mut order);
        }
        assert_eq!(FeeEngine::fee_total(&order), Money::new(dec!(3.50)));
        assert_eq!(order.adjustments.len(), 2);
    }

    #[test]
    fn finalized_fees_survive_the_clear() {
        let (mut order, _) = order_with_cycle();
        FeeEngine::create_line_item_fees(&mut order);
        order.adjustments[0].finalize().unwrap();

        FeeEngine::clear_fee_adjustments(&mut order);
        assert_eq!(order.adjustments.len(), 1);
        assert!(order.adjustments[0].is_finalized());
    }

    #[test]
    fn unsupplied_variants_get_no_line_item_fee() {
        let (mut order, _) = order_with_cycle();
        // A variant the cycle does not supply.
        let other = Variant::new(ProductId::new(), "SKU-2", Money::new(dec!(5.00))).unwrap();
        order
            .line_items
            .push(LineItem::new(&other, other.price, None, 1).unwrap());

        FeeEngine::create_line_item_fees(&mut order);
        assert_eq!(
            order
                .adjustments
                .iter()
                .filter(|a| a.originator.is_fee())
                .count(),
            1
        );
    }

    #[test]
    fn per_item_fee_scales_with_quantity() {
        let enterprise = EnterpriseId::new();
        let variant = Variant::new(ProductId::new(), "SKU-1", Money::new(dec!(10.00))).unwrap();
        let li = LineItem::new(&variant, variant.price, None, 3).unwrap();
        let now = chrono::Utc::now();
        let cycle = OrderCycle::new(
            "Weekly",
            enterprise,
            now - chrono::Duration::days(1),
            now + chrono::Duration::days(1),
        )
        .with_variant(variant.id)
        .with_line_item_fee(Arc::new(EnterpriseFee::new(
            enterprise,
            "Transport",
            FeeType::Transport,
            Arc::new(PerItem {
                amount: Money::new(dec!(0.50)),
            }),
        )));
        let mut order = Order::new(CurrencyCode::default());
        order.order_cycle = Some(Arc::new(cycle));
        order.line_items.push(li);

        FeeEngine::create_line_item_fees(&mut order);
        assert_eq!(FeeEngine::fee_total(&order), Money::new(dec!(1.50)));
    }

    #[test]
    fn no_cycle_means_no_fees() {
        let (mut order, _) = order_with_cycle();
        order.order_cycle = None;
        FeeEngine::create_line_item_fees(&mut order);
        FeeEngine::create_order_fees(&mut order);
        assert!(order.adjustments.is_empty());
    }
}
