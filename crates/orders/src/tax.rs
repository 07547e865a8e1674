//! Tax computation: zone matching and per-line-item tax adjustments.

use std::sync::Arc;

use farmgate_catalog::Catalog;
use farmgate_core::{DomainResult, EngineConfig};
use farmgate_pricing::{TaxRate, Zone};
use tracing::debug;

use crate::adjustment::{Adjustable, Adjustment, Originator};
use crate::order::Order;

/// Recomputes tax adjustments for an order.
///
/// Taxes cover line items only; shipping charges are untaxed here.
pub struct TaxEngine<'a> {
    config: &'a EngineConfig,
    catalog: &'a Catalog,
    rates: &'a [Arc<TaxRate>],
    /// Every zone tax matching may resolve an address to.
    zones: &'a [Arc<Zone>],
}

impl<'a> TaxEngine<'a> {
    pub fn new(
        config: &'a EngineConfig,
        catalog: &'a Catalog,
        rates: &'a [Arc<TaxRate>],
        zones: &'a [Arc<Zone>],
    ) -> Self {
        Self {
            config,
            catalog,
            rates,
            zones,
        }
    }

    fn default_zone(&self) -> Option<&Arc<Zone>> {
        self.zones.iter().find(|z| z.default_tax)
    }

    /// The zone taxes are computed against.
    ///
    /// The most specific zone covering the order's tax address wins; an
    /// address no zone covers falls back to the default zone, so inclusive
    /// home prices stand as-is for unknown destinations.
    pub fn order_tax_zone(&self, order: &Order) -> Option<Arc<Zone>> {
        let address = order.tax_address(self.config)?;
        let mut candidates: Vec<(u8, &Arc<Zone>)> = self
            .zones
            .iter()
            .filter_map(|z| z.match_granularity(address).map(|g| (g, z)))
            .collect();
        // Tightest member match first (state over country), then the
        // smaller zone.
        candidates.sort_by_key(|(g, z)| (std::cmp::Reverse(*g), z.members.len()));
        candidates
            .first()
            .map(|(_, z)| *z)
            .or_else(|| self.default_zone())
            .cloned()
    }

    /// The rates that apply to this order, in a stable creation order.
    ///
    /// Empty when the distributor does not charge sales tax, or when no zone
    /// resolves for the tax address. Inclusive rates attached to the default
    /// zone always match, so out-of-zone sales of inclusive-priced items get
    /// their embedded tax refunded.
    pub fn match_rates(&self, order: &Order) -> Vec<Arc<TaxRate>> {
        let charges_tax = order
            .distributor
            .and_then(|id| self.catalog.enterprise(id))
            .map(|e| e.charges_sales_tax)
            .unwrap_or(false);
        if !charges_tax {
            return Vec::new();
        }
        let Some(zone) = self.order_tax_zone(order) else {
            return Vec::new();
        };
        let mut matched: Vec<Arc<TaxRate>> = self
            .rates
            .iter()
            .filter(|r| {
                r.zone.id == zone.id
                    || r.zone.contains(&zone)
                    || (r.included_in_price && r.zone.default_tax)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        matched
    }

    /// Whether the order's zone is covered by the rate's zone (or the home
    /// default zone). False means the sale left the rate's jurisdiction.
    fn zone_matches(&self, rate: &TaxRate, order_zone: Option<&Arc<Zone>>) -> bool {
        let Some(zone) = order_zone else {
            return false;
        };
        if rate.zone.id == zone.id || rate.zone.contains(zone) {
            return true;
        }
        self.default_zone()
            .map(|d| d.id == zone.id || d.contains(zone))
            .unwrap_or(false)
    }

    /// Delete and recreate the tax adjustments of every line item.
    ///
    /// Idempotent: running twice with unchanged inputs yields the same
    /// adjustments. Zero-amount taxes are skipped, and stale taxes on items
    /// no longer covered by any rate disappear with the deletion pass.
    pub fn adjust(&self, order: &mut Order) -> DomainResult<()> {
        let rates = self.match_rates(order);
        let order_zone = self.order_tax_zone(order);

        let items: Vec<_> = order.line_items.clone();
        for li in items {
            order
                .adjustments
                .retain(|a| !(a.adjustable == Adjustable::LineItem(li.id) && a.originator.is_tax()));

            let Some(category) = li.tax_category else {
                continue;
            };
            for rate in rates.iter().filter(|r| r.tax_category == category) {
                let tax = rate.compute_tax(li.amount());
                if tax.is_zero() {
                    continue;
                }
                let category_name = self.catalog.tax_category(category).map(|c| c.name);
                let in_zone = self.zone_matches(rate, order_zone.as_ref());

                let adjustment = if rate.included_in_price {
                    if in_zone {
                        // Tax already inside the price: shown, never added.
                        Adjustment::new(
                            rate.label(false, category_name.as_deref()),
                            tax,
                            Adjustable::LineItem(li.id),
                            Originator::TaxRate(Arc::clone(rate)),
                        )
                        .included_in_price()
                    } else {
                        // The sale left the rate's jurisdiction: refund the
                        // home tax embedded in the price.
                        Adjustment::new(
                            rate.label(true, category_name.as_deref()),
                            -tax,
                            Adjustable::LineItem(li.id),
                            Originator::TaxRate(Arc::clone(rate)),
                        )
                    }
                } else {
                    Adjustment::new(
                        rate.label(false, category_name.as_deref()),
                        tax,
                        Adjustable::LineItem(li.id),
                        Originator::TaxRate(Arc::clone(rate)),
                    )
                };
                order.adjustments.push(adjustment);
            }
        }
        debug!(order = %order.id, rates = rates.len(), "recomputed tax adjustments");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_item::LineItem;
    use farmgate_catalog::{Enterprise, Product, TaxCategory, Variant};
    use farmgate_core::{CurrencyCode, Money};
    use farmgate_pricing::{Address, ZoneMember};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        config: EngineConfig,
        catalog: Catalog,
        category: farmgate_catalog::TaxCategoryId,
        zones: Vec<Arc<Zone>>,
        variant: Variant,
        hub: farmgate_catalog::EnterpriseId,
    }

    impl Fixture {
        fn new() -> Self {
            let catalog = Catalog::new();
            let hub = catalog.add_enterprise(Enterprise::new("Hub"));
            let category = catalog.add_tax_category(TaxCategory::new("Food"));
            let product = catalog.add_product(Product::new("Apples", hub).unwrap());
            let variant = Variant::new(product, "APL-1", Money::new(dec!(10.00)))
                .unwrap()
                .with_tax_category(category);
            catalog.add_variant(variant.clone());
            let au = Arc::new(
                Zone::new("AU", vec![ZoneMember::Country("AU".to_string())]).default_tax_zone(),
            );
            let nz = Arc::new(Zone::new(
                "NZ",
                vec![ZoneMember::Country("NZ".to_string())],
            ));
            Self {
                config: EngineConfig::default(),
                catalog,
                category,
                zones: vec![au, nz],
                variant,
                hub,
            }
        }

        fn au_zone(&self) -> Arc<Zone> {
            Arc::clone(&self.zones[0])
        }

        fn rate(&self, amount: Decimal, inclusive: bool) -> Arc<TaxRate> {
            let rate = TaxRate::new("GST", amount, self.au_zone(), self.category);
            Arc::new(if inclusive { rate.inclusive() } else { rate })
        }

        fn order_in(&self, country: &str, quantity: i64) -> Order {
            let mut order = Order::new(CurrencyCode::default());
            order.distributor = Some(self.hub);
            order.ship_address = Some(Address::new(country));
            let li = LineItem::new(
                &self.variant,
                self.variant.price,
                Some(self.category),
                quantity,
            )
            .unwrap();
            order.line_items.push(li);
            order
        }

        fn engine<'a>(&'a self, rates: &'a [Arc<TaxRate>]) -> TaxEngine<'a> {
            TaxEngine::new(&self.config, &self.catalog, rates, &self.zones)
        }
    }

    fn tax_adjustments(order: &Order) -> Vec<&Adjustment> {
        order
            .adjustments
            .iter()
            .filter(|a| a.originator.is_tax())
            .collect()
    }

    #[test]
    fn exclusive_tax_adds_on_top() {
        let fx = Fixture::new();
        let rates = vec![fx.rate(dec!(0.10), false)];
        let mut order = fx.order_in("AU", 2);

        fx.engine(&rates).adjust(&mut order).unwrap();
        order.refresh_totals();

        let taxes = tax_adjustments(&order);
        assert_eq!(taxes.len(), 1);
        assert_eq!(taxes[0].amount, Money::new(dec!(2.00)));
        assert!(!taxes[0].included);
        assert_eq!(order.total, Money::new(dec!(22.00)));
        assert_eq!(order.additional_tax_total, Money::new(dec!(2.00)));
    }

    #[test]
    fn inclusive_tax_is_shown_but_not_added() {
        let fx = Fixture::new();
        let rates = vec![fx.rate(dec!(0.10), true)];
        let mut order = fx.order_in("AU", 2);

        fx.engine(&rates).adjust(&mut order).unwrap();
        order.refresh_totals();

        let taxes = tax_adjustments(&order);
        assert_eq!(taxes.len(), 1);
        // 20.00 inclusive of 10%: 1.82 of embedded tax.
        assert_eq!(taxes[0].amount, Money::new(dec!(1.82)));
        assert!(taxes[0].included);
        assert_eq!(order.total, Money::new(dec!(20.00)));
        assert_eq!(order.included_tax_total, Money::new(dec!(1.82)));
    }

    #[test]
    fn known_foreign_zone_refunds_inclusive_tax() {
        let fx = Fixture::new();
        let rates = vec![fx.rate(dec!(0.10), true)];
        let mut order = fx.order_in("NZ", 2);

        fx.engine(&rates).adjust(&mut order).unwrap();
        order.refresh_totals();

        let taxes = tax_adjustments(&order);
        assert_eq!(taxes.len(), 1);
        assert_eq!(taxes[0].amount, Money::new(dec!(-1.82)));
        assert!(taxes[0].label.starts_with("Refund"));
        assert_eq!(order.total, Money::new(dec!(18.18)));
    }

    #[test]
    fn unknown_destination_falls_back_to_home_zone() {
        let fx = Fixture::new();
        let rates = vec![fx.rate(dec!(0.10), true)];
        // No zone covers US, so the default AU zone applies and the
        // inclusive price stands without a refund.
        let mut order = fx.order_in("US", 2);

        fx.engine(&rates).adjust(&mut order).unwrap();
        order.refresh_totals();

        let taxes = tax_adjustments(&order);
        assert_eq!(taxes.len(), 1);
        assert!(taxes[0].included);
        assert_eq!(order.total, Money::new(dec!(20.00)));
    }

    #[test]
    fn exclusive_rate_does_not_follow_out_of_zone() {
        let fx = Fixture::new();
        let rates = vec![fx.rate(dec!(0.10), false)];
        let mut order = fx.order_in("NZ", 2);

        fx.engine(&rates).adjust(&mut order).unwrap();
        assert!(tax_adjustments(&order).is_empty());
    }

    #[test]
    fn hub_not_charging_tax_clears_all_taxes() {
        let fx = Fixture::new();
        let rates = vec![fx.rate(dec!(0.10), false)];
        let mut order = fx.order_in("AU", 2);

        let engine = fx.engine(&rates);
        engine.adjust(&mut order).unwrap();
        assert_eq!(tax_adjustments(&order).len(), 1);

        // Swap in a hub that does not charge sales tax.
        let exempt = fx
            .catalog
            .add_enterprise(Enterprise::new("Exempt hub").without_sales_tax());
        order.distributor = Some(exempt);
        engine.adjust(&mut order).unwrap();
        assert!(tax_adjustments(&order).is_empty());
    }

    #[test]
    fn adjust_is_idempotent() {
        let fx = Fixture::new();
        let rates = vec![fx.rate(dec!(0.10), false)];
        let mut order = fx.order_in("AU", 2);

        let engine = fx.engine(&rates);
        engine.adjust(&mut order).unwrap();
        engine.adjust(&mut order).unwrap();
        order.refresh_totals();

        assert_eq!(tax_adjustments(&order).len(), 1);
        assert_eq!(order.total, Money::new(dec!(22.00)));
    }

    #[test]
    fn rate_order_is_stable_by_creation() {
        let fx = Fixture::new();
        let first = fx.rate(dec!(0.05), false);
        let second = fx.rate(dec!(0.10), false);
        let rates = vec![Arc::clone(&second), first.clone()];
        let mut order = fx.order_in("AU", 1);

        fx.engine(&rates).adjust(&mut order).unwrap();
        let taxes = tax_adjustments(&order);
        assert_eq!(taxes.len(), 2);
        // Oldest rate first regardless of input order.
        assert_eq!(taxes[0].amount, Money::new(dec!(0.50)));
        assert_eq!(taxes[1].amount, Money::new(dec!(1.00)));
    }

    #[test]
    fn uncategorized_items_carry_no_tax() {
        let fx = Fixture::new();
        let rates = vec![fx.rate(dec!(0.10), false)];
        let mut order = fx.order_in("AU", 1);
        order.line_items[0].tax_category = None;

        fx.engine(&rates).adjust(&mut order).unwrap();
        assert!(tax_adjustments(&order).is_empty());
    }

    #[test]
    fn no_tax_address_means_no_tax() {
        let fx = Fixture::new();
        let rates = vec![fx.rate(dec!(0.10), false)];
        let mut order = fx.order_in("AU", 1);
        order.ship_address = None;

        fx.engine(&rates).adjust(&mut order).unwrap();
        assert!(tax_adjustments(&order).is_empty());
    }

    #[test]
    fn state_zone_beats_country_zone() {
        let mut fx = Fixture::new();
        let vic = Arc::new(Zone::new(
            "Victoria",
            vec![ZoneMember::State {
                country: "AU".to_string(),
                state: "VIC".to_string(),
            }],
        ));
        fx.zones.push(Arc::clone(&vic));

        let rates: Vec<Arc<TaxRate>> = Vec::new();
        let engine = fx.engine(&rates);
        let mut order = fx.order_in("AU", 1);
        order.ship_address = Some(Address::new("AU").with_state("VIC"));

        let zone = engine.order_tax_zone(&order).unwrap();
        assert_eq!(zone.id, vic.id);
    }
}
