//! Hub-scoped stock views.
//!
//! A distributor hub may override a variant's price and stock within its own
//! context. The engine never reads raw variant data for availability checks;
//! it always goes through a [`StockScoper`] first.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use farmgate_core::Money;
use serde::{Deserialize, Serialize};

use crate::enterprise::EnterpriseId;
use crate::product::{Variant, VariantId};

/// The effective stock position of a variant as seen by one hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub on_hand: i64,
    pub backorderable: bool,
    pub price: Money,
    /// True when a hub override replaced the shared counters; stock movements
    /// must then be booked against the override, not the shared ledger.
    pub overridden: bool,
}

/// Resolves hub-specific stock overrides before any availability check.
pub trait StockScoper: Send + Sync {
    /// Replace the base stock view with the hub's, if one exists.
    fn scope(
        &self,
        hub: Option<EnterpriseId>,
        variant: &Variant,
        base: StockSnapshot,
    ) -> StockSnapshot;

    /// Book a stock movement against the hub's override counters.
    ///
    /// Only called for snapshots reported as `overridden`.
    fn adjust(&self, _hub: EnterpriseId, _variant: VariantId, _delta: i64) {}
}

impl<S> StockScoper for Arc<S>
where
    S: StockScoper + ?Sized,
{
    fn scope(
        &self,
        hub: Option<EnterpriseId>,
        variant: &Variant,
        base: StockSnapshot,
    ) -> StockSnapshot {
        (**self).scope(hub, variant, base)
    }

    fn adjust(&self, hub: EnterpriseId, variant: VariantId, delta: i64) {
        (**self).adjust(hub, variant, delta)
    }
}

/// Identity scoper: every hub sees the shared stock position.
#[derive(Debug, Default)]
pub struct NullScoper;

impl StockScoper for NullScoper {
    fn scope(
        &self,
        _hub: Option<EnterpriseId>,
        _variant: &Variant,
        base: StockSnapshot,
    ) -> StockSnapshot {
        base
    }
}

/// Per-hub replacement of a variant's price/stock, visible only in that hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOverride {
    pub hub: EnterpriseId,
    pub variant: VariantId,
    pub price: Option<Money>,
    pub count_on_hand: Option<i64>,
    /// When set, replaces the backorderable flag ("on demand" stock).
    pub on_demand: Option<bool>,
}

impl VariantOverride {
    pub fn new(hub: EnterpriseId, variant: VariantId) -> Self {
        Self {
            hub,
            variant,
            price: None,
            count_on_hand: None,
            on_demand: None,
        }
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_count_on_hand(mut self, count: i64) -> Self {
        self.count_on_hand = Some(count);
        self
    }

    pub fn with_on_demand(mut self, on_demand: bool) -> Self {
        self.on_demand = Some(on_demand);
        self
    }
}

/// Scoper backed by an in-memory table of [`VariantOverride`] rows.
#[derive(Debug, Default)]
pub struct HubOverrideScoper {
    overrides: RwLock<HashMap<(EnterpriseId, VariantId), VariantOverride>>,
}

impl HubOverrideScoper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, vo: VariantOverride) {
        if let Ok(mut map) = self.overrides.write() {
            map.insert((vo.hub, vo.variant), vo);
        }
    }

    pub fn get(&self, hub: EnterpriseId, variant: VariantId) -> Option<VariantOverride> {
        let map = self.overrides.read().ok()?;
        map.get(&(hub, variant)).cloned()
    }
}

impl StockScoper for HubOverrideScoper {
    fn scope(
        &self,
        hub: Option<EnterpriseId>,
        variant: &Variant,
        base: StockSnapshot,
    ) -> StockSnapshot {
        let Some(hub) = hub else { return base };
        let Some(vo) = self.get(hub, variant.id) else {
            return base;
        };
        // An override row counts as overriding stock only when it pins the
        // counters, not when it just re-prices the variant.
        let overrides_stock = vo.count_on_hand.is_some() || vo.on_demand.is_some();
        StockSnapshot {
            on_hand: vo.count_on_hand.unwrap_or(base.on_hand),
            backorderable: vo.on_demand.unwrap_or(base.backorderable),
            price: vo.price.unwrap_or(base.price),
            overridden: overrides_stock,
        }
    }

    fn adjust(&self, hub: EnterpriseId, variant: VariantId, delta: i64) {
        if let Ok(mut map) = self.overrides.write()
            && let Some(vo) = map.get_mut(&(hub, variant))
            && let Some(count) = vo.count_on_hand.as_mut()
        {
            *count += delta;
        }
    }
}
