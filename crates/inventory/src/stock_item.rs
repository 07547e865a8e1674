//! Stock items and the ledger that mutates them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use farmgate_catalog::{StockSnapshot, Variant, VariantId};
use farmgate_core::{DomainError, DomainResult, entity_id};
use serde::{Deserialize, Serialize};
use tracing::debug;

entity_id!(
    /// Stock item identifier.
    StockItemId
);

/// Per-variant on-hand counter at the default stock location.
///
/// `count_on_hand` is signed: a backorderable row may briefly go negative
/// while promised stock is outstanding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: StockItemId,
    pub variant: VariantId,
    pub count_on_hand: i64,
    pub backorderable: bool,
}

/// Sink for backordered units awaiting stock.
///
/// Implemented by the order store: transition up to `max` of the oldest
/// backordered units of `variant` to on-hand, returning how many were filled.
pub trait BackorderQueue {
    fn fill_oldest(&self, variant: VariantId, max: i64) -> i64;
}

/// No outstanding backorders; used where fulfillment must not recurse into
/// the order currently being edited.
pub struct NoBackorders;

impl BackorderQueue for NoBackorders {
    fn fill_oldest(&self, _variant: VariantId, _max: i64) -> i64 {
        0
    }
}

/// The single serialization point for raw stock counts.
///
/// Every mutation takes the exclusive per-row lock for the duration of the
/// read-modify-write, so concurrent checkouts of the same variant serialize
/// and no increment is ever lost.
#[derive(Debug, Default)]
pub struct StockLedger {
    rows: RwLock<HashMap<VariantId, Arc<Mutex<StockItem>>>>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the stock row for a variant.
    pub fn put(&self, variant: VariantId, count_on_hand: i64, backorderable: bool) {
        let item = StockItem {
            id: StockItemId::new(),
            variant,
            count_on_hand,
            backorderable,
        };
        if let Ok(mut rows) = self.rows.write() {
            rows.insert(variant, Arc::new(Mutex::new(item)));
        }
    }

    fn row(&self, variant: VariantId) -> DomainResult<Arc<Mutex<StockItem>>> {
        self.rows
            .read()
            .map_err(|_| DomainError::conflict("stock ledger lock poisoned"))?
            .get(&variant)
            .cloned()
            .ok_or_else(|| {
                DomainError::invariant(format!("no stock item for variant {variant}"))
            })
    }

    pub fn count_on_hand(&self, variant: VariantId) -> DomainResult<i64> {
        let row = self.row(variant)?;
        let item = row
            .lock()
            .map_err(|_| DomainError::conflict("stock row lock poisoned"))?;
        Ok(item.count_on_hand)
    }

    /// Effective stock view for a variant, before hub scoping.
    pub fn snapshot(&self, variant: &Variant) -> DomainResult<StockSnapshot> {
        let row = self.row(variant.id)?;
        let item = row
            .lock()
            .map_err(|_| DomainError::conflict("stock row lock poisoned"))?;
        Ok(StockSnapshot {
            on_hand: item.count_on_hand,
            backorderable: item.backorderable,
            price: variant.price,
            overridden: false,
        })
    }

    /// Atomically apply `delta` to the variant's on-hand count.
    ///
    /// Runs entirely under the row lock. A non-backorderable row is never
    /// allowed to go negative. When the adjusted count is positive,
    /// outstanding backordered units are filled oldest-first through
    /// `backorders`, each fill consuming one unit of count, stopping as soon
    /// as stock is exhausted. Returns the new count.
    pub fn adjust_count_on_hand(
        &self,
        variant: VariantId,
        delta: i64,
        backorders: &dyn BackorderQueue,
    ) -> DomainResult<i64> {
        let row = self.row(variant)?;
        let mut item = row
            .lock()
            .map_err(|_| DomainError::conflict("stock row lock poisoned"))?;

        let mut new_count = item.count_on_hand + delta;
        if new_count < 0 && !item.backorderable {
            return Err(DomainError::insufficient_stock(format!(
                "variant {variant}: {} on hand, {} requested",
                item.count_on_hand, -delta
            )));
        }

        if new_count > 0 {
            let filled = backorders.fill_oldest(variant, new_count);
            new_count -= filled;
            if filled > 0 {
                debug!(%variant, filled, "filled backorders from restock");
            }
        }

        item.count_on_hand = new_count;
        debug!(%variant, delta, new_count, "adjusted count on hand");
        Ok(new_count)
    }
}
