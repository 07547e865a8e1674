//! The order store: per-order row locks and cross-order backorder filling.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use farmgate_catalog::VariantId;
use farmgate_core::{DomainError, DomainResult};
use farmgate_inventory::{BackorderQueue, InventoryUnitId};
use tracing::debug;

use crate::order::{Order, OrderId};

const IDENTIFIER_ATTEMPTS: usize = 10;

/// In-memory order repository.
///
/// Each order sits behind its own mutex; an operation holds exactly one order
/// lock at a time, which keeps concurrent edits of different orders parallel
/// and makes lock ordering a non-issue.
#[derive(Debug, Default)]
pub struct OrderStore {
    orders: RwLock<HashMap<OrderId, Arc<Mutex<Order>>>>,
    payment_identifiers: Mutex<HashSet<String>>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) -> DomainResult<OrderId> {
        let id = order.id;
        let mut orders = self
            .orders
            .write()
            .map_err(|_| DomainError::conflict("order store lock poisoned"))?;
        orders.insert(id, Arc::new(Mutex::new(order)));
        Ok(id)
    }

    fn row(&self, id: OrderId) -> DomainResult<Arc<Mutex<Order>>> {
        self.orders
            .read()
            .map_err(|_| DomainError::conflict("order store lock poisoned"))?
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    /// Run `f` with the order's row lock held.
    ///
    /// All reconciler operations go through here, so per-order mutations are
    /// serialized exactly like row-locked database updates.
    pub fn with_order<T>(
        &self,
        id: OrderId,
        f: impl FnOnce(&mut Order) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let row = self.row(id)?;
        let mut order = row
            .lock()
            .map_err(|_| DomainError::conflict("order row lock poisoned"))?;
        f(&mut order)
    }

    /// Snapshot an order by value for read paths.
    pub fn get(&self, id: OrderId) -> DomainResult<Order> {
        self.with_order(id, |order| Ok(order.clone()))
    }

    pub fn remove(&self, id: OrderId) -> DomainResult<()> {
        let mut orders = self
            .orders
            .write()
            .map_err(|_| DomainError::conflict("order store lock poisoned"))?;
        orders.remove(&id).ok_or(DomainError::NotFound)?;
        Ok(())
    }

    /// Reserve a unique payment identifier, regenerating on collision.
    pub fn claim_payment_identifier(&self) -> DomainResult<String> {
        let mut claimed = self
            .payment_identifiers
            .lock()
            .map_err(|_| DomainError::conflict("payment identifier lock poisoned"))?;
        for _ in 0..IDENTIFIER_ATTEMPTS {
            let candidate = generate_payment_identifier();
            if claimed.insert(candidate.clone()) {
                return Ok(candidate);
            }
        }
        Err(DomainError::conflict(
            "could not allocate a unique payment identifier",
        ))
    }

    /// A backorder queue over every order in the store.
    ///
    /// `exclude` names the order whose row lock the caller already holds;
    /// skipping it keeps a restock from deadlocking against itself. Other
    /// busy rows are skipped too (`try_lock`) rather than waited on: a
    /// concurrent edit will trigger its own recomputation anyway.
    pub fn backorder_queue(&self, exclude: Option<OrderId>) -> StoreBackorderQueue<'_> {
        StoreBackorderQueue {
            store: self,
            exclude,
        }
    }
}

/// Fills the oldest backordered units across all resident orders.
pub struct StoreBackorderQueue<'a> {
    store: &'a OrderStore,
    exclude: Option<OrderId>,
}

impl BackorderQueue for StoreBackorderQueue<'_> {
    fn fill_oldest(&self, variant: VariantId, max: i64) -> i64 {
        if max <= 0 {
            return 0;
        }
        let Ok(orders) = self.store.orders.read() else {
            return 0;
        };

        let mut guards = Vec::new();
        for (id, row) in orders.iter() {
            if Some(*id) == self.exclude {
                continue;
            }
            if let Ok(guard) = row.try_lock()
                && !guard.is_canceled()
                && guard
                    .shipments
                    .iter()
                    .any(|s| s.units.iter().any(|u| u.variant == variant && u.is_backordered()))
            {
                guards.push(guard);
            }
        }

        // Oldest first across every order; ids are time-ordered UUIDv7 so
        // the pair is a stable tie-break.
        let mut candidates: Vec<(DateTime<Utc>, InventoryUnitId, usize)> = Vec::new();
        for (idx, guard) in guards.iter().enumerate() {
            for shipment in guard.shipments.iter().filter(|s| !s.is_canceled()) {
                for unit in &shipment.units {
                    if unit.variant == variant && unit.is_backordered() {
                        candidates.push((unit.created_at, unit.id, idx));
                    }
                }
            }
        }
        candidates.sort();

        let mut filled = 0i64;
        for (_, unit_id, idx) in candidates.into_iter().take(max as usize) {
            let order = &mut *guards[idx];
            let unit = order
                .shipments
                .iter_mut()
                .flat_map(|s| s.units.iter_mut())
                .find(|u| u.id == unit_id);
            if let Some(unit) = unit
                && unit.fill_backorder().is_ok()
            {
                filled += 1;
            }
        }

        // Orders whose backorders just cleared may now be ready to ship.
        for guard in guards.iter_mut() {
            if guard.sync_shipment_states().is_ok() {
                guard.update_shipment_state();
            }
        }
        if filled > 0 {
            debug!(%variant, filled, "filled backordered units from restock");
        }
        filled
    }
}

// Short receipt reference: the random tail of a fresh id.
fn generate_payment_identifier() -> String {
    let digits: String = farmgate_core::AggregateId::new()
        .to_string()
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .rev()
        .take(8)
        .collect::<String>()
        .to_uppercase();
    format!("P{digits}")
}
