//! Inventory domain: stock counters and the units that track ordered items.
//!
//! The [`StockLedger`] is the single serialization point for raw stock counts;
//! [`InventoryUnit`]s follow each ordered item instance through on-hand,
//! backordered, shipped and returned states.

pub mod stock_item;
pub mod unit;

pub use stock_item::{BackorderQueue, NoBackorders, StockItem, StockItemId, StockLedger};
pub use unit::{InventoryUnit, InventoryUnitId, InventoryUnitState};
