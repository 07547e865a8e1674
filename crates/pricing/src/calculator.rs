//! The calculator contract shared by every charge originator.

use core::fmt;
use std::sync::Arc;

use farmgate_core::Money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Snapshot of the entity a charge is computed against.
///
/// Plain data, so calculators never reach back into the order graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeBasis {
    LineItem {
        quantity: i64,
        price: Money,
        amount: Money,
        weight: Decimal,
    },
    Order {
        item_total: Money,
        item_count: i64,
        ship_total: Money,
    },
    Shipment {
        amount: Money,
    },
}

impl ChargeBasis {
    /// The monetary amount percentage-style calculators apply to.
    pub fn amount(&self) -> Money {
        match self {
            ChargeBasis::LineItem { amount, .. } => *amount,
            ChargeBasis::Order { item_total, .. } => *item_total,
            ChargeBasis::Shipment { amount } => *amount,
        }
    }

    /// Unit count for per-item calculators (1 for shipments).
    pub fn item_count(&self) -> i64 {
        match self {
            ChargeBasis::LineItem { quantity, .. } => *quantity,
            ChargeBasis::Order { item_count, .. } => *item_count,
            ChargeBasis::Shipment { .. } => 1,
        }
    }
}

/// External calculator contract: compute a charge from a basis.
pub trait Calculator: fmt::Debug + Send + Sync {
    fn compute(&self, basis: &ChargeBasis) -> Money;
}

impl<C> Calculator for Arc<C>
where
    C: Calculator + ?Sized,
{
    fn compute(&self, basis: &ChargeBasis) -> Money {
        (**self).compute(basis)
    }
}

/// Fixed amount regardless of basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRate {
    pub amount: Money,
}

impl Calculator for FlatRate {
    fn compute(&self, _basis: &ChargeBasis) -> Money {
        self.amount
    }
}

/// Percentage of the basis amount; `percent` is expressed as e.g. `10` = 10%.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatPercent {
    pub percent: Decimal,
}

impl Calculator for FlatPercent {
    fn compute(&self, basis: &ChargeBasis) -> Money {
        basis.amount() * (self.percent / Decimal::ONE_HUNDRED)
    }
}

/// Fixed amount per unit in the basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerItem {
    pub amount: Money,
}

impl Calculator for PerItem {
    fn compute(&self, basis: &ChargeBasis) -> Money {
        self.amount.times(basis.item_count())
    }
}
