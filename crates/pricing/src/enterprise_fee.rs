//! Enterprise fees charged inside a distribution cycle.

use std::sync::Arc;

use farmgate_catalog::EnterpriseId;
use farmgate_core::{Money, entity_id};
use serde::{Deserialize, Serialize};

use crate::calculator::{Calculator, ChargeBasis};

entity_id!(
    /// Enterprise fee identifier.
    EnterpriseFeeId
);

/// What the fee pays for; informational, carried into labels and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeType {
    Packing,
    Transport,
    Admin,
    Sales,
    Fundraising,
}

impl core::fmt::Display for FeeType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            FeeType::Packing => "packing",
            FeeType::Transport => "transport",
            FeeType::Admin => "admin",
            FeeType::Sales => "sales",
            FeeType::Fundraising => "fundraising",
        };
        f.write_str(s)
    }
}

/// A fee an enterprise charges on items or orders it handles.
///
/// The amount comes from an externally supplied [`Calculator`]; the engine
/// only depends on the `compute` contract.
#[derive(Debug, Clone)]
pub struct EnterpriseFee {
    pub id: EnterpriseFeeId,
    pub enterprise: EnterpriseId,
    pub name: String,
    pub fee_type: FeeType,
    pub calculator: Arc<dyn Calculator>,
}

impl EnterpriseFee {
    pub fn new(
        enterprise: EnterpriseId,
        name: impl Into<String>,
        fee_type: FeeType,
        calculator: Arc<dyn Calculator>,
    ) -> Self {
        Self {
            id: EnterpriseFeeId::new(),
            enterprise,
            name: name.into(),
            fee_type,
            calculator,
        }
    }

    pub fn compute(&self, basis: &ChargeBasis) -> Money {
        self.calculator.compute(basis)
    }

    pub fn label(&self) -> String {
        format!("{} fee ({})", self.name, self.fee_type)
    }
}
