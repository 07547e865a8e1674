//! Payments and their gateway-facing lifecycle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use farmgate_core::{DomainError, DomainResult, Entity, Money, entity_id};
use farmgate_pricing::PaymentMethod;

entity_id!(
    /// Payment identifier.
    PaymentId
);

/// Lifecycle of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Checkout,
    Pending,
    Completed,
    Failed,
    Void,
}

impl core::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            PaymentState::Checkout => "checkout",
            PaymentState::Pending => "pending",
            PaymentState::Completed => "completed",
            PaymentState::Failed => "failed",
            PaymentState::Void => "void",
        };
        f.write_str(s)
    }
}

/// One payment attempt against an order.
///
/// `identifier` is the short reference printed on receipts; the store
/// guarantees it is unique across all orders.
#[derive(Debug, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub amount: Money,
    pub method: Arc<PaymentMethod>,
    pub state: PaymentState,
    pub identifier: String,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(amount: Money, method: Arc<PaymentMethod>, identifier: String) -> Self {
        Self {
            id: PaymentId::new(),
            amount,
            method,
            state: PaymentState::Checkout,
            identifier,
            created_at: Utc::now(),
        }
    }

    fn transition(&mut self, to: PaymentState) -> DomainResult<()> {
        use PaymentState::*;
        let legal = matches!(
            (self.state, to),
            (Checkout, Pending)
                | (Checkout, Completed)
                | (Checkout, Failed)
                | (Checkout, Void)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Pending, Void)
                | (Completed, Void)
        );
        if !legal {
            return Err(DomainError::transition("payment", self.state, to));
        }
        self.state = to;
        Ok(())
    }

    /// Gateway accepted the charge.
    pub fn complete(&mut self) -> DomainResult<()> {
        self.transition(PaymentState::Completed)
    }

    /// Gateway declined or errored.
    pub fn fail(&mut self) -> DomainResult<()> {
        self.transition(PaymentState::Failed)
    }

    pub fn void(&mut self) -> DomainResult<()> {
        self.transition(PaymentState::Void)
    }

    pub fn pend(&mut self) -> DomainResult<()> {
        self.transition(PaymentState::Pending)
    }

    pub fn is_completed(&self) -> bool {
        self.state == PaymentState::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.state == PaymentState::Failed
    }
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
