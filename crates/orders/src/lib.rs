//! Orders: the fulfillment and financial-adjustment side of the marketplace.
//!
//! The [`OrderReconciler`] is the crate's front door; everything else is the
//! order aggregate and the engines it delegates to.

pub mod adjustment;
pub mod allocator;
pub mod fees;
pub mod line_item;
pub mod notify;
pub mod order;
pub mod payment;
pub mod reconciler;
pub mod shipment;
pub mod store;
pub mod tax;


pub use adjustment::{
    Adjustable, Adjustment, AdjustmentId, AdjustmentState, Originator, RecomputeOutcome,
    ReturnAuthorizationId,
};
pub use allocator::{FillPlan, InventoryAllocator};
pub use fees::FeeEngine;
pub use line_item::{LineItem, LineItemId};
pub use notify::{Notifier, NullNotifier, RecordingNotifier};
pub use order::{Order, OrderId, OrderState, PaymentStateSummary, ShipmentStateSummary};
pub use payment::{Payment, PaymentId, PaymentState};
pub use reconciler::OrderReconciler;
pub use shipment::{OrderContext, Shipment, ShipmentId, ShipmentState};
pub use store::OrderStore;
pub use tax::TaxEngine;
