//! Outbound notification seam.

use crate::order::OrderId;
use crate::shipment::ShipmentId;

/// Customer-facing notifications emitted by the reconciler.
///
/// The engine only decides *when* to notify; delivery (mail, webhook) is the
/// embedder's concern.
pub trait Notifier: Send + Sync {
    fn order_confirmation(&self, order: OrderId);
    fn shipment_confirmation(&self, order: OrderId, shipment: ShipmentId);
}

/// Discards all notifications.
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn order_confirmation(&self, _order: OrderId) {}
    fn shipment_confirmation(&self, _order: OrderId, _shipment: ShipmentId) {}
}

/// Captures notifications for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub confirmations: std::sync::Mutex<Vec<OrderId>>,
    pub shipment_notices: std::sync::Mutex<Vec<(OrderId, ShipmentId)>>,
}

impl Notifier for RecordingNotifier {
    fn order_confirmation(&self, order: OrderId) {
        if let Ok(mut sent) = self.confirmations.lock() {
            sent.push(order);
        }
    }

    fn shipment_confirmation(&self, order: OrderId, shipment: ShipmentId) {
        if let Ok(mut sent) = self.shipment_notices.lock() {
            sent.push((order, shipment));
        }
    }
}
