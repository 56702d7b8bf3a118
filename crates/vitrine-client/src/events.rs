//! Application events broadcast to whatever front-end is attached.
//!
//! Delivery is best-effort: an event emitted with no live subscriber is
//! dropped.  Services use events for the toast/navigation shaped outcomes;
//! real failures travel as [`ShopError`](crate::ShopError) instead.

use serde::Serialize;
use tokio::sync::broadcast;

/// Events emitted by the core services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ShopEvent {
    /// Navigate to checkout with the selected cart-item ids, comma-joined.
    CheckoutRequested { cart_item_ids: String },
    /// A user-facing warning (quantity exceeds stock, out of stock, ...).
    Warning { message: String },
    /// A product landed in the cart.
    AddedToCart { product_name: String },
    FavoriteAdded { product_name: String },
    FavoriteRemoved { product_name: String },
    /// The attempted action needs a logged-in user.
    LoginRequired,
    /// The attempted action needs the admin entitlement.
    PermissionDenied,
}

/// Broadcast bus for [`ShopEvent`]s.
#[derive(Clone)]
pub struct Events {
    tx: broadcast::Sender<ShopEvent>,
}

impl Events {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Open a new subscription.  Each subscriber sees every event emitted
    /// after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ShopEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: ShopEvent) {
        if self.tx.send(event.clone()).is_err() {
            tracing::debug!(event = ?event, "no subscriber for event");
        }
    }
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_emitted_events() {
        let events = Events::new();
        let mut rx = events.subscribe();

        events.emit(ShopEvent::LoginRequired);

        assert_eq!(rx.try_recv().unwrap(), ShopEvent::LoginRequired);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn emitting_without_subscribers_does_not_panic() {
        Events::new().emit(ShopEvent::PermissionDenied);
    }
}
