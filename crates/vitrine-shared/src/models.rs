//! Domain model structs shared between the local cache and the cloud layer.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a UI layer over IPC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

/// A catalog product.  The remote store is authoritative for catalog content;
/// the local cache mirrors it for fast and offline reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Document id in the remote `products` collection.
    pub id: String,
    pub name: String,
    pub brand: String,
    pub category: String,
    /// Country or region of origin.
    pub origin: String,
    /// Unit price.  Never negative.
    pub price: f64,
    /// Units currently in stock.  Never negative; decremented at order
    /// placement.
    pub stock: i64,
    pub image_url: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A known user.  The id matches the remote auth subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Display name.
    pub name: String,
    /// Entitlement for product editing.  The remote value wins whenever both
    /// stores are reachable.
    pub is_admin: bool,
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

/// A single cart row.  One row exists per (user, product) pair; repeated
/// adds increment `quantity` instead of inserting duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartItem {
    /// Auto-assigned by the cache.
    pub id: i64,
    pub user_id: String,
    pub product_id: String,
    /// Always >= 1 while the row exists; reaching 0 deletes the row.
    pub quantity: i64,
}

/// A cart row joined with its product, as yielded by cart reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    pub item: CartItem,
    pub product: Product,
}

impl CartLine {
    /// Line subtotal at the product's current price.
    pub fn subtotal(&self) -> f64 {
        self.product.price * self.item.quantity as f64
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// A placed order.  Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    /// UUID v4, assigned at placement.
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A purchased line.  `price` is captured at order placement and never
/// updated afterwards, even when the product's price changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    /// Auto-assigned by the cache.
    pub id: i64,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub price: f64,
}

// ---------------------------------------------------------------------------
// Session preferences
// ---------------------------------------------------------------------------

/// Persisted login state observed by the sync and cart layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionPrefs {
    pub logged_in: bool,
    /// Remote auth subject id of the logged-in user, empty when logged out.
    pub user_id: String,
    /// Email kept for the "remember me" login prefill, empty when not opted
    /// in.  Survives sign-out.
    pub remember_me_email: String,
}

impl SessionPrefs {
    /// The logged-in user id, when one is actually present.
    pub fn active_user(&self) -> Option<&str> {
        if self.logged_in && !self.user_id.is_empty() {
            Some(&self.user_id)
        } else {
            None
        }
    }
}
