//! Order history reads.  Orders are written by the cart's
//! [`place_order`](crate::CartService::place_order) and immutable afterwards.

use vitrine_shared::{Order, OrderItem};

use crate::core::{lock, Db};
use crate::error::Result;

#[derive(Clone)]
pub struct OrderService {
    db: Db,
}

impl OrderService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// A user's orders, newest first.
    pub fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        Ok(lock(&self.db)?.orders_for_user(user_id)?)
    }

    /// The line snapshots of one order.
    pub fn items_for_order(&self, order_id: &str) -> Result<Vec<OrderItem>> {
        Ok(lock(&self.db)?.items_for_order(order_id)?)
    }
}
