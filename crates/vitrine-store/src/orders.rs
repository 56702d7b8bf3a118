//! CRUD operations for [`Order`] and [`OrderItem`] rows.
//!
//! Orders are immutable once written; there are deliberately no update
//! helpers here.

use chrono::{DateTime, Utc};
use rusqlite::params;

use vitrine_shared::{Order, OrderItem};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Insert an order header.
    pub fn insert_order(&self, order: &Order) -> Result<()> {
        self.conn().execute(
            "INSERT INTO orders (id, user_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![order.id, order.user_id, order.created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Insert the line snapshots of an order, one transaction for the batch.
    ///
    /// The `id` field of each item is ignored on insert (auto-assigned).
    pub fn insert_order_items(&self, items: &[OrderItem]) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        {
            let mut stmt = self.conn().prepare(
                "INSERT INTO order_items (order_id, product_id, quantity, price)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for item in items {
                stmt.execute(params![
                    item.order_id,
                    item.product_id,
                    item.quantity,
                    item.price
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// List a user's orders, newest first.
    pub fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, created_at
             FROM orders
             WHERE user_id = ?1
             ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map(params![user_id], row_to_order)?;

        let mut orders = Vec::new();
        for row in rows {
            orders.push(row?);
        }
        Ok(orders)
    }

    /// List the line snapshots of an order.
    pub fn items_for_order(&self, order_id: &str) -> Result<Vec<OrderItem>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, order_id, product_id, quantity, price
             FROM order_items
             WHERE order_id = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![order_id], |row| {
            Ok(OrderItem {
                id: row.get(0)?,
                order_id: row.get(1)?,
                product_id: row.get(2)?,
                quantity: row.get(3)?,
                price: row.get(4)?,
            })
        })?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

/// Map a `rusqlite::Row` to an [`Order`].
fn row_to_order(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    let created_str: String = row.get(2)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Order {
        id: row.get(0)?,
        user_id: row.get(1)?,
        created_at,
    })
}
