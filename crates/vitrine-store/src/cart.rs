//! CRUD operations for cart rows.
//!
//! Cart reads join against `products` so callers always receive the
//! denormalized [`CartLine`] pair.  Quantity updates that reach zero are the
//! caller's cue to delete the row instead; the store never persists a
//! non-positive quantity on its own.

use rusqlite::params;

use vitrine_shared::{CartItem, CartLine};

use crate::database::Database;
use crate::error::{Result, StoreError};

const LINE_SELECT: &str = "SELECT c.id, c.user_id, c.product_id, c.quantity,
            p.id, p.name, p.brand, p.category, p.origin, p.price, p.stock, p.image_url, p.description
     FROM cart_items c
     JOIN products p ON p.id = c.product_id";

impl Database {
    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// All cart lines for a user, oldest first.
    pub fn cart_lines(&self, user_id: &str) -> Result<Vec<CartLine>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("{LINE_SELECT} WHERE c.user_id = ?1 ORDER BY c.id ASC"))?;

        let rows = stmt.query_map(params![user_id], row_to_cart_line)?;

        let mut lines = Vec::new();
        for row in rows {
            lines.push(row?);
        }
        Ok(lines)
    }

    /// Fetch a single cart line by cart-item id.
    pub fn cart_line_by_id(&self, cart_item_id: i64) -> Result<CartLine> {
        self.conn()
            .query_row(
                &format!("{LINE_SELECT} WHERE c.id = ?1"),
                params![cart_item_id],
                row_to_cart_line,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Fetch cart lines for an explicit id list (checkout read).
    ///
    /// Ids that no longer exist are silently skipped.
    pub fn cart_lines_by_ids(&self, cart_item_ids: &[i64]) -> Result<Vec<CartLine>> {
        let mut lines = Vec::new();
        for id in cart_item_ids {
            match self.cart_line_by_id(*id) {
                Ok(line) => lines.push(line),
                Err(StoreError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(lines)
    }

    /// The cart row for a (user, product) pair, `None` when absent.
    pub fn cart_item(&self, user_id: &str, product_id: &str) -> Result<Option<CartItem>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, product_id, quantity
             FROM cart_items
             WHERE user_id = ?1 AND product_id = ?2",
        )?;

        let mut rows = stmt.query_map(params![user_id, product_id], row_to_cart_item)?;
        rows.next().transpose().map_err(Into::into)
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Insert a new cart row.  Returns the auto-assigned id.
    pub fn insert_cart_item(&self, user_id: &str, product_id: &str, quantity: i64) -> Result<i64> {
        self.conn().execute(
            "INSERT INTO cart_items (user_id, product_id, quantity)
             VALUES (?1, ?2, ?3)",
            params![user_id, product_id, quantity],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// Overwrite the quantity of an existing cart row.
    pub fn update_cart_quantity(&self, cart_item_id: i64, quantity: i64) -> Result<()> {
        self.conn().execute(
            "UPDATE cart_items SET quantity = ?1 WHERE id = ?2",
            params![quantity, cart_item_id],
        )?;
        Ok(())
    }

    /// Delete a cart row.  Returns `true` if a row was deleted.
    pub fn delete_cart_item(&self, cart_item_id: i64) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM cart_items WHERE id = ?1",
            params![cart_item_id],
        )?;
        Ok(affected > 0)
    }

    /// Remove every cart row of a user.  Returns the number of rows removed.
    pub fn clear_cart(&self, user_id: &str) -> Result<usize> {
        let affected = self
            .conn()
            .execute("DELETE FROM cart_items WHERE user_id = ?1", params![user_id])?;
        Ok(affected)
    }

    /// Consume one purchased cart line: delete the cart row and decrement the
    /// product's stock by the purchased quantity, atomically for this pair.
    ///
    /// Cross-line atomicity at order placement is NOT provided here; callers
    /// iterate the purchased lines and a mid-loop failure leaves earlier
    /// pairs applied.
    pub fn consume_cart_line(
        &self,
        cart_item_id: i64,
        product_id: &str,
        quantity: i64,
    ) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        self.delete_cart_item(cart_item_id)?;
        self.decrease_stock(product_id, quantity)?;
        tx.commit()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_cart_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<CartItem> {
    Ok(CartItem {
        id: row.get(0)?,
        user_id: row.get(1)?,
        product_id: row.get(2)?,
        quantity: row.get(3)?,
    })
}

/// Map a joined `cart_items x products` row to a [`CartLine`].
/// Product columns start after the four cart columns.
fn row_to_cart_line(row: &rusqlite::Row<'_>) -> rusqlite::Result<CartLine> {
    let item = row_to_cart_item(row)?;

    let product = vitrine_shared::Product {
        id: row.get(4)?,
        name: row.get(5)?,
        brand: row.get(6)?,
        category: row.get(7)?,
        origin: row.get(8)?,
        price: row.get(9)?,
        stock: row.get(10)?,
        image_url: row.get(11)?,
        description: row.get(12)?,
    };

    Ok(CartLine { item, product })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_shared::{Product, User};

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn seed(db: &Database) {
        db.upsert_user(&User {
            id: "u-1".into(),
            email: "u-1@example.com".into(),
            name: "u-1".into(),
            is_admin: false,
        })
        .unwrap();
        db.upsert_product(&Product {
            id: "p-1".into(),
            name: "Tea".into(),
            brand: "Maison".into(),
            category: "Pantry".into(),
            origin: "France".into(),
            price: 4.0,
            stock: 8,
            image_url: String::new(),
            description: String::new(),
        })
        .unwrap();
    }

    #[test]
    fn insert_read_join_round_trip() {
        let (_dir, db) = open_db();
        seed(&db);

        let id = db.insert_cart_item("u-1", "p-1", 2).unwrap();

        let lines = db.cart_lines("u-1").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].item.id, id);
        assert_eq!(lines[0].item.quantity, 2);
        assert_eq!(lines[0].product.name, "Tea");
        assert_eq!(lines[0].subtotal(), 8.0);
    }

    #[test]
    fn unique_pair_constraint_rejects_duplicates() {
        let (_dir, db) = open_db();
        seed(&db);

        db.insert_cart_item("u-1", "p-1", 1).unwrap();
        assert!(db.insert_cart_item("u-1", "p-1", 1).is_err());
    }

    #[test]
    fn missing_line_maps_to_not_found() {
        let (_dir, db) = open_db();
        seed(&db);

        assert!(matches!(
            db.cart_line_by_id(99),
            Err(StoreError::NotFound)
        ));

        // ..while the batched read skips the hole.
        let id = db.insert_cart_item("u-1", "p-1", 1).unwrap();
        let lines = db.cart_lines_by_ids(&[99, id]).unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn deleting_the_product_cascades_into_the_cart() {
        let (_dir, db) = open_db();
        seed(&db);
        db.insert_cart_item("u-1", "p-1", 1).unwrap();

        db.delete_product("p-1").unwrap();
        assert!(db.cart_lines("u-1").unwrap().is_empty());
    }

    #[test]
    fn consume_cart_line_removes_row_and_decrements_stock() {
        let (_dir, db) = open_db();
        seed(&db);
        let id = db.insert_cart_item("u-1", "p-1", 3).unwrap();

        db.consume_cart_line(id, "p-1", 3).unwrap();

        assert!(db.cart_lines("u-1").unwrap().is_empty());
        assert_eq!(db.product_by_id("p-1").unwrap().unwrap().stock, 5);
    }

    #[test]
    fn clear_cart_only_touches_one_user() {
        let (_dir, db) = open_db();
        seed(&db);
        db.upsert_user(&User {
            id: "u-2".into(),
            email: "u-2@example.com".into(),
            name: "u-2".into(),
            is_admin: false,
        })
        .unwrap();

        db.insert_cart_item("u-1", "p-1", 1).unwrap();
        db.insert_cart_item("u-2", "p-1", 1).unwrap();

        assert_eq!(db.clear_cart("u-1").unwrap(), 1);
        assert_eq!(db.cart_lines("u-2").unwrap().len(), 1);
    }
}
