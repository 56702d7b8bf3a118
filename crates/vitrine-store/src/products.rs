//! CRUD operations for [`Product`] rows.
//!
//! Upserts use `ON CONFLICT ... DO UPDATE` rather than `INSERT OR REPLACE`:
//! a REPLACE would delete-and-reinsert the row, firing the cart and favorite
//! cascade deletes.

use rusqlite::params;

use vitrine_shared::Product;

use crate::database::Database;
use crate::error::Result;

const PRODUCT_COLUMNS: &str =
    "id, name, brand, category, origin, price, stock, image_url, description";

impl Database {
    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// List the whole cached catalog.
    pub fn all_products(&self) -> Result<Vec<Product>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC"
        ))?;

        let rows = stmt.query_map([], row_to_product)?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    /// Fetch a single product, `None` when absent.
    pub fn product_by_id(&self, id: &str) -> Result<Option<Product>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 LIMIT 1"
        ))?;

        let mut rows = stmt.query_map(params![id], row_to_product)?;
        rows.next().transpose().map_err(Into::into)
    }

    /// Number of cached products.
    pub fn product_count(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Insert or update a single product.
    pub fn upsert_product(&self, product: &Product) -> Result<()> {
        self.conn().execute(
            "INSERT INTO products (id, name, brand, category, origin, price, stock, image_url, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (id) DO UPDATE SET
                 name = excluded.name,
                 brand = excluded.brand,
                 category = excluded.category,
                 origin = excluded.origin,
                 price = excluded.price,
                 stock = excluded.stock,
                 image_url = excluded.image_url,
                 description = excluded.description",
            params![
                product.id,
                product.name,
                product.brand,
                product.category,
                product.origin,
                product.price,
                product.stock,
                product.image_url,
                product.description,
            ],
        )?;
        Ok(())
    }

    /// Bulk upsert, one transaction for the whole batch.
    pub fn upsert_products(&self, products: &[Product]) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        for product in products {
            self.upsert_product(product)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete a product by id.  Returns `true` if a row was deleted.
    pub fn delete_product(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM products WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// Overwrite the stock counter of a product.
    pub fn update_stock(&self, product_id: &str, new_stock: i64) -> Result<()> {
        self.conn().execute(
            "UPDATE products SET stock = ?1 WHERE id = ?2",
            params![new_stock, product_id],
        )?;
        Ok(())
    }

    /// Decrement the stock counter by `quantity`.
    pub fn decrease_stock(&self, product_id: &str, quantity: i64) -> Result<()> {
        self.conn().execute(
            "UPDATE products SET stock = stock - ?1 WHERE id = ?2",
            params![quantity, product_id],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Product`].
pub(crate) fn row_to_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        brand: row.get(2)?,
        category: row.get(3)?,
        origin: row.get(4)?,
        price: row.get(5)?,
        stock: row.get(6)?,
        image_url: row.get(7)?,
        description: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn sample_product(id: &str, price: f64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            brand: "Maison".into(),
            category: "Pantry".into(),
            origin: "France".into(),
            price,
            stock: 10,
            image_url: format!("https://img.example/{id}.png"),
            description: "A very fine product".into(),
        }
    }

    #[test]
    fn upsert_and_read_back_preserves_every_field() {
        let (_dir, db) = open_db();
        let product = sample_product("p-1", 19.99);

        db.upsert_product(&product).unwrap();

        let loaded = db.product_by_id("p-1").unwrap().expect("present");
        assert_eq!(loaded, product);
    }

    #[test]
    fn upsert_overwrites_without_duplicating() {
        let (_dir, db) = open_db();
        db.upsert_product(&sample_product("p-1", 5.0)).unwrap();

        let mut updated = sample_product("p-1", 7.5);
        updated.stock = 3;
        db.upsert_product(&updated).unwrap();

        assert_eq!(db.product_count().unwrap(), 1);
        let loaded = db.product_by_id("p-1").unwrap().unwrap();
        assert_eq!(loaded.price, 7.5);
        assert_eq!(loaded.stock, 3);
    }

    #[test]
    fn bulk_upsert_applies_all_rows() {
        let (_dir, db) = open_db();
        let batch = vec![
            sample_product("p-1", 1.0),
            sample_product("p-2", 2.0),
            sample_product("p-3", 3.0),
        ];

        db.upsert_products(&batch).unwrap();
        assert_eq!(db.product_count().unwrap(), 3);
    }

    #[test]
    fn stock_helpers() {
        let (_dir, db) = open_db();
        db.upsert_product(&sample_product("p-1", 1.0)).unwrap();

        db.update_stock("p-1", 25).unwrap();
        assert_eq!(db.product_by_id("p-1").unwrap().unwrap().stock, 25);

        db.decrease_stock("p-1", 4).unwrap();
        assert_eq!(db.product_by_id("p-1").unwrap().unwrap().stock, 21);
    }

    #[test]
    fn missing_product_reads_as_none() {
        let (_dir, db) = open_db();
        assert!(db.product_by_id("nope").unwrap().is_none());
        assert!(!db.delete_product("nope").unwrap());
    }
}
