//! Favorite toggling and reads.

use std::collections::HashSet;

use rusqlite::params;

use vitrine_shared::Product;

use crate::database::Database;
use crate::error::Result;
use crate::products::row_to_product;

impl Database {
    /// The set of product ids a user has favorited.
    pub fn favorite_ids(&self, user_id: &str) -> Result<HashSet<String>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT product_id FROM favorites WHERE user_id = ?1")?;

        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;

        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    /// Whether a product is favorited by a user.
    pub fn is_favorite(&self, user_id: &str, product_id: &str) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM favorites WHERE user_id = ?1 AND product_id = ?2",
            params![user_id, product_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Flip the favorite mark for a (user, product) pair.
    ///
    /// Returns `true` when the product is a favorite afterwards.
    pub fn toggle_favorite(&self, user_id: &str, product_id: &str) -> Result<bool> {
        if self.is_favorite(user_id, product_id)? {
            self.conn().execute(
                "DELETE FROM favorites WHERE user_id = ?1 AND product_id = ?2",
                params![user_id, product_id],
            )?;
            Ok(false)
        } else {
            self.conn().execute(
                "INSERT INTO favorites (user_id, product_id) VALUES (?1, ?2)",
                params![user_id, product_id],
            )?;
            Ok(true)
        }
    }

    /// The favorited products of a user, joined against the catalog.
    pub fn favorite_products(&self, user_id: &str) -> Result<Vec<Product>> {
        let mut stmt = self.conn().prepare(
            "SELECT p.id, p.name, p.brand, p.category, p.origin, p.price, p.stock, p.image_url, p.description
             FROM favorites f
             JOIN products p ON p.id = f.product_id
             WHERE f.user_id = ?1
             ORDER BY p.name ASC",
        )?;

        let rows = stmt.query_map(params![user_id], row_to_product)?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_shared::User;

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
            name: "Jam".into(),
            brand: "Maison".into(),
            category: "Pantry".into(),
            origin: "France".into(),
            price: 3.0,
            stock: 5,
            image_url: String::new(),
            description: String::new(),
        })
        .unwrap();
    }

    #[test]
    fn toggle_flips_membership() {
        let (_dir, db) = open_db();
        seed(&db);

        assert!(db.toggle_favorite("u-1", "p-1").unwrap());
        assert!(db.is_favorite("u-1", "p-1").unwrap());
        assert_eq!(db.favorite_products("u-1").unwrap().len(), 1);

        assert!(!db.toggle_favorite("u-1", "p-1").unwrap());
        assert!(db.favorite_ids("u-1").unwrap().is_empty());
    }

    #[test]
    fn deleting_the_product_cascades_out_of_favorites() {
        let (_dir, db) = open_db();
        seed(&db);
        db.toggle_favorite("u-1", "p-1").unwrap();

        db.delete_product("p-1").unwrap();
        assert!(db.favorite_ids("u-1").unwrap().is_empty());
    }
}
