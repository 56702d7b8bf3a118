//! CRUD operations for [`User`] rows.

use rusqlite::params;

use vitrine_shared::User;

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Insert or update a user record.
    pub fn upsert_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (id, email, name, is_admin)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (id) DO UPDATE SET
                 email = excluded.email,
                 name = excluded.name,
                 is_admin = excluded.is_admin",
            params![user.id, user.email, user.name, user.is_admin],
        )?;
        Ok(())
    }

    /// Fetch a user by id, `None` when absent.
    pub fn user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.user_query("SELECT id, email, name, is_admin FROM users WHERE id = ?1", id)
    }

    /// Fetch a user by email, `None` when absent.
    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_query(
            "SELECT id, email, name, is_admin FROM users WHERE email = ?1",
            email,
        )
    }

    /// Fetch a user by display name, `None` when absent.
    pub fn user_by_name(&self, name: &str) -> Result<Option<User>> {
        self.user_query(
            "SELECT id, email, name, is_admin FROM users WHERE name = ?1",
            name,
        )
    }

    fn user_query(&self, sql: &str, value: &str) -> Result<Option<User>> {
        let mut stmt = self.conn().prepare(sql)?;
        let mut rows = stmt.query_map(params![value], row_to_user)?;
        rows.next().transpose().map_err(Into::into)
    }
}

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        is_admin: row.get(3)?,
    })
}
