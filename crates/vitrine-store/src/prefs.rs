//! Session preference persistence.
//!
//! Preferences live in a single JSON row so the record can grow fields
//! without schema migrations.

use rusqlite::params;

use vitrine_shared::SessionPrefs;

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Load the persisted session preferences.
    ///
    /// A missing row yields the defaults (logged out, nothing remembered);
    /// a corrupt row is a real error.
    pub fn session_prefs(&self) -> Result<SessionPrefs> {
        let result: std::result::Result<String, _> =
            self.conn()
                .query_row("SELECT json FROM session WHERE id = 1", [], |row| {
                    row.get(0)
                });

        match result {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(SessionPrefs::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the session preferences, replacing any previous record.
    pub fn save_session_prefs(&self, prefs: &SessionPrefs) -> Result<()> {
        let json = serde_json::to_string(prefs)?;

        self.conn().execute(
            "INSERT OR REPLACE INTO session (id, json) VALUES (1, ?1)",
            params![json],
        )?;
        Ok(())
    }
}
