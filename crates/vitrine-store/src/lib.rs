//! # vitrine-store
//!
//! Local cache for the Vitrine application, backed by SQLite.
//!
//! The cache mirrors the remote catalog and user records for fast and
//! offline reads, and owns the cart, order, and favorite tables outright.
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model.

pub mod cart;
pub mod database;
pub mod favorites;
pub mod migrations;
pub mod orders;
pub mod prefs;
pub mod products;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
