//! v001 -- Initial schema creation.
//!
//! Creates the core tables: `products`, `users`, `cart_items`, `orders`,
//! `order_items`, `favorites`, and the single-row `session` record.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Products (mirror of the remote catalog)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS products (
    id          TEXT PRIMARY KEY NOT NULL,   -- remote document id
    name        TEXT NOT NULL,
    brand       TEXT NOT NULL,
    category    TEXT NOT NULL,
    origin      TEXT NOT NULL,
    price       REAL NOT NULL,
    stock       INTEGER NOT NULL,
    image_url   TEXT NOT NULL,
    description TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Users (mirror of the remote user records)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id       TEXT PRIMARY KEY NOT NULL,      -- remote auth subject id
    email    TEXT NOT NULL,
    name     TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0      -- boolean 0/1
);

-- ----------------------------------------------------------------
-- Cart items (local-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS cart_items (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    TEXT NOT NULL,
    product_id TEXT NOT NULL,
    quantity   INTEGER NOT NULL,

    UNIQUE (user_id, product_id),
    FOREIGN KEY (user_id)    REFERENCES users(id)    ON DELETE CASCADE,
    FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_cart_items_user_id ON cart_items(user_id);

-- ----------------------------------------------------------------
-- Orders
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS orders (
    id         TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    user_id    TEXT NOT NULL,
    created_at TEXT NOT NULL,                -- ISO-8601 / RFC-3339

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_orders_user_created
    ON orders(user_id, created_at DESC);

CREATE TABLE IF NOT EXISTS order_items (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id   TEXT NOT NULL,
    product_id TEXT NOT NULL,
    quantity   INTEGER NOT NULL,
    price      REAL NOT NULL,                -- price at purchase time

    FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items(order_id);

-- ----------------------------------------------------------------
-- Favorites
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS favorites (
    user_id    TEXT NOT NULL,
    product_id TEXT NOT NULL,

    PRIMARY KEY (user_id, product_id),
    FOREIGN KEY (user_id)    REFERENCES users(id)    ON DELETE CASCADE,
    FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_favorites_user_id ON favorites(user_id);

-- ----------------------------------------------------------------
-- Session preferences (single JSON row)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS session (
    id   INTEGER PRIMARY KEY CHECK (id = 1),
    json TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
