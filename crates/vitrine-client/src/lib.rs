//! # vitrine-client
//!
//! Application core for Vitrine, an offline-first shopping client.
//!
//! The crate wires the local cache ([`vitrine_store`]) to the remote document
//! store and auth collaborators ([`vitrine_cloud`]) and exposes reactive
//! services on top: the sync reconciler, the cart state machine, the catalog
//! filter pipeline, favorites, orders, and the session.  A UI subscribes to
//! the services' watch channels and the [`events::Events`] bus; it never
//! touches the stores directly.

pub mod cart;
pub mod catalog;
pub mod core;
pub mod error;
pub mod events;
pub mod favorites;
pub mod orders;
pub mod products;
pub mod reconciler;
pub mod session;

pub use crate::core::ShopCore;
pub use cart::{parse_checkout_ids, CartService, CartState, SelectableItem};
pub use catalog::{filter_products, CatalogFilter, CatalogService, CatalogView, SortOrder};
pub use error::ShopError;
pub use events::{Events, ShopEvent};
pub use favorites::FavoriteService;
pub use orders::OrderService;
pub use products::ProductService;
pub use session::SessionService;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Call once at startup, before constructing a [`ShopCore`].  `RUST_LOG`
/// overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("vitrine_client=debug,vitrine_cloud=debug,vitrine_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
