//! Favorite toggling and the observable favorite-id set.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::warn;

use vitrine_shared::Product;

use crate::core::{lock, Db};
use crate::error::Result;
use crate::events::{Events, ShopEvent};

struct FavoriteInner {
    db: Db,
    events: Events,
    ids_tx: watch::Sender<HashSet<String>>,
    user_id: Mutex<Option<String>>,
}

#[derive(Clone)]
pub struct FavoriteService {
    inner: Arc<FavoriteInner>,
}

impl FavoriteService {
    pub fn new(db: Db, events: Events) -> Self {
        let (ids_tx, _) = watch::channel(HashSet::new());
        Self {
            inner: Arc::new(FavoriteInner {
                db,
                events,
                ids_tx,
                user_id: Mutex::new(None),
            }),
        }
    }

    /// Observe the active user's favorite product ids.
    pub fn subscribe(&self) -> watch::Receiver<HashSet<String>> {
        self.inner.ids_tx.subscribe()
    }

    /// Switch to another user (or to nobody) and republish.
    pub fn set_active_user(&self, user_id: Option<String>) {
        *self
            .inner
            .user_id
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = user_id;
        self.refresh();
    }

    /// Re-read the favorite set from the cache and publish it.
    pub fn refresh(&self) {
        let user_id = self
            .inner
            .user_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let ids = match user_id {
            None => HashSet::new(),
            Some(user_id) => match lock(&self.inner.db).and_then(|db| Ok(db.favorite_ids(&user_id)?)) {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(error = %e, "favorites read failed");
                    HashSet::new()
                }
            },
        };

        self.inner.ids_tx.send_replace(ids);
    }

    /// Flip the favorite mark for a (user, product) pair.  Returns the new
    /// membership and emits the matching feedback event.
    pub fn toggle(&self, user_id: &str, product: &Product) -> Result<bool> {
        let now_favorite = lock(&self.inner.db)?.toggle_favorite(user_id, &product.id)?;

        self.inner.events.emit(if now_favorite {
            ShopEvent::FavoriteAdded {
                product_name: product.name.clone(),
            }
        } else {
            ShopEvent::FavoriteRemoved {
                product_name: product.name.clone(),
            }
        });

        self.refresh();
        Ok(now_favorite)
    }

    /// The favorited products of a user, joined against the catalog.
    pub fn favorite_products(&self, user_id: &str) -> Result<Vec<Product>> {
        Ok(lock(&self.inner.db)?.favorite_products(user_id)?)
    }
}
