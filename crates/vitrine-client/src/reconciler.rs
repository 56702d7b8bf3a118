//! Keeps the local cache convergent with the remote store.
//!
//! Remote-to-local is continuous: the products collection is mirrored for
//! the whole process lifetime, the current user's document for the lifetime
//! of their login.  Local-to-remote is a fire-and-forget push after every
//! local write; push failures are logged and swallowed, never retried and
//! never surfaced to the caller.  The two stores can diverge until the next
//! snapshot arrives; last write observed wins.

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vitrine_cloud::RemoteStore;
use vitrine_shared::constants::{PRODUCTS_COLLECTION, USERS_COLLECTION};
use vitrine_shared::document::{
    product_from_document, product_to_document, user_from_document, user_to_document,
};
use vitrine_shared::{Product, User};

use crate::cart::CartService;
use crate::core::{lock, Db};
use crate::error::Result;
use crate::products::ProductService;
use crate::session::SessionService;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Continuous sync
// ---------------------------------------------------------------------------

/// Spawn the products mirror.
///
/// The subscription lives for the whole process by design; it is never torn
/// down, even when nothing observes the catalog.  Each remote snapshot is
/// decoded and bulk-upserted into the cache, then the product and cart
/// watches are refreshed.  Errors keep the loop alive.
pub fn spawn_product_sync(
    db: Db,
    remote: Arc<dyn RemoteStore>,
    products: ProductService,
    cart: CartService,
) -> JoinHandle<()> {
    let mut sub = remote.subscribe_collection(PRODUCTS_COLLECTION);

    tokio::spawn(async move {
        info!("product sync started");

        while let Some(event) = sub.next().await {
            match event {
                Ok(snapshot) => {
                    let decoded: Vec<Product> = snapshot
                        .iter()
                        .map(|(id, doc)| product_from_document(id, doc))
                        .collect();

                    let applied = match db.lock() {
                        Ok(db) => db.upsert_products(&decoded),
                        Err(_) => return,
                    };

                    match applied {
                        Ok(()) => {
                            debug!(count = decoded.len(), "product snapshot applied");
                            products.refresh();
                            cart.refresh();
                        }
                        Err(e) => error!(error = %e, "failed to apply product snapshot"),
                    }
                }
                Err(e) => warn!(error = %e, "product subscription error"),
            }
        }

        warn!("product subscription closed");
    })
}

/// Spawn the current-user mirror.
///
/// Watches the session preferences and keeps exactly one remote document
/// subscription alive: every login change drops the previous handle before
/// opening the next one.  Snapshots are decoded (admin flag normalized) and
/// upserted, then the current-user watch is refreshed.
pub fn spawn_user_sync(
    db: Db,
    remote: Arc<dyn RemoteStore>,
    session: SessionService,
) -> JoinHandle<()> {
    let mut prefs_rx = session.prefs();

    tokio::spawn(async move {
        info!("user sync started");

        loop {
            let active = prefs_rx
                .borrow_and_update()
                .active_user()
                .map(str::to_string);

            let Some(user_id) = active else {
                // Logged out: nothing to watch until the prefs change.
                if prefs_rx.changed().await.is_err() {
                    return;
                }
                continue;
            };

            debug!(user = %user_id, "subscribing to remote user document");
            let mut sub = remote.subscribe_document(USERS_COLLECTION, &user_id);

            loop {
                tokio::select! {
                    changed = prefs_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        // Re-evaluate the login; dropping `sub` tears the
                        // superseded listener down.
                        break;
                    }
                    event = sub.next() => match event {
                        None => {
                            warn!(user = %user_id, "user subscription closed");
                            if prefs_rx.changed().await.is_err() {
                                return;
                            }
                            break;
                        }
                        Some(Ok(Some(doc))) => {
                            let user = user_from_document(&user_id, &doc);

                            let applied = match db.lock() {
                                Ok(db) => db.upsert_user(&user),
                                Err(_) => return,
                            };

                            match applied {
                                Ok(()) => {
                                    debug!(user = %user_id, admin = user.is_admin, "user synced from remote");
                                    if let Err(e) = session.refresh_current_user() {
                                        warn!(error = %e, "failed to republish current user");
                                    }
                                }
                                Err(e) => error!(error = %e, "failed to apply user snapshot"),
                            }
                        }
                        Some(Ok(None)) => debug!(user = %user_id, "remote user document absent"),
                        Some(Err(e)) => warn!(error = %e, "user subscription error"),
                    }
                }
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Local-to-remote pushes
// ---------------------------------------------------------------------------

/// Write a product to the cache, then push it to the remote store.
///
/// The cache write is synchronous and authoritative for the caller; the
/// remote push is spawned fire-and-forget and only logged.
pub fn push_product(db: &Db, remote: &Arc<dyn RemoteStore>, product: &Product) -> Result<()> {
    lock(db)?.upsert_product(product)?;

    let remote = remote.clone();
    let id = product.id.clone();
    let fields = product_to_document(product);
    tokio::spawn(async move {
        match remote.set_merge(PRODUCTS_COLLECTION, &id, fields).await {
            Ok(()) => debug!(product = %id, "product pushed to remote"),
            Err(e) => warn!(product = %id, error = %e, "failed to push product to remote"),
        }
    });

    Ok(())
}

/// Delete a product from the cache, then from the remote store.
pub fn delete_product(db: &Db, remote: &Arc<dyn RemoteStore>, product_id: &str) -> Result<()> {
    lock(db)?.delete_product(product_id)?;

    let remote = remote.clone();
    let id = product_id.to_string();
    tokio::spawn(async move {
        match remote.delete(PRODUCTS_COLLECTION, &id).await {
            Ok(()) => debug!(product = %id, "product deleted from remote"),
            Err(e) => warn!(product = %id, error = %e, "failed to delete product from remote"),
        }
    });

    Ok(())
}

/// Write a user to the cache, then push it to the remote store.
pub fn push_user(db: &Db, remote: &Arc<dyn RemoteStore>, user: &User) -> Result<()> {
    lock(db)?.upsert_user(user)?;
    spawn_user_push(remote, user);
    Ok(())
}

fn spawn_user_push(remote: &Arc<dyn RemoteStore>, user: &User) {
    let remote = remote.clone();
    let id = user.id.clone();
    let fields = user_to_document(user);
    tokio::spawn(async move {
        match remote.set_merge(USERS_COLLECTION, &id, fields).await {
            Ok(()) => debug!(user = %id, "user pushed to remote"),
            Err(e) => warn!(user = %id, error = %e, "failed to push user to remote"),
        }
    });
}

// ---------------------------------------------------------------------------
// On-demand reconcile
// ---------------------------------------------------------------------------

/// One forced remote read for `user_id`, merged into the cache.
///
/// - Remote document present: the cache is updated only when the row is
///   missing or the admin flag differs (redundant writes skipped).
/// - Remote document absent but cached locally: the local copy is pushed to
///   the remote store (one-time bootstrap).
/// - Remote unreachable: logged, the cached row is the answer.
pub async fn reconcile_user_on_demand(
    db: &Db,
    remote: &Arc<dyn RemoteStore>,
    user_id: &str,
) -> Result<Option<User>> {
    let local = lock(db)?.user_by_id(user_id)?;

    match remote.get(USERS_COLLECTION, user_id).await {
        Ok(Some(doc)) => {
            let fetched = user_from_document(user_id, &doc);
            let stale = local
                .as_ref()
                .map(|l| l.is_admin != fetched.is_admin)
                .unwrap_or(true);

            if stale {
                lock(db)?.upsert_user(&fetched)?;
                debug!(user = %user_id, admin = fetched.is_admin, "user merged from remote");
                Ok(Some(fetched))
            } else {
                Ok(local)
            }
        }
        Ok(None) => {
            if let Some(local_user) = &local {
                debug!(user = %user_id, "remote user absent, pushing local copy");
                spawn_user_push(remote, local_user);
            }
            Ok(local)
        }
        Err(e) => {
            warn!(user = %user_id, error = %e, "remote user fetch failed, using cache");
            Ok(local)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use vitrine_cloud::MemoryRemoteStore;
    use vitrine_shared::document::Document;
    use vitrine_store::Database;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn open_db() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open_at(&dir.path().join("sync.db")).unwrap();
        (dir, Arc::new(Mutex::new(database)))
    }

    fn sample_user(id: &str, admin: bool) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            name: id.to_string(),
            is_admin: admin,
        }
    }

    async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
        timeout(Duration::from_secs(5), async {
            loop {
                if check() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
    }

    #[tokio::test]
    async fn on_demand_reconcile_prefers_the_remote_admin_flag() {
        let (_dir, db) = open_db();
        let remote: Arc<dyn RemoteStore> = Arc::new(MemoryRemoteStore::new());

        db.lock().unwrap().upsert_user(&sample_user("u-1", true)).unwrap();
        // Remote says: not an admin.
        remote
            .set_merge(
                USERS_COLLECTION,
                "u-1",
                doc(json!({ "email": "u-1@example.com", "name": "u-1", "isAdmin": 0 })),
            )
            .await
            .unwrap();

        let user = reconcile_user_on_demand(&db, &remote, "u-1")
            .await
            .unwrap()
            .expect("present");
        assert!(!user.is_admin);
        assert!(!db.lock().unwrap().user_by_id("u-1").unwrap().unwrap().is_admin);
    }

    #[tokio::test]
    async fn on_demand_reconcile_bootstraps_an_absent_remote_user() {
        let (_dir, db) = open_db();
        let memory = MemoryRemoteStore::new();
        let remote: Arc<dyn RemoteStore> = Arc::new(memory.clone());

        db.lock().unwrap().upsert_user(&sample_user("u-1", false)).unwrap();

        let user = reconcile_user_on_demand(&db, &remote, "u-1")
            .await
            .unwrap()
            .expect("present");
        assert_eq!(user.id, "u-1");

        eventually("bootstrap push", || memory.len(USERS_COLLECTION) == 1).await;
    }

    #[tokio::test]
    async fn on_demand_reconcile_misses_everywhere() {
        let (_dir, db) = open_db();
        let remote: Arc<dyn RemoteStore> = Arc::new(MemoryRemoteStore::new());

        assert!(reconcile_user_on_demand(&db, &remote, "ghost")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn push_product_writes_locally_and_remotely() {
        let (_dir, db) = open_db();
        let memory = MemoryRemoteStore::new();
        let remote: Arc<dyn RemoteStore> = Arc::new(memory.clone());

        let product = Product {
            id: "p-1".into(),
            name: "Teapot".into(),
            brand: "Maison".into(),
            category: "Kitchen".into(),
            origin: "France".into(),
            price: 10.0,
            stock: 4,
            image_url: String::new(),
            description: String::new(),
        };

        push_product(&db, &remote, &product).unwrap();

        // Local write is immediate.
        assert!(db.lock().unwrap().product_by_id("p-1").unwrap().is_some());
        // Remote write is eventual.
        eventually("remote product push", || memory.len(PRODUCTS_COLLECTION) == 1).await;

        delete_product(&db, &remote, "p-1").unwrap();
        assert!(db.lock().unwrap().product_by_id("p-1").unwrap().is_none());
        eventually("remote product delete", || memory.is_empty(PRODUCTS_COLLECTION)).await;
    }
}
