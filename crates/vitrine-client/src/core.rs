//! Composition root.
//!
//! [`ShopCore`] owns the shared cache handle, the cloud collaborators, and
//! every service, and spawns the background loops that keep them convergent.
//! A front-end constructs one `ShopCore`, calls [`start`](ShopCore::start),
//! and talks to the services from then on.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use vitrine_cloud::{AuthClient, RemoteStore};
use vitrine_shared::{Order, Product};
use vitrine_store::Database;

use crate::cart::CartService;
use crate::catalog::CatalogService;
use crate::error::{Result, ShopError};
use crate::events::{Events, ShopEvent};
use crate::favorites::FavoriteService;
use crate::orders::OrderService;
use crate::products::ProductService;
use crate::reconciler;
use crate::session::SessionService;

/// Shared handle to the local cache.  The mutex serializes all access; the
/// services keep their critical sections free of await points.
pub(crate) type Db = Arc<Mutex<Database>>;

/// Acquire the cache, surfacing a poisoned mutex as an error.
pub(crate) fn lock(db: &Db) -> Result<MutexGuard<'_, Database>> {
    db.lock().map_err(|_| ShopError::LockPoisoned)
}

/// Central application object.
pub struct ShopCore {
    db: Db,
    remote: Arc<dyn RemoteStore>,
    events: Events,
    session: SessionService,
    products: ProductService,
    cart: CartService,
    favorites: FavoriteService,
    orders: OrderService,
    catalog: CatalogService,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ShopCore {
    /// Wire the services over an opened cache and the cloud collaborators.
    pub fn new(
        database: Database,
        remote: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthClient>,
    ) -> Result<Self> {
        let db: Db = Arc::new(Mutex::new(database));
        let events = Events::new();

        let session = SessionService::new(db.clone(), remote.clone(), auth)?;
        let products = ProductService::new(db.clone(), remote.clone(), events.clone())?;
        let cart = CartService::new(db.clone(), events.clone());
        let favorites = FavoriteService::new(db.clone(), events.clone());
        let orders = OrderService::new(db.clone());
        let catalog = CatalogService::new();

        Ok(Self {
            db,
            remote,
            events,
            session,
            products,
            cart,
            favorites,
            orders,
            catalog,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the background loops: product sync (process lifetime), user
    /// sync (one listener per login), the catalog derivation, and the
    /// session-to-cart/favorites bridge.  Calling `start` twice is a no-op.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if !tasks.is_empty() {
            return;
        }

        tasks.push(reconciler::spawn_product_sync(
            self.db.clone(),
            self.remote.clone(),
            self.products.clone(),
            self.cart.clone(),
        ));
        tasks.push(reconciler::spawn_user_sync(
            self.db.clone(),
            self.remote.clone(),
            self.session.clone(),
        ));
        tasks.push(
            self.catalog
                .spawn(self.products.subscribe(), self.favorites.subscribe()),
        );
        tasks.push(self.spawn_session_bridge());
    }

    /// Forward the active user into the cart and favorite services.
    fn spawn_session_bridge(&self) -> JoinHandle<()> {
        let mut user_rx = self.session.current_user();
        let cart = self.cart.clone();
        let favorites = self.favorites.clone();

        tokio::spawn(async move {
            loop {
                let user_id = user_rx.borrow_and_update().as_ref().map(|u| u.id.clone());
                cart.set_active_user(user_id.clone());
                favorites.set_active_user(user_id);

                if user_rx.changed().await.is_err() {
                    return;
                }
            }
        })
    }

    /// Abort the background loops.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.abort();
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn events(&self) -> &Events {
        &self.events
    }

    pub fn session(&self) -> &SessionService {
        &self.session
    }

    pub fn products(&self) -> &ProductService {
        &self.products
    }

    pub fn cart(&self) -> &CartService {
        &self.cart
    }

    pub fn favorites(&self) -> &FavoriteService {
        &self.favorites
    }

    pub fn orders(&self) -> &OrderService {
        &self.orders
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    // ------------------------------------------------------------------
    // Session-gated conveniences
    // ------------------------------------------------------------------

    /// Add a product to the active user's cart, or ask for a login.
    pub fn add_to_cart(&self, product: &Product) -> Result<()> {
        match self.session.current_user_now() {
            Some(user) => self.cart.add_to_cart(&user.id, product),
            None => {
                self.events.emit(ShopEvent::LoginRequired);
                Ok(())
            }
        }
    }

    /// Toggle a favorite for the active user, or ask for a login.
    pub fn toggle_favorite(&self, product: &Product) -> Result<bool> {
        match self.session.current_user_now() {
            Some(user) => self.favorites.toggle(&user.id, product),
            None => {
                self.events.emit(ShopEvent::LoginRequired);
                Ok(false)
            }
        }
    }

    /// Delete a product on behalf of the active user.  Requires admin.
    pub fn delete_product(&self, product: &Product) -> Result<()> {
        match self.session.current_user_now() {
            Some(user) => self.products.delete_product(&user, product),
            None => {
                self.events.emit(ShopEvent::PermissionDenied);
                Err(ShopError::PermissionDenied)
            }
        }
    }

    /// Place an order over the currently selected cart lines.  Without a
    /// logged-in user or a selection this is a no-op.
    pub fn place_order(&self) -> Result<Option<Order>> {
        let Some(user) = self.session.current_user_now() else {
            return Ok(None);
        };
        let selected = self.cart.selected_lines();
        self.cart.place_order(&user.id, &selected)
    }
}

impl Drop for ShopCore {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use vitrine_cloud::{MemoryAuthClient, MemoryRemoteStore};
    use vitrine_shared::constants::{PRODUCTS_COLLECTION, USERS_COLLECTION};
    use vitrine_shared::document::Document;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn open_core(
        dir: &tempfile::TempDir,
        remote: &MemoryRemoteStore,
        auth: &MemoryAuthClient,
    ) -> ShopCore {
        let database = Database::open_at(&dir.path().join("core.db")).unwrap();
        ShopCore::new(database, Arc::new(remote.clone()), Arc::new(auth.clone())).unwrap()
    }

    #[tokio::test]
    async fn remote_products_flow_into_the_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemoteStore::new();
        let auth = MemoryAuthClient::new();
        let core = open_core(&dir, &remote, &auth);
        core.start();

        let mut products_rx = core.products().subscribe();
        remote.insert(
            PRODUCTS_COLLECTION,
            "p-1",
            doc(json!({ "name": "Teapot", "brand": "Maison", "category": "Kitchen",
                        "origin": "France", "price": 10.0, "stock": 4,
                        "imageUrl": "", "description": "" })),
        );

        timeout(Duration::from_secs(5), async {
            loop {
                products_rx.changed().await.unwrap();
                if !products_rx.borrow_and_update().is_empty() {
                    return;
                }
            }
        })
        .await
        .expect("product snapshot should reach the cache");

        let product = core.products().product_by_id("p-1").unwrap().unwrap();
        assert_eq!(product.name, "Teapot");
        assert_eq!(product.stock, 4);
    }

    #[tokio::test]
    async fn sign_in_merges_the_remote_admin_flag() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemoteStore::new();
        let auth = MemoryAuthClient::new();
        let user_id = auth.add_account("admin@example.com", "secret");
        remote.insert(
            USERS_COLLECTION,
            &user_id,
            doc(json!({ "email": "admin@example.com", "name": "Admin", "isAdmin": 1 })),
        );

        let core = open_core(&dir, &remote, &auth);
        core.start();

        let user = core
            .session()
            .sign_in("admin@example.com", "secret", true)
            .await
            .unwrap();

        assert!(user.is_admin);
        assert_eq!(core.session().remembered_email(), "admin@example.com");
    }

    #[tokio::test]
    async fn first_sign_in_bootstraps_the_remote_user() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemoteStore::new();
        let auth = MemoryAuthClient::new();
        let user_id = auth.add_account("new@example.com", "secret");

        let core = open_core(&dir, &remote, &auth);
        core.start();

        let user = core
            .session()
            .sign_in("new@example.com", "secret", false)
            .await
            .unwrap();

        assert_eq!(user.name, "new");
        assert!(!user.is_admin);

        // The fire-and-forget push lands in the remote store.
        timeout(Duration::from_secs(5), async {
            loop {
                if remote
                    .get(USERS_COLLECTION, &user_id)
                    .await
                    .unwrap()
                    .is_some()
                {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("bootstrap user push should reach the remote store");
    }

    #[tokio::test]
    async fn remote_user_updates_reach_the_current_user_stream() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemoteStore::new();
        let auth = MemoryAuthClient::new();
        let user_id = auth.add_account("user@example.com", "secret");

        let core = open_core(&dir, &remote, &auth);
        core.start();
        core.session()
            .sign_in("user@example.com", "secret", false)
            .await
            .unwrap();

        let mut user_rx = core.session().current_user();
        remote
            .set_merge(
                USERS_COLLECTION,
                &user_id,
                doc(json!({ "email": "user@example.com", "name": "User", "isAdmin": true })),
            )
            .await
            .unwrap();

        timeout(Duration::from_secs(5), async {
            loop {
                user_rx.changed().await.unwrap();
                let admin = user_rx
                    .borrow_and_update()
                    .as_ref()
                    .map(|u| u.is_admin)
                    .unwrap_or(false);
                if admin {
                    return;
                }
            }
        })
        .await
        .expect("admin flag should propagate");

        core.session().sign_out().unwrap();
        assert!(core.session().current_user_now().is_none());
    }

    #[tokio::test]
    async fn deleting_a_product_requires_admin() {
        let dir = tempfile::tempdir().unwrap();
        let remote = MemoryRemoteStore::new();
        let auth = MemoryAuthClient::new();
        auth.add_account("user@example.com", "secret");

        let core = open_core(&dir, &remote, &auth);
        core.start();
        core.session()
            .sign_in("user@example.com", "secret", false)
            .await
            .unwrap();

        let product = core
            .products()
            .save_product(Product {
                id: String::new(),
                name: "Tray".into(),
                brand: "Maison".into(),
                category: "Kitchen".into(),
                origin: "France".into(),
                price: 20.0,
                stock: 2,
                image_url: String::new(),
                description: String::new(),
            })
            .unwrap();

        let mut events_rx = core.events().subscribe();
        assert!(matches!(
            core.delete_product(&product),
            Err(ShopError::PermissionDenied)
        ));
        assert_eq!(events_rx.try_recv().unwrap(), ShopEvent::PermissionDenied);
    }
}
