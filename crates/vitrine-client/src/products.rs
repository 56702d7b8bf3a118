//! Product service: the observable catalog plus the admin-facing writes.
//!
//! Writes go through the reconciler's cache-then-remote dual write; the
//! remote half is fire-and-forget.  Deletion is gated on the acting user's
//! admin entitlement.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;
use uuid::Uuid;

use vitrine_cloud::RemoteStore;
use vitrine_shared::{Product, User};

use crate::core::{lock, Db};
use crate::error::{Result, ShopError};
use crate::events::{Events, ShopEvent};
use crate::reconciler;

struct ProductInner {
    db: Db,
    remote: Arc<dyn RemoteStore>,
    events: Events,
    list_tx: watch::Sender<Vec<Product>>,
}

#[derive(Clone)]
pub struct ProductService {
    inner: Arc<ProductInner>,
}

impl ProductService {
    pub fn new(db: Db, remote: Arc<dyn RemoteStore>, events: Events) -> Result<Self> {
        let initial = lock(&db)?.all_products()?;
        let (list_tx, _) = watch::channel(initial);

        Ok(Self {
            inner: Arc::new(ProductInner {
                db,
                remote,
                events,
                list_tx,
            }),
        })
    }

    /// Observe the cached catalog.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Product>> {
        self.inner.list_tx.subscribe()
    }

    /// The current catalog snapshot.
    pub fn all_products(&self) -> Vec<Product> {
        self.inner.list_tx.borrow().clone()
    }

    /// Re-read the catalog from the cache and publish it.
    pub fn refresh(&self) {
        let products = match lock(&self.inner.db).and_then(|db| Ok(db.all_products()?)) {
            Ok(products) => products,
            Err(e) => {
                warn!(error = %e, "catalog read failed");
                return;
            }
        };
        self.inner.list_tx.send_replace(products);
    }

    /// Point-read a product, `None` when absent.
    pub fn product_by_id(&self, id: &str) -> Result<Option<Product>> {
        Ok(lock(&self.inner.db)?.product_by_id(id)?)
    }

    /// Validate and save a product (create or edit), locally then remote.
    ///
    /// A blank id means "new": one is assigned.  Returns the product as
    /// stored.
    pub fn save_product(&self, mut product: Product) -> Result<Product> {
        product.name = product.name.trim().to_string();
        product.brand = product.brand.trim().to_string();
        product.category = product.category.trim().to_string();
        product.origin = product.origin.trim().to_string();
        product.image_url = product.image_url.trim().to_string();
        product.description = product.description.trim().to_string();

        if product.name.is_empty() || product.category.is_empty() {
            return Err(ShopError::Validation(
                "Product name and category must not be empty.".into(),
            ));
        }
        if product.price < 0.0 {
            return Err(ShopError::Validation("Price cannot be negative.".into()));
        }
        if product.stock < 0 {
            return Err(ShopError::Validation("Stock cannot be negative.".into()));
        }

        if product.id.is_empty() {
            product.id = Uuid::new_v4().to_string();
        }

        reconciler::push_product(&self.inner.db, &self.inner.remote, &product)?;
        self.refresh();
        Ok(product)
    }

    /// Delete a product on behalf of `actor`, locally then remote.
    /// Non-admin actors are refused.
    pub fn delete_product(&self, actor: &User, product: &Product) -> Result<()> {
        if !actor.is_admin {
            self.inner.events.emit(ShopEvent::PermissionDenied);
            return Err(ShopError::PermissionDenied);
        }

        reconciler::delete_product(&self.inner.db, &self.inner.remote, &product.id)?;
        self.refresh();
        Ok(())
    }
}
