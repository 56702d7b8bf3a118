//! Catalog filter pipeline.
//!
//! A pure derivation over (products, search text, category, sort order,
//! favorite ids): text filter, then category filter, then a stable sort,
//! then the favorite-map attach.  The pipeline has no side effects and is
//! safe to evaluate repeatedly; [`CatalogService`] re-runs it whenever any
//! input changes.
//!
//! Search debouncing is a UI concern; the pipeline only guarantees that a
//! blank query short-circuits to the unfiltered catalog.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use vitrine_shared::constants::ALL_CATEGORY;
use vitrine_shared::Product;

/// Sort orders for the product grid.  All sorts are stable: ties keep their
/// pre-sort relative order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    None,
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
}

/// Inputs of the filter pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFilter {
    pub query: String,
    /// Selected category; [`ALL_CATEGORY`] disables the filter.
    pub category: String,
    pub sort: SortOrder,
}

impl Default for CatalogFilter {
    fn default() -> Self {
        Self {
            query: String::new(),
            category: ALL_CATEGORY.to_string(),
            sort: SortOrder::None,
        }
    }
}

/// One evaluation of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogView {
    /// Filtered and sorted products.
    pub products: Vec<Product>,
    /// `"All"` followed by the distinct categories of the full catalog, in
    /// first-seen order.
    pub categories: Vec<String>,
    /// Favorite flag per listed product id.  Annotates, never filters.
    pub favorites: HashMap<String, bool>,
}

/// Run the pipeline once.
pub fn filter_products(
    all: &[Product],
    filter: &CatalogFilter,
    favorite_ids: &HashSet<String>,
) -> CatalogView {
    // Categories come from the full catalog, not the filtered view.
    let mut categories = vec![ALL_CATEGORY.to_string()];
    for product in all {
        if !categories.contains(&product.category) {
            categories.push(product.category.clone());
        }
    }

    let query = filter.query.trim().to_lowercase();
    let searched: Vec<&Product> = if query.is_empty() {
        all.iter().collect()
    } else {
        all.iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&query) || p.brand.to_lowercase().contains(&query)
            })
            .collect()
    };

    let categorized: Vec<&Product> = if filter.category == ALL_CATEGORY {
        searched
    } else {
        searched
            .into_iter()
            .filter(|p| p.category == filter.category)
            .collect()
    };

    let mut products: Vec<Product> = categorized.into_iter().cloned().collect();
    match filter.sort {
        SortOrder::None => {}
        SortOrder::PriceAsc => products.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortOrder::PriceDesc => products.sort_by(|a, b| b.price.total_cmp(&a.price)),
        SortOrder::NameAsc => products.sort_by(|a, b| a.name.cmp(&b.name)),
        SortOrder::NameDesc => products.sort_by(|a, b| b.name.cmp(&a.name)),
    }

    let favorites = products
        .iter()
        .map(|p| (p.id.clone(), favorite_ids.contains(&p.id)))
        .collect();

    CatalogView {
        products,
        categories,
        favorites,
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

struct CatalogInner {
    filter_tx: watch::Sender<CatalogFilter>,
    view_tx: watch::Sender<CatalogView>,
}

/// Holds the filter inputs and republishes the derived [`CatalogView`]
/// whenever the catalog, the favorites, or the filter change.
#[derive(Clone)]
pub struct CatalogService {
    inner: Arc<CatalogInner>,
}

impl CatalogService {
    pub fn new() -> Self {
        let (filter_tx, _) = watch::channel(CatalogFilter::default());
        let (view_tx, _) = watch::channel(CatalogView::default());
        Self {
            inner: Arc::new(CatalogInner { filter_tx, view_tx }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CatalogView> {
        self.inner.view_tx.subscribe()
    }

    /// The current filter inputs.
    pub fn filter(&self) -> CatalogFilter {
        self.inner.filter_tx.borrow().clone()
    }

    pub fn set_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.inner.filter_tx.send_modify(|f| f.query = query);
    }

    pub fn set_category(&self, category: impl Into<String>) {
        let category = category.into();
        self.inner.filter_tx.send_modify(|f| f.category = category);
    }

    pub fn set_sort(&self, sort: SortOrder) {
        self.inner.filter_tx.send_modify(|f| f.sort = sort);
    }

    /// Spawn the derivation loop: recompute on every input change.
    pub fn spawn(
        &self,
        mut products_rx: watch::Receiver<Vec<Product>>,
        mut favorites_rx: watch::Receiver<HashSet<String>>,
    ) -> JoinHandle<()> {
        let inner = self.inner.clone();
        let mut filter_rx = inner.filter_tx.subscribe();

        tokio::spawn(async move {
            loop {
                {
                    let view = filter_products(
                        &products_rx.borrow(),
                        &filter_rx.borrow(),
                        &favorites_rx.borrow(),
                    );
                    inner.view_tx.send_replace(view);
                }

                tokio::select! {
                    changed = products_rx.changed() => if changed.is_err() { return },
                    changed = favorites_rx.changed() => if changed.is_err() { return },
                    changed = filter_rx.changed() => if changed.is_err() { return },
                }
            }
        })
    }
}

impl Default for CatalogService {
    fn default() -> Self {
        Self::new()
    }
}
