//! Cart state machine.
//!
//! The service tracks the active user's cart lines plus a transient
//! per-line "selected for checkout" flag, and publishes the derived
//! [`CartState`] on a watch channel.  Selection is never persisted: a line
//! id that survives a cache refresh keeps its flag, a new id defaults to
//! selected, a vanished id is forgotten.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use vitrine_shared::{CartLine, Order, OrderItem, Product};
use vitrine_store::StoreError;

use crate::core::{lock, Db};
use crate::error::Result;
use crate::events::{Events, ShopEvent};

/// A cart line annotated with the transient checkout-inclusion flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectableItem {
    pub line: CartLine,
    pub selected: bool,
}

/// Reactive cart state for the active user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum CartState {
    /// No snapshot observed yet.
    #[default]
    Loading,
    Empty,
    #[serde(rename_all = "camelCase")]
    Populated {
        items: Vec<SelectableItem>,
        /// Sum of price x quantity over the selected lines only.
        checkout_total: f64,
        /// True iff the cart is non-empty and every line is selected.
        all_selected: bool,
    },
}

impl CartState {
    fn from_items(items: Vec<SelectableItem>) -> Self {
        if items.is_empty() {
            return CartState::Empty;
        }

        let checkout_total = items
            .iter()
            .filter(|i| i.selected)
            .map(|i| i.line.subtotal())
            .sum();
        let all_selected = items.iter().all(|i| i.selected);

        CartState::Populated {
            items,
            checkout_total,
            all_selected,
        }
    }

    /// Whether the checkout action is available: at least one selected line.
    pub fn checkout_enabled(&self) -> bool {
        matches!(self, CartState::Populated { items, .. } if items.iter().any(|i| i.selected))
    }
}

/// Parse the comma-joined id list carried by a checkout navigation event.
pub fn parse_checkout_ids(joined: &str) -> Vec<i64> {
    joined
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

struct CartInner {
    db: Db,
    events: Events,
    state_tx: watch::Sender<CartState>,
    user_id: Mutex<Option<String>>,
    /// Selection flags by cart-item id, the memory behind refreshes.
    selection: Mutex<HashMap<i64, bool>>,
}

/// Per-user cart service.
#[derive(Clone)]
pub struct CartService {
    inner: Arc<CartInner>,
}

impl CartService {
    pub fn new(db: Db, events: Events) -> Self {
        let (state_tx, _) = watch::channel(CartState::Loading);
        Self {
            inner: Arc::new(CartInner {
                db,
                events,
                state_tx,
                user_id: Mutex::new(None),
                selection: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state_tx.subscribe()
    }

    /// The currently published state.
    pub fn state(&self) -> CartState {
        self.inner.state_tx.borrow().clone()
    }

    /// Switch the cart to another user (or to nobody).  Selection flags
    /// belong to the previous cart and are discarded.
    pub fn set_active_user(&self, user_id: Option<String>) {
        {
            let mut active = plain_lock(&self.inner.user_id);
            // Same user keeps its selection; anyone else starts fresh.
            if *active != user_id {
                *active = user_id;
                plain_lock(&self.inner.selection).clear();
            }
        }
        self.refresh();
    }

    /// Re-read the active user's cart from the cache and republish the
    /// state, preserving selection flags for surviving line ids.
    pub fn refresh(&self) {
        let user_id = plain_lock(&self.inner.user_id).clone();

        let lines = match user_id {
            None => Vec::new(),
            Some(user_id) => match lock(&self.inner.db) {
                Ok(db) => match db.cart_lines(&user_id) {
                    Ok(lines) => lines,
                    Err(e) => {
                        warn!(error = %e, "cart read failed");
                        Vec::new()
                    }
                },
                Err(e) => {
                    warn!(error = %e, "cart read failed");
                    Vec::new()
                }
            },
        };

        let items: Vec<SelectableItem> = {
            let mut selection = plain_lock(&self.inner.selection);
            let items: Vec<SelectableItem> = lines
                .into_iter()
                .map(|line| {
                    let selected = selection.get(&line.item.id).copied().unwrap_or(true);
                    SelectableItem { line, selected }
                })
                .collect();

            selection.clear();
            for item in &items {
                selection.insert(item.line.item.id, item.selected);
            }
            items
        };

        self.inner.state_tx.send_replace(CartState::from_items(items));
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Set the selection flag of one line.  Unknown ids are ignored.
    pub fn toggle_item(&self, cart_item_id: i64, selected: bool) {
        self.update_selection(|items| {
            for item in items.iter_mut() {
                if item.line.item.id == cart_item_id {
                    item.selected = selected;
                }
            }
        });
    }

    /// Set every line to the same selection flag.
    pub fn toggle_all(&self, selected: bool) {
        self.update_selection(|items| {
            for item in items.iter_mut() {
                item.selected = selected;
            }
        });
    }

    fn update_selection(&self, apply: impl FnOnce(&mut Vec<SelectableItem>)) {
        let CartState::Populated { mut items, .. } = self.state() else {
            return;
        };
        apply(&mut items);

        {
            let mut selection = plain_lock(&self.inner.selection);
            for item in &items {
                selection.insert(item.line.item.id, item.selected);
            }
        }

        self.inner.state_tx.send_replace(CartState::from_items(items));
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Add one unit of a product to a user's cart.  An existing (user,
    /// product) row gets its quantity incremented; out-of-stock products
    /// are refused with a warning event.
    pub fn add_to_cart(&self, user_id: &str, product: &Product) -> Result<()> {
        if product.stock <= 0 {
            self.inner.events.emit(ShopEvent::Warning {
                message: "Product is out of stock.".into(),
            });
            return Ok(());
        }

        {
            let db = lock(&self.inner.db)?;
            match db.cart_item(user_id, &product.id)? {
                Some(item) => db.update_cart_quantity(item.id, item.quantity + 1)?,
                None => {
                    db.insert_cart_item(user_id, &product.id, 1)?;
                }
            }
        }

        self.inner.events.emit(ShopEvent::AddedToCart {
            product_name: product.name.clone(),
        });
        self.refresh();
        Ok(())
    }

    /// Change a line's quantity.
    ///
    /// A quantity above the product's current stock is rejected with one
    /// warning event and no state change; a quantity of zero or less removes
    /// the line.
    pub fn change_quantity(&self, cart_item_id: i64, new_quantity: i64) -> Result<()> {
        {
            let db = lock(&self.inner.db)?;

            let line = match db.cart_line_by_id(cart_item_id) {
                Ok(line) => Some(line),
                Err(StoreError::NotFound) => None,
                Err(e) => return Err(e.into()),
            };

            if let Some(line) = &line {
                if new_quantity > line.product.stock {
                    drop(db);
                    self.inner.events.emit(ShopEvent::Warning {
                        message: "Quantity exceeds available stock.".into(),
                    });
                    return Ok(());
                }
            }

            if new_quantity > 0 {
                db.update_cart_quantity(cart_item_id, new_quantity)?;
            } else {
                db.delete_cart_item(cart_item_id)?;
            }
        }

        self.refresh();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Checkout
    // ------------------------------------------------------------------

    /// The currently selected lines.
    pub fn selected_lines(&self) -> Vec<CartLine> {
        match self.state() {
            CartState::Populated { items, .. } => items
                .into_iter()
                .filter(|i| i.selected)
                .map(|i| i.line)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Emit a checkout navigation event carrying the selected cart-item ids,
    /// comma-joined.  A no-op when nothing is selected.
    pub fn initiate_checkout(&self) {
        let ids: Vec<String> = self
            .selected_lines()
            .iter()
            .map(|line| line.item.id.to_string())
            .collect();
        if ids.is_empty() {
            return;
        }

        self.inner.events.emit(ShopEvent::CheckoutRequested {
            cart_item_ids: ids.join(","),
        });
    }

    /// Cart lines for an explicit id list (the checkout screen read).
    pub fn lines_by_ids(&self, cart_item_ids: &[i64]) -> Result<Vec<CartLine>> {
        Ok(lock(&self.inner.db)?.cart_lines_by_ids(cart_item_ids)?)
    }

    /// Create an order snapshot from the given lines, then consume each
    /// purchased line: cart row deleted, stock decremented by the purchased
    /// quantity.  Prices are captured at call time.
    ///
    /// Each (cart delete, stock decrement) pair is atomic; the loop across
    /// lines is not, so a mid-loop failure leaves earlier pairs applied.
    /// Lines not passed in are untouched.
    pub fn place_order(&self, user_id: &str, lines: &[CartLine]) -> Result<Option<Order>> {
        if lines.is_empty() {
            return Ok(None);
        }

        let order = Order {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };

        {
            let db = lock(&self.inner.db)?;
            db.insert_order(&order)?;

            let items: Vec<OrderItem> = lines
                .iter()
                .map(|line| OrderItem {
                    id: 0,
                    order_id: order.id.clone(),
                    product_id: line.product.id.clone(),
                    quantity: line.item.quantity,
                    price: line.product.price,
                })
                .collect();
            db.insert_order_items(&items)?;

            for line in lines {
                db.consume_cart_line(line.item.id, &line.product.id, line.item.quantity)?;
            }
        }

        info!(order = %order.id, lines = lines.len(), "order placed");
        self.refresh();
        Ok(Some(order))
    }
}

/// Recover the guard even from a poisoned mutex; these hold plain data.
fn plain_lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_shared::User;
    use vitrine_store::Database;

    fn service() -> (tempfile::TempDir, CartService, Events) {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open_at(&dir.path().join("cart.db")).unwrap();

        seed(&database);

        let db: Db = Arc::new(Mutex::new(database));
        let events = Events::new();
        let cart = CartService::new(db, events.clone());
        cart.set_active_user(Some("u-1".into()));
        (dir, cart, events)
    }

    fn seed(db: &Database) {
        db.upsert_user(&User {
            id: "u-1".into(),
            email: "u-1@example.com".into(),
            name: "u-1".into(),
            is_admin: false,
        })
        .unwrap();
        db.upsert_product(&product("p-a", 10.0, 5)).unwrap();
        db.upsert_product(&product("p-b", 5.0, 5)).unwrap();
    }

    fn product(id: &str, price: f64, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            brand: "Maison".into(),
            category: "Pantry".into(),
            origin: "France".into(),
            price,
            stock,
            image_url: String::new(),
            description: String::new(),
        }
    }

    fn populated_items(cart: &CartService) -> Vec<SelectableItem> {
        match cart.state() {
            CartState::Populated { items, .. } => items,
            other => panic!("expected populated cart, got {other:?}"),
        }
    }

    fn drain_warnings(rx: &mut tokio::sync::broadcast::Receiver<ShopEvent>) -> usize {
        let mut count = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ShopEvent::Warning { .. }) {
                count += 1;
            }
        }
        count
    }

    #[test]
    fn repeated_adds_collapse_into_one_row() {
        let (_dir, cart, _events) = service();
        let p = product("p-a", 10.0, 5);

        cart.add_to_cart("u-1", &p).unwrap();
        cart.add_to_cart("u-1", &p).unwrap();
        cart.add_to_cart("u-1", &p).unwrap();

        let items = populated_items(&cart);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].line.item.quantity, 3);
    }

    #[test]
    fn out_of_stock_product_is_refused_with_a_warning() {
        let (_dir, cart, events) = service();
        let mut rx = events.subscribe();

        cart.add_to_cart("u-1", &product("p-a", 10.0, 0)).unwrap();

        assert_eq!(cart.state(), CartState::Empty);
        assert_eq!(drain_warnings(&mut rx), 1);
    }

    #[test]
    fn over_stock_quantity_change_is_rejected_with_one_warning() {
        let (_dir, cart, events) = service();
        cart.add_to_cart("u-1", &product("p-a", 10.0, 5)).unwrap();
        let id = populated_items(&cart)[0].line.item.id;

        let mut rx = events.subscribe();
        cart.change_quantity(id, 6).unwrap();

        let items = populated_items(&cart);
        assert_eq!(items[0].line.item.quantity, 1);
        assert_eq!(drain_warnings(&mut rx), 1);
    }

    #[test]
    fn zero_and_negative_quantities_remove_the_row() {
        let (_dir, cart, _events) = service();
        cart.add_to_cart("u-1", &product("p-a", 10.0, 5)).unwrap();
        let id = populated_items(&cart)[0].line.item.id;

        cart.change_quantity(id, 0).unwrap();
        assert_eq!(cart.state(), CartState::Empty);

        cart.add_to_cart("u-1", &product("p-a", 10.0, 5)).unwrap();
        let id = populated_items(&cart)[0].line.item.id;
        cart.change_quantity(id, -1).unwrap();
        assert_eq!(cart.state(), CartState::Empty);
    }

    #[test]
    fn within_stock_quantity_change_is_applied() {
        let (_dir, cart, _events) = service();
        cart.add_to_cart("u-1", &product("p-a", 10.0, 5)).unwrap();
        let id = populated_items(&cart)[0].line.item.id;

        cart.change_quantity(id, 5).unwrap();
        assert_eq!(populated_items(&cart)[0].line.item.quantity, 5);
    }

    #[test]
    fn toggle_all_selects_everything_iff_non_empty() {
        let (_dir, cart, _events) = service();

        // Empty cart: toggling is a no-op, nothing is "all selected".
        cart.toggle_all(true);
        assert!(!cart.state().checkout_enabled());

        cart.add_to_cart("u-1", &product("p-a", 10.0, 5)).unwrap();
        cart.add_to_cart("u-1", &product("p-b", 5.0, 5)).unwrap();

        cart.toggle_all(false);
        let CartState::Populated { all_selected, checkout_total, .. } = cart.state() else {
            panic!("expected populated");
        };
        assert!(!all_selected);
        assert_eq!(checkout_total, 0.0);
        assert!(!cart.state().checkout_enabled());

        cart.toggle_all(true);
        let CartState::Populated { all_selected, .. } = cart.state() else {
            panic!("expected populated");
        };
        assert!(all_selected);
    }

    #[test]
    fn checkout_total_covers_selected_lines_only() {
        let (_dir, cart, _events) = service();

        // A: price 10, quantity 2, selected.  B: price 5, quantity 1, unselected.
        let a = product("p-a", 10.0, 5);
        cart.add_to_cart("u-1", &a).unwrap();
        cart.add_to_cart("u-1", &a).unwrap();
        cart.add_to_cart("u-1", &product("p-b", 5.0, 5)).unwrap();

        let items = populated_items(&cart);
        let b_id = items
            .iter()
            .find(|i| i.line.product.id == "p-b")
            .unwrap()
            .line
            .item
            .id;
        cart.toggle_item(b_id, false);

        let CartState::Populated { checkout_total, all_selected, .. } = cart.state() else {
            panic!("expected populated");
        };
        assert_eq!(checkout_total, 20.0);
        assert!(!all_selected);
        assert!(cart.state().checkout_enabled());
    }

    #[test]
    fn selection_survives_refresh_and_new_lines_default_to_selected() {
        let (_dir, cart, _events) = service();
        cart.add_to_cart("u-1", &product("p-a", 10.0, 5)).unwrap();
        let a_id = populated_items(&cart)[0].line.item.id;
        cart.toggle_item(a_id, false);

        // A new line arrives; the refresh keeps A deselected.
        cart.add_to_cart("u-1", &product("p-b", 5.0, 5)).unwrap();

        let items = populated_items(&cart);
        let a = items.iter().find(|i| i.line.item.id == a_id).unwrap();
        let b = items.iter().find(|i| i.line.item.id != a_id).unwrap();
        assert!(!a.selected);
        assert!(b.selected);
    }

    #[test]
    fn checkout_event_carries_comma_joined_ids() {
        let (_dir, cart, events) = service();
        cart.add_to_cart("u-1", &product("p-a", 10.0, 5)).unwrap();
        cart.add_to_cart("u-1", &product("p-b", 5.0, 5)).unwrap();

        let mut rx = events.subscribe();
        cart.initiate_checkout();

        let Ok(ShopEvent::CheckoutRequested { cart_item_ids }) = rx.try_recv() else {
            panic!("expected a checkout event");
        };
        let ids = parse_checkout_ids(&cart_item_ids);
        assert_eq!(ids.len(), 2);
        assert_eq!(cart.lines_by_ids(&ids).unwrap().len(), 2);

        // Deselect everything: no event.
        cart.toggle_all(false);
        cart.initiate_checkout();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn place_order_consumes_selected_lines_and_stock_only() {
        let (_dir, cart, _events) = service();

        let a = product("p-a", 10.0, 5);
        cart.add_to_cart("u-1", &a).unwrap();
        cart.add_to_cart("u-1", &a).unwrap();
        cart.add_to_cart("u-1", &product("p-b", 5.0, 5)).unwrap();

        let b_id = populated_items(&cart)
            .iter()
            .find(|i| i.line.product.id == "p-b")
            .unwrap()
            .line
            .item
            .id;
        cart.toggle_item(b_id, false);

        let selected = cart.selected_lines();
        let order = cart.place_order("u-1", &selected).unwrap().expect("order");

        // Only B remains in the cart; only A's stock moved.
        let items = populated_items(&cart);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].line.product.id, "p-b");

        let db = cart.inner.db.lock().unwrap();
        assert_eq!(db.product_by_id("p-a").unwrap().unwrap().stock, 3);
        assert_eq!(db.product_by_id("p-b").unwrap().unwrap().stock, 5);

        // The snapshot captured the purchase price and quantity.
        let order_items = db.items_for_order(&order.id).unwrap();
        assert_eq!(order_items.len(), 1);
        assert_eq!(order_items[0].quantity, 2);
        assert_eq!(order_items[0].price, 10.0);
    }

    #[test]
    fn placing_an_empty_order_is_a_no_op() {
        let (_dir, cart, _events) = service();
        assert!(cart.place_order("u-1", &[]).unwrap().is_none());
    }

    #[test]
    fn switching_users_resets_the_selection() {
        let (_dir, cart, _events) = service();
        cart.add_to_cart("u-1", &product("p-a", 10.0, 5)).unwrap();
        let id = populated_items(&cart)[0].line.item.id;
        cart.toggle_item(id, false);

        cart.set_active_user(None);
        assert_eq!(cart.state(), CartState::Empty);

        // Back to the same user: the old flags are gone, default selected.
        cart.set_active_user(Some("u-1".into()));
        assert!(populated_items(&cart)[0].selected);
    }
}
