//! The shopping cart engine.
//!
//! Owns the in-memory basket and its persisted snapshot. The one structural
//! invariant is that a cart belongs to a single restaurant: adding an item
//! from a different restaurant silently replaces the whole basket rather
//! than erroring, matching what a diner expects when they switch venues
//! mid-browse.
//!
//! Every mutation fully applies - next state computed, snapshot persisted -
//! before the next is accepted; the interior mutex serializes writers.
//! Mutations never fail across the public boundary: a broken snapshot slot
//! is logged and the in-memory cart keeps working.

mod store;

pub use store::{CartStore, CartStoreError, JsonFileCartStore, MemoryCartStore};

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use quickbite_core::{MenuItemId, Price, RestaurantId};

use crate::backend::types::MenuItem;

/// An item as a menu page hands it to the cart, before it carries a
/// quantity.
#[derive(Debug, Clone)]
pub struct CartItem {
    pub item_id: MenuItemId,
    pub name: String,
    pub unit_price: Price,
    pub image_url: String,
    pub restaurant_id: RestaurantId,
    pub special_instructions: Option<String>,
}

impl CartItem {
    /// Build a cart item from a catalog row.
    #[must_use]
    pub fn from_menu(item: &MenuItem) -> Self {
        Self {
            item_id: item.id,
            name: item.name.clone(),
            unit_price: item.price,
            image_url: item.image_url.clone(),
            restaurant_id: item.restaurant_id,
            special_instructions: None,
        }
    }
}

/// One line of the basket. `quantity` is always at least 1; removal is the
/// only way to reach zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: MenuItemId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub image_url: String,
    pub restaurant_id: RestaurantId,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub special_instructions: Option<String>,
}

impl CartLine {
    fn new(item: CartItem) -> Self {
        Self {
            item_id: item.item_id,
            name: item.name,
            unit_price: item.unit_price,
            quantity: 1,
            image_url: item.image_url,
            restaurant_id: item.restaurant_id,
            special_instructions: item.special_instructions,
        }
    }

    /// Price of this line (`unit_price * quantity`).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price * self.quantity
    }
}

/// The full serialized cart state, written to the snapshot slot on every
/// mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub restaurant_id: Option<RestaurantId>,
    pub items: Vec<CartLine>,
}

impl CartSnapshot {
    /// Structural invariants: every line shares the cart's restaurant, all
    /// quantities are positive, item IDs are unique, and an empty cart has
    /// no restaurant.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match self.restaurant_id {
            None => self.items.is_empty(),
            Some(restaurant) => {
                !self.items.is_empty()
                    && self.items.iter().all(|line| {
                        line.restaurant_id == restaurant && line.quantity >= 1
                    })
                    && self
                        .items
                        .iter()
                        .enumerate()
                        .all(|(i, line)| {
                            self.items
                                .iter()
                                .skip(i + 1)
                                .all(|other| other.item_id != line.item_id)
                        })
            }
        }
    }
}

/// The cart engine: in-memory basket state plus its persisted snapshot.
pub struct CartEngine<S: CartStore> {
    store: S,
    state: Mutex<CartSnapshot>,
}

impl<S: CartStore> CartEngine<S> {
    /// Create an engine, rehydrating from the last persisted snapshot.
    ///
    /// A missing, malformed, or invariant-violating snapshot yields an
    /// empty cart; this never fails.
    pub fn new(store: S) -> Self {
        let state = match store.load() {
            Ok(Some(snapshot)) if snapshot.is_consistent() => snapshot,
            Ok(Some(_)) => {
                warn!("persisted cart snapshot violates invariants, starting empty");
                CartSnapshot::default()
            }
            Ok(None) => CartSnapshot::default(),
            Err(e) => {
                warn!("failed to load cart snapshot, starting empty: {e}");
                CartSnapshot::default()
            }
        };

        Self {
            store,
            state: Mutex::new(state),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of an item.
    ///
    /// If the cart holds items from a different restaurant, the basket is
    /// replaced wholesale with just this item. If the item is already in
    /// the cart, its quantity increments; otherwise a new line is appended
    /// at quantity 1.
    pub fn add_item(&self, item: CartItem) {
        self.mutate(|state| {
            // Switching restaurants discards the old basket silently.
            if state.restaurant_id.is_some_and(|r| r != item.restaurant_id) {
                state.restaurant_id = Some(item.restaurant_id);
                state.items = vec![CartLine::new(item)];
                return;
            }

            state.restaurant_id = Some(item.restaurant_id);
            match state.items.iter_mut().find(|l| l.item_id == item.item_id) {
                Some(line) => line.quantity += 1,
                None => state.items.push(CartLine::new(item)),
            }
        });
    }

    /// Remove a line. No-op if the item is not in the cart. Removing the
    /// last line resets the cart's restaurant.
    pub fn remove_item(&self, item: MenuItemId) {
        self.mutate(|state| {
            state.items.retain(|l| l.item_id != item);
            if state.items.is_empty() {
                state.restaurant_id = None;
            }
        });
    }

    /// Set a line's quantity exactly. A quantity of zero or less removes
    /// the line.
    pub fn update_quantity(&self, item: MenuItemId, quantity: i32) {
        let Ok(quantity) = u32::try_from(quantity) else {
            self.remove_item(item);
            return;
        };
        if quantity == 0 {
            self.remove_item(item);
            return;
        }

        self.mutate(|state| {
            if let Some(line) = state.items.iter_mut().find(|l| l.item_id == item) {
                line.quantity = quantity;
            }
        });
    }

    /// Set a line's special instructions. No-op if the item is not in the
    /// cart.
    pub fn update_instructions(&self, item: MenuItemId, instructions: &str) {
        self.mutate(|state| {
            if let Some(line) = state.items.iter_mut().find(|l| l.item_id == item) {
                line.special_instructions = Some(instructions.to_owned());
            }
        });
    }

    /// Empty the cart.
    pub fn clear(&self) {
        self.mutate(|state| {
            *state = CartSnapshot::default();
        });
    }

    // =========================================================================
    // Read accessors (recomputed on read, never stored)
    // =========================================================================

    /// The restaurant this cart belongs to, if non-empty.
    pub fn restaurant_id(&self) -> Option<RestaurantId> {
        self.locked().restaurant_id
    }

    /// A snapshot of the current lines, in insertion order.
    pub fn items(&self) -> Vec<CartLine> {
        self.locked().items.clone()
    }

    /// Total unit count across all lines.
    pub fn total_items(&self) -> u32 {
        self.locked().items.iter().map(|l| l.quantity).sum()
    }

    /// Sum of `unit_price * quantity` across all lines.
    pub fn subtotal(&self) -> Price {
        self.locked().items.iter().map(CartLine::line_total).sum()
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.locked().items.is_empty()
    }

    /// The full current state.
    pub fn snapshot(&self) -> CartSnapshot {
        self.locked().clone()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Apply a mutation and persist the result before releasing the lock,
    /// so writers never interleave between compute and save.
    fn mutate(&self, f: impl FnOnce(&mut CartSnapshot)) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
        debug_assert!(state.is_consistent());
        if let Err(e) = self.store.save(&state) {
            // The in-memory cart stays authoritative for this session.
            error!("failed to persist cart snapshot: {e}");
        }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, CartSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: MenuItemId, restaurant: RestaurantId, cents: i64) -> CartItem {
        CartItem {
            item_id: id,
            name: "Pad Thai".to_owned(),
            unit_price: Price::from_cents(cents),
            image_url: "https://img.example/pad-thai.jpg".to_owned(),
            restaurant_id: restaurant,
            special_instructions: None,
        }
    }

    fn engine() -> CartEngine<MemoryCartStore> {
        CartEngine::new(MemoryCartStore::new())
    }

    #[test]
    fn test_add_to_empty_cart_sets_restaurant() {
        let cart = engine();
        let restaurant = RestaurantId::random();
        cart.add_item(item(MenuItemId::random(), restaurant, 1050));

        assert_eq!(cart.restaurant_id(), Some(restaurant));
        let items = cart.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().unwrap().quantity, 1);
    }

    #[test]
    fn test_adding_from_other_restaurant_replaces_cart() {
        let cart = engine();
        let a = RestaurantId::random();
        let b = RestaurantId::random();
        cart.add_item(item(MenuItemId::random(), a, 900));
        cart.add_item(item(MenuItemId::random(), a, 700));

        let b_item = MenuItemId::random();
        cart.add_item(item(b_item, b, 1200));

        assert_eq!(cart.restaurant_id(), Some(b));
        let items = cart.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().unwrap().item_id, b_item);
        assert_eq!(items.first().unwrap().quantity, 1);
    }

    #[test]
    fn test_adding_same_item_increments_quantity() {
        let cart = engine();
        let restaurant = RestaurantId::random();
        let id = MenuItemId::random();
        cart.add_item(item(id, restaurant, 500));
        cart.add_item(item(id, restaurant, 500));

        let items = cart.items();
        assert_eq!(items.len(), 1, "no duplicate line");
        assert_eq!(items.first().unwrap().quantity, 2);
    }

    #[test]
    fn test_update_quantity_sets_exactly() {
        let cart = engine();
        let id = MenuItemId::random();
        cart.add_item(item(id, RestaurantId::random(), 500));

        cart.update_quantity(id, 7);
        assert_eq!(cart.items().first().unwrap().quantity, 7);
        assert_eq!(cart.total_items(), 7);
    }

    #[test]
    fn test_update_quantity_zero_removes_line() {
        let cart = engine();
        let id = MenuItemId::random();
        cart.add_item(item(id, RestaurantId::random(), 500));

        cart.update_quantity(id, 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_negative_removes_line() {
        let cart = engine();
        let id = MenuItemId::random();
        cart.add_item(item(id, RestaurantId::random(), 500));

        cart.update_quantity(id, -5);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_removing_last_line_resets_restaurant() {
        let cart = engine();
        let id = MenuItemId::random();
        cart.add_item(item(id, RestaurantId::random(), 500));

        cart.remove_item(id);
        assert!(cart.is_empty());
        assert_eq!(cart.restaurant_id(), None);
    }

    #[test]
    fn test_remove_absent_item_is_noop() {
        let cart = engine();
        let restaurant = RestaurantId::random();
        cart.add_item(item(MenuItemId::random(), restaurant, 500));

        cart.remove_item(MenuItemId::random());
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.restaurant_id(), Some(restaurant));
    }

    #[test]
    fn test_update_instructions() {
        let cart = engine();
        let id = MenuItemId::random();
        cart.add_item(item(id, RestaurantId::random(), 500));

        cart.update_instructions(id, "extra spicy");
        assert_eq!(
            cart.items().first().unwrap().special_instructions.as_deref(),
            Some("extra spicy")
        );

        // Absent item: no-op, no panic
        cart.update_instructions(MenuItemId::random(), "no onions");
    }

    #[test]
    fn test_derived_values_consistent_after_mutations() {
        let cart = engine();
        let restaurant = RestaurantId::random();
        let a = MenuItemId::random();
        let b = MenuItemId::random();

        cart.add_item(item(a, restaurant, 350));
        cart.add_item(item(a, restaurant, 350));
        cart.add_item(item(b, restaurant, 425));
        cart.update_quantity(b, 3);
        cart.update_quantity(a, 1);

        // Recompute from scratch and compare with the accessors
        let items = cart.items();
        let expected_count: u32 = items.iter().map(|l| l.quantity).sum();
        let expected_subtotal: Price = items.iter().map(CartLine::line_total).sum();

        assert_eq!(cart.total_items(), expected_count);
        assert_eq!(cart.subtotal(), expected_subtotal);
        assert_eq!(cart.subtotal(), Price::from_cents(350 + 3 * 425));
    }

    #[test]
    fn test_persist_reload_roundtrip() {
        let store = MemoryCartStore::new();
        let restaurant = RestaurantId::random();
        let a = MenuItemId::random();
        let b = MenuItemId::random();

        {
            let cart = CartEngine::new(store);
            cart.add_item(item(a, restaurant, 350));
            cart.add_item(item(b, restaurant, 425));
            cart.update_quantity(b, 2);
            cart.update_instructions(a, "no peanuts");

            let raw = cart.store.raw().unwrap();
            let reloaded = CartEngine::new(MemoryCartStore::with_raw(raw));

            assert_eq!(reloaded.snapshot(), cart.snapshot());
        }
    }

    #[test]
    fn test_malformed_snapshot_yields_empty_cart() {
        let cart = CartEngine::new(MemoryCartStore::with_raw("{definitely not json"));
        assert!(cart.is_empty());
        assert_eq!(cart.restaurant_id(), None);
    }

    #[test]
    fn test_invariant_violating_snapshot_yields_empty_cart() {
        // Structurally valid JSON, but a line with quantity 0
        let raw = serde_json::json!({
            "restaurant_id": RestaurantId::random(),
            "items": [{
                "item_id": MenuItemId::random(),
                "name": "Ghost Line",
                "unit_price": "1.00",
                "quantity": 0,
                "image_url": "https://img.example/x.jpg",
                "restaurant_id": RestaurantId::random(),
            }]
        })
        .to_string();

        let cart = CartEngine::new(MemoryCartStore::with_raw(raw));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_clear_persists_empty_snapshot() {
        let cart = engine();
        cart.add_item(item(
            MenuItemId::random(),
            RestaurantId::random(),
            500,
        ));
        cart.clear();

        assert!(cart.is_empty());
        assert_eq!(cart.restaurant_id(), None);
        let raw = cart.store.raw().unwrap();
        let persisted: CartSnapshot = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted, CartSnapshot::default());
    }

    #[test]
    fn test_file_store_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        let restaurant = RestaurantId::random();
        let id = MenuItemId::random();

        {
            let cart = CartEngine::new(JsonFileCartStore::new(&path));
            cart.add_item(item(id, restaurant, 999));
        }

        let cart = CartEngine::new(JsonFileCartStore::new(&path));
        assert_eq!(cart.restaurant_id(), Some(restaurant));
        assert_eq!(cart.subtotal(), Price::from_cents(999));
    }
}
