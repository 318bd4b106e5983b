//! In-process backend double.
//!
//! Implements every backend trait against plain maps so the cart, session,
//! and service layers can be exercised deterministically in tests and local
//! development, with injectable failures for the degraded paths (profile
//! fetch failure, dead sign-out endpoint).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use quickbite_core::{Email, OrderId, OrderStatus, RestaurantId, Role, UserId};

use super::types::{
    CustomerContact, MenuItem, NewOrder, NewOrderItem, Order, OrderWithContacts, ProfilePatch,
    Restaurant, RestaurantContact, RiderApplication, RiderDetails, UserProfile,
};
use super::{
    AuthBackend, AuthChange, AuthError, AuthFeed, AuthSession, BackendError, DocumentStore,
    OrderFeed, OrderGateway, ProfileSeed, ReadyOrder, ReadyOrderFeed, RestaurantCatalog,
    RiderDirectory, UserDirectory,
};

#[derive(Debug, Clone)]
struct Account {
    email: Email,
    password: String,
}

/// A blob recorded by the in-memory document store.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub bucket: String,
    pub object: String,
    pub content_type: String,
    pub len: usize,
}

#[derive(Default)]
struct MemState {
    accounts: HashMap<UserId, Account>,
    by_email: HashMap<String, UserId>,
    profiles: HashMap<UserId, UserProfile>,
    restaurants: Vec<Restaurant>,
    menu_items: Vec<MenuItem>,
    orders: Vec<Order>,
    order_items: Vec<NewOrderItem>,
    riders: HashMap<UserId, RiderDetails>,
    session: Option<AuthSession>,
    documents: Vec<StoredDocument>,
}

struct Inner {
    state: Mutex<MemState>,
    auth_tx: broadcast::Sender<AuthChange>,
    feeds: Mutex<Vec<mpsc::UnboundedSender<ReadyOrder>>>,
    fail_profile_fetches: AtomicBool,
    fail_sign_out: AtomicBool,
}

/// The in-memory backend. Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct InMemoryBackend {
    inner: Arc<Inner>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        let (auth_tx, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(MemState::default()),
                auth_tx,
                feeds: Mutex::new(Vec::new()),
                fail_profile_fetches: AtomicBool::new(false),
                fail_sign_out: AtomicBool::new(false),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Failure injection
    // =========================================================================

    /// Make every profile fetch fail with a server error.
    pub fn fail_profile_fetches(&self, on: bool) {
        self.inner.fail_profile_fetches.store(on, Ordering::SeqCst);
    }

    /// Make sign-out fail with a server error.
    pub fn fail_sign_out(&self, on: bool) {
        self.inner.fail_sign_out.store(on, Ordering::SeqCst);
    }

    // =========================================================================
    // Seeding and inspection
    // =========================================================================

    pub fn insert_restaurant(&self, restaurant: Restaurant) {
        self.state().restaurants.push(restaurant);
    }

    pub fn insert_menu_item(&self, item: MenuItem) {
        self.state().menu_items.push(item);
    }

    /// All order rows, for assertions.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.state().orders.clone()
    }

    /// Line items recorded for an order, for assertions.
    #[must_use]
    pub fn items_for_order(&self, order: OrderId) -> Vec<NewOrderItem> {
        self.state()
            .order_items
            .iter()
            .filter(|i| i.order_id == order)
            .cloned()
            .collect()
    }

    /// Documents recorded by the blob store, for assertions.
    #[must_use]
    pub fn documents(&self) -> Vec<StoredDocument> {
        self.state().documents.clone()
    }

    /// Register an account synchronously and emit the signed-in event, as
    /// another surface of the app (or another tab) would.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateEmail`] if the email is taken.
    pub fn sign_up_direct(
        &self,
        email: &Email,
        password: &str,
        seed: &ProfileSeed,
    ) -> Result<AuthSession, AuthError> {
        let session = self.register(email, password, seed)?;
        let _ = self
            .inner
            .auth_tx
            .send(AuthChange::SignedIn(session.clone()));
        Ok(session)
    }

    /// Emit a signed-out event without touching state, as an expiring
    /// session would.
    pub fn emit_signed_out(&self) {
        self.state().session = None;
        let _ = self.inner.auth_tx.send(AuthChange::SignedOut);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn register(
        &self,
        email: &Email,
        password: &str,
        seed: &ProfileSeed,
    ) -> Result<AuthSession, AuthError> {
        let mut state = self.state();
        if state.by_email.contains_key(email.as_str()) {
            return Err(AuthError::DuplicateEmail);
        }

        let id = UserId::random();
        state.accounts.insert(
            id,
            Account {
                email: email.clone(),
                password: password.to_owned(),
            },
        );
        state.by_email.insert(email.as_str().to_owned(), id);
        state.profiles.insert(
            id,
            UserProfile {
                id,
                created_at: Utc::now(),
                email: email.clone(),
                full_name: seed.full_name.clone(),
                avatar_url: None,
                phone: seed.phone.clone(),
                address: None,
                role: seed.role.unwrap_or(Role::Customer),
            },
        );

        let session = AuthSession {
            user_id: id,
            email: email.clone(),
            access_token: Uuid::new_v4().to_string(),
        };
        state.session = Some(session.clone());
        Ok(session)
    }

    fn server_error(what: &str) -> BackendError {
        BackendError::Status {
            status: 500,
            body: format!("injected failure: {what}"),
        }
    }

    fn contacts_for(state: &MemState, order: &Order) -> OrderWithContacts {
        let restaurant = state
            .restaurants
            .iter()
            .find(|r| r.id == order.restaurant_id)
            .map_or_else(
                || RestaurantContact {
                    name: String::new(),
                    address: String::new(),
                },
                |r| RestaurantContact {
                    name: r.name.clone(),
                    address: r.address.clone(),
                },
            );
        let customer = state.profiles.get(&order.customer_id).map_or_else(
            || CustomerContact {
                full_name: String::new(),
                phone: None,
            },
            |p| CustomerContact {
                full_name: p.full_name.clone(),
                phone: p.phone.clone(),
            },
        );
        OrderWithContacts {
            order: order.clone(),
            restaurant,
            customer,
        }
    }

    fn notify_ready(&self, order_id: OrderId) {
        self.inner
            .feeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(ReadyOrder { order_id }).is_ok());
    }
}

// =============================================================================
// Trait implementations
// =============================================================================

impl AuthBackend for InMemoryBackend {
    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthSession, AuthError> {
        let session = {
            let mut state = self.state();
            let id = *state
                .by_email
                .get(email.as_str())
                .ok_or(AuthError::InvalidCredentials)?;
            let account = state
                .accounts
                .get(&id)
                .ok_or(AuthError::InvalidCredentials)?;
            if account.password != password {
                return Err(AuthError::InvalidCredentials);
            }
            let session = AuthSession {
                user_id: id,
                email: account.email.clone(),
                access_token: Uuid::new_v4().to_string(),
            };
            state.session = Some(session.clone());
            session
        };
        let _ = self
            .inner
            .auth_tx
            .send(AuthChange::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        seed: &ProfileSeed,
    ) -> Result<AuthSession, AuthError> {
        self.sign_up_direct(email, password, seed)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.inner.fail_sign_out.load(Ordering::SeqCst) {
            return Err(Self::server_error("sign_out").into());
        }
        self.state().session = None;
        let _ = self.inner.auth_tx.send(AuthChange::SignedOut);
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        Ok(self.state().session.clone())
    }

    fn subscribe(&self) -> AuthFeed {
        AuthFeed::new(self.inner.auth_tx.subscribe())
    }
}

impl UserDirectory for InMemoryBackend {
    async fn fetch_profile(&self, id: UserId) -> Result<Option<UserProfile>, BackendError> {
        if self.inner.fail_profile_fetches.load(Ordering::SeqCst) {
            return Err(Self::server_error("fetch_profile"));
        }
        Ok(self.state().profiles.get(&id).cloned())
    }

    async fn update_profile(&self, id: UserId, patch: &ProfilePatch) -> Result<(), BackendError> {
        let mut state = self.state();
        if let Some(profile) = state.profiles.get_mut(&id) {
            if let Some(full_name) = &patch.full_name {
                profile.full_name = full_name.clone();
            }
            if let Some(phone) = &patch.phone {
                profile.phone = Some(phone.clone());
            }
            if let Some(address) = &patch.address {
                profile.address = Some(address.clone());
            }
            if let Some(avatar_url) = &patch.avatar_url {
                profile.avatar_url = Some(avatar_url.clone());
            }
        }
        Ok(())
    }
}

impl RestaurantCatalog for InMemoryBackend {
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, BackendError> {
        Ok(self.state().restaurants.clone())
    }

    async fn restaurant(&self, id: RestaurantId) -> Result<Option<Restaurant>, BackendError> {
        Ok(self.state().restaurants.iter().find(|r| r.id == id).cloned())
    }

    async fn menu(&self, restaurant: RestaurantId) -> Result<Vec<MenuItem>, BackendError> {
        Ok(self
            .state()
            .menu_items
            .iter()
            .filter(|m| m.restaurant_id == restaurant && m.is_available)
            .cloned()
            .collect())
    }
}

impl OrderGateway for InMemoryBackend {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, BackendError> {
        let row = Order {
            id: OrderId::random(),
            created_at: Utc::now(),
            customer_id: order.customer_id,
            restaurant_id: order.restaurant_id,
            status: order.status,
            total_amount: order.total_amount,
            delivery_address: order.delivery_address.clone(),
            rider_id: None,
            estimated_delivery_time: None,
        };
        self.state().orders.push(row.clone());
        if row.status == OrderStatus::Ready {
            self.notify_ready(row.id);
        }
        Ok(row)
    }

    async fn add_items(&self, items: &[NewOrderItem]) -> Result<(), BackendError> {
        self.state().order_items.extend_from_slice(items);
        Ok(())
    }

    async fn orders_for_customer(&self, customer: UserId) -> Result<Vec<Order>, BackendError> {
        let mut orders: Vec<Order> = self
            .state()
            .orders
            .iter()
            .filter(|o| o.customer_id == customer)
            .cloned()
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.created_at));
        Ok(orders)
    }

    async fn order_detail(&self, id: OrderId) -> Result<Option<OrderWithContacts>, BackendError> {
        let state = self.state();
        Ok(state
            .orders
            .iter()
            .find(|o| o.id == id)
            .map(|o| Self::contacts_for(&state, o)))
    }

    async fn available_orders(&self) -> Result<Vec<OrderWithContacts>, BackendError> {
        let state = self.state();
        Ok(state
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Ready && o.rider_id.is_none())
            .map(|o| Self::contacts_for(&state, o))
            .collect())
    }

    async fn active_orders_for_rider(
        &self,
        rider: UserId,
    ) -> Result<Vec<OrderWithContacts>, BackendError> {
        let state = self.state();
        let mut orders: Vec<OrderWithContacts> = state
            .orders
            .iter()
            .filter(|o| {
                o.rider_id == Some(rider)
                    && matches!(o.status, OrderStatus::Assigned | OrderStatus::InDelivery)
            })
            .map(|o| Self::contacts_for(&state, o))
            .collect();
        orders.sort_by_key(|o| std::cmp::Reverse(o.order.created_at));
        Ok(orders)
    }

    async fn assign_rider(
        &self,
        order: OrderId,
        rider: UserId,
        eta: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        let mut state = self.state();
        if let Some(row) = state.orders.iter_mut().find(|o| o.id == order) {
            row.rider_id = Some(rider);
            row.status = OrderStatus::Assigned;
            row.estimated_delivery_time = Some(eta);
        }
        Ok(())
    }

    async fn set_status(&self, order: OrderId, status: OrderStatus) -> Result<(), BackendError> {
        {
            let mut state = self.state();
            if let Some(row) = state.orders.iter_mut().find(|o| o.id == order) {
                row.status = status;
            }
        }
        if status == OrderStatus::Ready {
            self.notify_ready(order);
        }
        Ok(())
    }
}

impl RiderDirectory for InMemoryBackend {
    async fn details_for(&self, user: UserId) -> Result<Option<RiderDetails>, BackendError> {
        Ok(self.state().riders.get(&user).cloned())
    }

    async fn set_availability(&self, user: UserId, available: bool) -> Result<(), BackendError> {
        if let Some(details) = self.state().riders.get_mut(&user) {
            details.is_available = available;
        }
        Ok(())
    }

    async fn register(
        &self,
        application: &RiderApplication,
    ) -> Result<RiderDetails, BackendError> {
        let details = RiderDetails {
            user_id: application.user_id,
            vehicle_type: application.vehicle_type,
            license_number: application.license_number.clone(),
            is_available: true,
            rating: 5.0,
        };
        self.state()
            .riders
            .insert(application.user_id, details.clone());
        Ok(details)
    }
}

impl DocumentStore for InMemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        object: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BackendError> {
        let path = format!("{bucket}/{object}");
        self.state().documents.push(StoredDocument {
            bucket: bucket.to_owned(),
            object: object.to_owned(),
            content_type: content_type.to_owned(),
            len: bytes.len(),
        });
        Ok(path)
    }
}

impl ReadyOrderFeed for InMemoryBackend {
    fn subscribe(&self) -> OrderFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .feeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        OrderFeed::new(rx, None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use quickbite_core::Price;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn seed(name: &str) -> ProfileSeed {
        ProfileSeed {
            full_name: name.to_owned(),
            phone: None,
            role: None,
        }
    }

    #[tokio::test]
    async fn test_sign_in_roundtrip() {
        let backend = InMemoryBackend::new();
        backend
            .sign_up(&email("a@b.c"), "pw", &seed("A"))
            .await
            .unwrap();

        let session = backend.sign_in(&email("a@b.c"), "pw").await.unwrap();
        assert_eq!(session.email.as_str(), "a@b.c");
        assert!(
            backend.current_session().await.unwrap().is_some(),
            "session is active after sign-in"
        );
    }

    #[tokio::test]
    async fn test_ready_feed_fires_on_ready_transition() {
        let backend = InMemoryBackend::new();
        let mut feed = ReadyOrderFeed::subscribe(&backend);

        let order = backend
            .create_order(&NewOrder {
                customer_id: UserId::random(),
                restaurant_id: RestaurantId::random(),
                status: OrderStatus::Pending,
                total_amount: Price::from_cents(1000),
                delivery_address: "1 Main St".to_owned(),
            })
            .await
            .unwrap();

        backend
            .set_status(order.id, OrderStatus::Ready)
            .await
            .unwrap();

        let event = feed.next().await.unwrap();
        assert_eq!(event.order_id, order.id);
    }

    #[tokio::test]
    async fn test_dropped_feed_is_pruned() {
        let backend = InMemoryBackend::new();
        let feed = ReadyOrderFeed::subscribe(&backend);
        drop(feed);

        // Triggering a notification must not keep the dead sender around
        backend
            .create_order(&NewOrder {
                customer_id: UserId::random(),
                restaurant_id: RestaurantId::random(),
                status: OrderStatus::Ready,
                total_amount: Price::from_cents(500),
                delivery_address: "1 Main St".to_owned(),
            })
            .await
            .unwrap();

        assert!(
            backend
                .inner
                .feeds
                .lock()
                .unwrap()
                .is_empty()
        );
    }
}
