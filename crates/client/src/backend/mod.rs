//! Interfaces to the hosted backend.
//!
//! All persistence, auth, and realtime notification is owned by an external
//! hosted backend. This module defines the four call shapes the client
//! consumes - auth, row-level data, a realtime ready-order feed, and blob
//! storage - as traits, so the rest of the crate never touches HTTP
//! directly.
//!
//! Two implementations ship with the crate:
//! - [`rest::RestBackend`] - the hosted backend over HTTP
//! - [`memory::InMemoryBackend`] - a deterministic in-process double for
//!   tests and local development

pub mod memory;
pub mod rest;
pub mod types;

use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use quickbite_core::{Email, OrderId, OrderStatus, RestaurantId, Role, UserId};

use types::{
    MenuItem, NewOrder, NewOrderItem, Order, OrderWithContacts, ProfilePatch, Restaurant,
    RiderApplication, RiderDetails, UserProfile,
};

// =============================================================================
// Errors
// =============================================================================

/// Any failed remote call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for logging.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("malformed backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors from the auth endpoints.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email/password combination.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The email is already registered.
    #[error("an account with this email already exists")]
    DuplicateEmail,

    /// Any other failed remote call.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

// =============================================================================
// Auth
// =============================================================================

/// An active authentication session.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Identity the backend authenticated.
    pub user_id: UserId,
    /// Email the identity signed in with.
    pub email: Email,
    /// Bearer token for subsequent row/storage calls.
    pub access_token: String,
}

/// Profile fields supplied at sign-up.
///
/// The backend materializes these into a `users` row; `role` defaults to
/// [`Role::Customer`] when unspecified.
#[derive(Debug, Clone)]
pub struct ProfileSeed {
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Option<Role>,
}

/// A change delivered on the auth state feed.
#[derive(Debug, Clone)]
pub enum AuthChange {
    SignedIn(AuthSession),
    SignedOut,
}

/// Subscription to auth state changes.
///
/// Held for the lifetime of the process by the session store's watcher;
/// dropping it releases the subscription.
pub struct AuthFeed {
    rx: broadcast::Receiver<AuthChange>,
}

impl AuthFeed {
    pub(crate) const fn new(rx: broadcast::Receiver<AuthChange>) -> Self {
        Self { rx }
    }

    /// Wait for the next auth change. Returns `None` once the backend that
    /// produced this feed is gone.
    pub async fn next(&mut self) -> Option<AuthChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                // Missed events are fine: the consumer re-runs the same
                // transition logic on whatever arrives next.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Authentication operations against the hosted backend.
pub trait AuthBackend: Send + Sync {
    /// Sign in with email and password.
    fn sign_in(
        &self,
        email: &Email,
        password: &str,
    ) -> impl Future<Output = Result<AuthSession, AuthError>> + Send;

    /// Register a new identity and its profile row.
    fn sign_up(
        &self,
        email: &Email,
        password: &str,
        seed: &ProfileSeed,
    ) -> impl Future<Output = Result<AuthSession, AuthError>> + Send;

    /// Invalidate the current session.
    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Query whatever session is currently active, if any.
    fn current_session(
        &self,
    ) -> impl Future<Output = Result<Option<AuthSession>, AuthError>> + Send;

    /// Subscribe to auth state changes for the lifetime of the process.
    fn subscribe(&self) -> AuthFeed;
}

// =============================================================================
// Row-level data
// =============================================================================

/// Reads and writes against the `users` table.
pub trait UserDirectory: Send + Sync {
    /// Fetch the profile row for an identity, if one exists.
    fn fetch_profile(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<UserProfile>, BackendError>> + Send;

    /// Apply a partial update to a profile row.
    fn update_profile(
        &self,
        id: UserId,
        patch: &ProfilePatch,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Reads against `restaurants` and `menu_items`.
pub trait RestaurantCatalog: Send + Sync {
    /// All restaurants, open or not, for the listing page.
    fn list_restaurants(
        &self,
    ) -> impl Future<Output = Result<Vec<Restaurant>, BackendError>> + Send;

    /// A single restaurant by ID.
    fn restaurant(
        &self,
        id: RestaurantId,
    ) -> impl Future<Output = Result<Option<Restaurant>, BackendError>> + Send;

    /// Available menu items for a restaurant.
    fn menu(
        &self,
        restaurant: RestaurantId,
    ) -> impl Future<Output = Result<Vec<MenuItem>, BackendError>> + Send;
}

/// Reads and writes against `orders` and `order_items`.
pub trait OrderGateway: Send + Sync {
    /// Insert a new order row and return it with its assigned ID.
    fn create_order(
        &self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<Order, BackendError>> + Send;

    /// Insert the line items belonging to an order.
    fn add_items(
        &self,
        items: &[NewOrderItem],
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// A customer's orders, newest first.
    fn orders_for_customer(
        &self,
        customer: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, BackendError>> + Send;

    /// A single order joined with restaurant name/address and customer
    /// name/phone, for tracking and rider views.
    fn order_detail(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<OrderWithContacts>, BackendError>> + Send;

    /// Orders with status `ready` and no rider assigned.
    fn available_orders(
        &self,
    ) -> impl Future<Output = Result<Vec<OrderWithContacts>, BackendError>> + Send;

    /// A rider's assigned and in-delivery orders, newest first.
    fn active_orders_for_rider(
        &self,
        rider: UserId,
    ) -> impl Future<Output = Result<Vec<OrderWithContacts>, BackendError>> + Send;

    /// Claim an order for a rider and mark it assigned.
    fn assign_rider(
        &self,
        order: OrderId,
        rider: UserId,
        eta: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Request a status update for an order.
    fn set_status(
        &self,
        order: OrderId,
        status: OrderStatus,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Reads and writes against `rider_details`.
pub trait RiderDirectory: Send + Sync {
    /// A rider's details row, if registered.
    fn details_for(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Option<RiderDetails>, BackendError>> + Send;

    /// Flip a rider's availability flag.
    fn set_availability(
        &self,
        user: UserId,
        available: bool,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Insert a new `rider_details` row.
    fn register(
        &self,
        application: &RiderApplication,
    ) -> impl Future<Output = Result<RiderDetails, BackendError>> + Send;
}

/// Blob storage for uploaded documents.
pub trait DocumentStore: Send + Sync {
    /// Upload a named file into a bucket, returning its object path.
    fn upload(
        &self,
        bucket: &str,
        object: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;
}

// =============================================================================
// Realtime
// =============================================================================

/// An order that just became available for pickup.
#[derive(Debug, Clone)]
pub struct ReadyOrder {
    pub order_id: OrderId,
}

/// Owns the background task driving a polled subscription; aborts it on
/// drop so a torn-down view can never receive a late event.
pub(crate) struct FeedTask(pub(crate) JoinHandle<()>);

impl Drop for FeedTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Subscription to ready-order insert events.
///
/// Delivery order is not guaranteed and events may duplicate; consumers
/// must requery full state rather than apply deltas. Dropping the feed
/// cancels the subscription.
pub struct OrderFeed {
    rx: mpsc::UnboundedReceiver<ReadyOrder>,
    _task: Option<FeedTask>,
}

impl OrderFeed {
    pub(crate) const fn new(
        rx: mpsc::UnboundedReceiver<ReadyOrder>,
        task: Option<FeedTask>,
    ) -> Self {
        Self { rx, _task: task }
    }

    /// Wait for the next ready-order event. Returns `None` once the feed's
    /// producer is gone.
    pub async fn next(&mut self) -> Option<ReadyOrder> {
        self.rx.recv().await
    }
}

/// Insert events on `orders` filtered by `status = ready`.
pub trait ReadyOrderFeed: Send + Sync {
    /// Open a new subscription.
    fn subscribe(&self) -> OrderFeed;
}
