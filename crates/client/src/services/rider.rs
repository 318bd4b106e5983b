//! Rider dashboard and onboarding.

use chrono::{Duration, Utc};
use rand::Rng;
use thiserror::Error;
use tracing::{info, instrument, warn};

use quickbite_core::{OrderId, OrderStatus, Price, UserId, VehicleType};

use crate::backend::types::{OrderWithContacts, RiderApplication, RiderDetails};
use crate::backend::{
    BackendError, DocumentStore, OrderFeed, OrderGateway, ReadyOrderFeed, RiderDirectory,
};

/// Minutes promised to the customer when a rider accepts an order.
const DELIVERY_ETA_MINUTES: i64 = 30;

// =============================================================================
// Estimation stubs
// =============================================================================

/// Source of a rider's earnings figure.
///
/// No earnings ledger exists yet; the shipped implementation simulates a
/// plausible figure per refresh.
pub trait EarningsProvider: Send + Sync {
    fn today(&self, rider: UserId) -> Price;
}

/// Source of pickup distance estimates.
///
/// No geocoding is wired up yet; the shipped implementation simulates a
/// short urban hop.
pub trait DistanceEstimator: Send + Sync {
    fn kilometers(&self, from_address: &str, to_address: &str) -> f64;
}

/// Simulated earnings: a plausible day total, fresh on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedEarnings;

impl EarningsProvider for SimulatedEarnings {
    fn today(&self, _rider: UserId) -> Price {
        Price::from_cents(rand::rng().random_range(2000..9000))
    }
}

/// Simulated distance: between half a kilometer and five.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedDistance;

impl DistanceEstimator for SimulatedDistance {
    fn kilometers(&self, _from_address: &str, _to_address: &str) -> f64 {
        rand::rng().random_range(0.5..5.0)
    }
}

// =============================================================================
// Dashboard
// =============================================================================

/// Errors surfaced by rider operations.
#[derive(Debug, Error)]
pub enum RiderError {
    #[error("no rider registration for this account")]
    NotRegistered,

    #[error("order {order} not found")]
    UnknownOrder { order: OrderId },

    #[error("order {order} cannot move from {from} to {to}")]
    InvalidTransition {
        order: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// An order a rider could pick up, with its estimated pickup distance.
#[derive(Debug, Clone)]
pub struct AvailableOrder {
    pub order: OrderWithContacts,
    pub distance_km: f64,
}

/// Everything the dashboard renders, rebuilt wholesale on each refresh.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub details: RiderDetails,
    pub available: Vec<AvailableOrder>,
    pub active: Vec<OrderWithContacts>,
    pub earnings_today: Price,
}

/// Rider-facing order operations for one signed-in rider.
pub struct RiderDashboard<B, E, D> {
    backend: B,
    earnings: E,
    distance: D,
    rider: UserId,
}

impl<B, E, D> RiderDashboard<B, E, D>
where
    B: OrderGateway + RiderDirectory + ReadyOrderFeed,
    E: EarningsProvider,
    D: DistanceEstimator,
{
    pub const fn new(backend: B, earnings: E, distance: D, rider: UserId) -> Self {
        Self {
            backend,
            earnings,
            distance,
            rider,
        }
    }

    /// Requery the full dashboard state.
    ///
    /// Feed events carry no payload worth applying as a delta; every
    /// trigger (initial load, feed event, manual refresh) lands here and
    /// rebuilds from authoritative rows, so duplicate or stale events are
    /// harmless.
    ///
    /// # Errors
    ///
    /// Returns [`RiderError::NotRegistered`] when the account has no rider
    /// details row, or the underlying backend failure.
    #[instrument(skip(self), fields(rider = %self.rider))]
    pub async fn refresh(&self) -> Result<DashboardView, RiderError> {
        let details = self
            .backend
            .details_for(self.rider)
            .await?
            .ok_or(RiderError::NotRegistered)?;

        let available = self
            .backend
            .available_orders()
            .await?
            .into_iter()
            .map(|order| {
                let distance_km = self
                    .distance
                    .kilometers(&order.restaurant.address, &order.order.delivery_address);
                AvailableOrder { order, distance_km }
            })
            .collect();
        let active = self.backend.active_orders_for_rider(self.rider).await?;

        Ok(DashboardView {
            details,
            available,
            active,
            earnings_today: self.earnings.today(self.rider),
        })
    }

    /// Flip this rider's availability flag, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns [`RiderError::NotRegistered`] when the account has no rider
    /// details row, or the underlying backend failure.
    #[instrument(skip(self), fields(rider = %self.rider))]
    pub async fn toggle_availability(&self) -> Result<bool, RiderError> {
        let details = self
            .backend
            .details_for(self.rider)
            .await?
            .ok_or(RiderError::NotRegistered)?;
        let next = !details.is_available;
        self.backend.set_availability(self.rider, next).await?;
        Ok(next)
    }

    /// Claim an order: assign this rider and promise a delivery time.
    ///
    /// # Errors
    ///
    /// Returns the underlying backend failure.
    #[instrument(skip(self), fields(rider = %self.rider))]
    pub async fn accept_order(&self, order: OrderId) -> Result<(), RiderError> {
        let eta = Utc::now() + Duration::minutes(DELIVERY_ETA_MINUTES);
        self.backend.assign_rider(order, self.rider, eta).await?;
        info!(%order, "order accepted");
        Ok(())
    }

    /// Move an order along its lifecycle (assigned -> in delivery ->
    /// delivered), validating the transition against the current row
    /// before writing.
    ///
    /// # Errors
    ///
    /// Returns [`RiderError::UnknownOrder`] when the order does not exist,
    /// [`RiderError::InvalidTransition`] for an out-of-order move, or the
    /// underlying backend failure.
    #[instrument(skip(self), fields(rider = %self.rider))]
    pub async fn advance_order(&self, order: OrderId, to: OrderStatus) -> Result<(), RiderError> {
        let current = self
            .backend
            .order_detail(order)
            .await?
            .ok_or(RiderError::UnknownOrder { order })?;

        let from = current.order.status;
        if !from.can_transition_to(to) {
            warn!(%order, %from, %to, "rejected status transition");
            return Err(RiderError::InvalidTransition { order, from, to });
        }

        self.backend.set_status(order, to).await?;
        info!(%order, %to, "order advanced");
        Ok(())
    }

    /// Open a ready-order subscription. Consumers call [`refresh`] on each
    /// event; dropping the feed cancels it.
    ///
    /// [`refresh`]: Self::refresh
    #[must_use]
    pub fn watch_ready_orders(&self) -> OrderFeed {
        ReadyOrderFeed::subscribe(&self.backend)
    }
}

// =============================================================================
// Onboarding
// =============================================================================

/// A license document attached to a rider application.
#[derive(Debug, Clone)]
pub struct LicenseDocument {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// What a would-be rider submits.
#[derive(Debug, Clone)]
pub struct RiderSignup {
    pub vehicle_type: VehicleType,
    pub license_number: String,
    pub license_document: Option<LicenseDocument>,
}

/// Errors surfaced by rider onboarding.
#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("a license number is required")]
    MissingLicense,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Registers new riders: uploads the license document, then inserts the
/// details row.
pub struct RiderOnboarding<B> {
    backend: B,
    docs_bucket: String,
}

impl<B> RiderOnboarding<B>
where
    B: RiderDirectory + DocumentStore,
{
    pub const fn new(backend: B, docs_bucket: String) -> Self {
        Self {
            backend,
            docs_bucket,
        }
    }

    /// Submit a rider application for the signed-in account.
    ///
    /// # Errors
    ///
    /// Returns [`OnboardingError::MissingLicense`] for a blank license
    /// number, or the underlying backend failure.
    #[instrument(skip(self, signup), fields(user = %user))]
    pub async fn submit(
        &self,
        user: UserId,
        signup: RiderSignup,
    ) -> Result<RiderDetails, OnboardingError> {
        let license_number = signup.license_number.trim();
        if license_number.is_empty() {
            return Err(OnboardingError::MissingLicense);
        }

        if let Some(document) = signup.license_document {
            let object = format!("{user}/{}", document.file_name);
            let path = self
                .backend
                .upload(
                    &self.docs_bucket,
                    &object,
                    document.bytes,
                    &document.content_type,
                )
                .await?;
            info!(%path, "license document stored");
        }

        let details = self
            .backend
            .register(&RiderApplication {
                user_id: user,
                vehicle_type: signup.vehicle_type,
                license_number: license_number.to_owned(),
            })
            .await?;
        info!(user = %user, "rider registered");
        Ok(details)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use quickbite_core::RestaurantId;

    use super::*;
    use crate::backend::memory::InMemoryBackend;
    use crate::backend::types::NewOrder;

    struct FixedEarnings(Price);

    impl EarningsProvider for FixedEarnings {
        fn today(&self, _rider: UserId) -> Price {
            self.0
        }
    }

    struct FixedDistance(f64);

    impl DistanceEstimator for FixedDistance {
        fn kilometers(&self, _from: &str, _to: &str) -> f64 {
            self.0
        }
    }

    fn dashboard(
        backend: &InMemoryBackend,
        rider: UserId,
    ) -> RiderDashboard<InMemoryBackend, FixedEarnings, FixedDistance> {
        RiderDashboard::new(
            backend.clone(),
            FixedEarnings(Price::from_cents(4200)),
            FixedDistance(2.5),
            rider,
        )
    }

    async fn register_rider(backend: &InMemoryBackend) -> UserId {
        let rider = UserId::random();
        backend
            .register(&RiderApplication {
                user_id: rider,
                vehicle_type: VehicleType::Bicycle,
                license_number: "DL-1234".to_owned(),
            })
            .await
            .unwrap();
        rider
    }

    async fn seed_order(backend: &InMemoryBackend, status: OrderStatus) -> OrderId {
        let order = backend
            .create_order(&NewOrder {
                customer_id: UserId::random(),
                restaurant_id: RestaurantId::random(),
                status,
                total_amount: Price::from_cents(1500),
                delivery_address: "1 Main St".to_owned(),
            })
            .await
            .unwrap();
        order.id
    }

    #[tokio::test]
    async fn test_refresh_requires_registration() {
        let backend = InMemoryBackend::new();
        let err = dashboard(&backend, UserId::random())
            .refresh()
            .await
            .unwrap_err();
        assert!(matches!(err, RiderError::NotRegistered));
    }

    #[tokio::test]
    async fn test_refresh_splits_available_and_active() {
        let backend = InMemoryBackend::new();
        let rider = register_rider(&backend).await;
        let dash = dashboard(&backend, rider);

        let ready = seed_order(&backend, OrderStatus::Ready).await;
        seed_order(&backend, OrderStatus::Pending).await;
        let mine = seed_order(&backend, OrderStatus::Ready).await;
        dash.accept_order(mine).await.unwrap();

        let view = dash.refresh().await.unwrap();
        assert_eq!(view.available.len(), 1);
        assert_eq!(view.available.first().unwrap().order.order.id, ready);
        assert!((view.available.first().unwrap().distance_km - 2.5).abs() < f64::EPSILON);
        assert_eq!(view.active.len(), 1);
        assert_eq!(view.active.first().unwrap().order.id, mine);
        assert_eq!(view.earnings_today, Price::from_cents(4200));
    }

    #[tokio::test]
    async fn test_accept_order_assigns_and_sets_eta() {
        let backend = InMemoryBackend::new();
        let rider = register_rider(&backend).await;
        let order = seed_order(&backend, OrderStatus::Ready).await;

        dashboard(&backend, rider).accept_order(order).await.unwrap();

        let row = backend.orders().into_iter().find(|o| o.id == order).unwrap();
        assert_eq!(row.status, OrderStatus::Assigned);
        assert_eq!(row.rider_id, Some(rider));
        assert!(row.estimated_delivery_time.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_advance_order_walks_the_lifecycle() {
        let backend = InMemoryBackend::new();
        let rider = register_rider(&backend).await;
        let dash = dashboard(&backend, rider);
        let order = seed_order(&backend, OrderStatus::Ready).await;
        dash.accept_order(order).await.unwrap();

        dash.advance_order(order, OrderStatus::InDelivery)
            .await
            .unwrap();
        dash.advance_order(order, OrderStatus::Delivered)
            .await
            .unwrap();

        let row = backend.orders().into_iter().find(|o| o.id == order).unwrap();
        assert_eq!(row.status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_advance_order_rejects_skipped_steps() {
        let backend = InMemoryBackend::new();
        let rider = register_rider(&backend).await;
        let dash = dashboard(&backend, rider);
        let order = seed_order(&backend, OrderStatus::Ready).await;
        dash.accept_order(order).await.unwrap();

        let err = dash
            .advance_order(order, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RiderError::InvalidTransition {
                from: OrderStatus::Assigned,
                to: OrderStatus::Delivered,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_advance_unknown_order_errors() {
        let backend = InMemoryBackend::new();
        let rider = register_rider(&backend).await;

        let err = dashboard(&backend, rider)
            .advance_order(OrderId::random(), OrderStatus::InDelivery)
            .await
            .unwrap_err();
        assert!(matches!(err, RiderError::UnknownOrder { .. }));
    }

    #[tokio::test]
    async fn test_toggle_availability_flips() {
        let backend = InMemoryBackend::new();
        let rider = register_rider(&backend).await;
        let dash = dashboard(&backend, rider);

        assert!(!dash.toggle_availability().await.unwrap());
        assert!(dash.toggle_availability().await.unwrap());
    }

    #[tokio::test]
    async fn test_onboarding_uploads_then_registers() {
        let backend = InMemoryBackend::new();
        let onboarding = RiderOnboarding::new(backend.clone(), "rider-documents".to_owned());
        let user = UserId::random();

        let details = onboarding
            .submit(
                user,
                RiderSignup {
                    vehicle_type: VehicleType::Motorcycle,
                    license_number: " DL-9876 ".to_owned(),
                    license_document: Some(LicenseDocument {
                        file_name: "license.pdf".to_owned(),
                        content_type: "application/pdf".to_owned(),
                        bytes: vec![1, 2, 3],
                    }),
                },
            )
            .await
            .unwrap();

        assert_eq!(details.license_number, "DL-9876");
        assert!(details.is_available);

        let docs = backend.documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs.first().unwrap().bucket, "rider-documents");
        assert_eq!(docs.first().unwrap().object, format!("{user}/license.pdf"));
    }

    #[tokio::test]
    async fn test_onboarding_rejects_blank_license() {
        let backend = InMemoryBackend::new();
        let onboarding = RiderOnboarding::new(backend, "rider-documents".to_owned());

        let err = onboarding
            .submit(
                UserId::random(),
                RiderSignup {
                    vehicle_type: VehicleType::Car,
                    license_number: "  ".to_owned(),
                    license_document: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::MissingLicense));
    }

    #[tokio::test]
    async fn test_simulated_stubs_stay_in_range() {
        let earnings = SimulatedEarnings.today(UserId::random());
        assert!(earnings >= Price::from_cents(2000));
        assert!(earnings < Price::from_cents(9000));

        let km = SimulatedDistance.kilometers("9 High St", "1 Main St");
        assert!((0.5..5.0).contains(&km));
    }
}
