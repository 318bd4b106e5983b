//! Application services composed from the cart, session, and backend.

pub mod checkout;
pub mod rider;

pub use checkout::{CheckoutError, CheckoutQuote, CheckoutService, DELIVERY_FEE, TAX_RATE, quote};
pub use rider::{
    AvailableOrder, DashboardView, DistanceEstimator, EarningsProvider, LicenseDocument,
    OnboardingError, RiderDashboard, RiderError, RiderOnboarding, RiderSignup, SimulatedDistance,
    SimulatedEarnings,
};
