//! Role-gated navigation.
//!
//! The guard is a pure function from a session snapshot and a requested
//! path to a routing decision. It never performs I/O; the caller renders a
//! loading state for [`RouteDecision::Pending`] and performs the redirect
//! for [`RouteDecision::Redirect`].

use quickbite_core::Role;

use crate::session::SessionSnapshot;

/// Well-known paths.
pub mod routes {
    use quickbite_core::OrderId;

    pub const HOME: &str = "/";
    pub const LOGIN: &str = "/login";
    pub const SIGNUP: &str = "/signup";
    pub const CHECKOUT: &str = "/checkout";
    pub const ORDERS: &str = "/orders";
    pub const PROFILE: &str = "/profile";
    pub const RIDER_DASHBOARD: &str = "/rider-dashboard";

    /// Tracking page for one order.
    #[must_use]
    pub fn order_detail(id: OrderId) -> String {
        format!("/orders/{id}")
    }
}

/// What the router should do with a navigation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// The session is still resolving; render a loading state and re-run
    /// the guard once it settles.
    Pending,
    /// Render the requested path.
    Allow,
    /// Navigate elsewhere instead.
    Redirect {
        to: String,
        /// Path to resume after a successful login, carried only on the
        /// anonymous-to-login redirect.
        return_to: Option<String>,
    },
}

/// Where a signed-in user lands when bounced off a page their role may
/// not see.
#[must_use]
pub const fn role_home(role: Role) -> &'static str {
    match role {
        Role::Rider => routes::RIDER_DASHBOARD,
        Role::Customer | Role::Admin => routes::HOME,
    }
}

/// Roles allowed on a path, or `None` for public pages.
#[must_use]
pub fn protection(path: &str) -> Option<&'static [Role]> {
    const CUSTOMER: &[Role] = &[Role::Customer];
    const RIDER: &[Role] = &[Role::Rider];

    match path {
        routes::CHECKOUT | routes::ORDERS | routes::PROFILE => Some(CUSTOMER),
        routes::RIDER_DASHBOARD => Some(RIDER),
        _ if path.starts_with("/orders/") => Some(CUSTOMER),
        _ => None,
    }
}

/// Decide a navigation request against the route table.
#[must_use]
pub fn decide(session: &SessionSnapshot, path: &str) -> RouteDecision {
    protection(path).map_or(RouteDecision::Allow, |roles| {
        evaluate(session, roles, path)
    })
}

/// Decide a navigation request for a page restricted to `allowed_roles`.
///
/// The checks run in order: an unresolved session is pending, a missing
/// identity goes to login with the requested path preserved, and a loaded
/// profile outside the allowed roles bounces to its role's home page. An
/// identity whose profile row is absent passes the role check; roles are
/// only enforced once a profile is loaded.
#[must_use]
pub fn evaluate(session: &SessionSnapshot, allowed_roles: &[Role], path: &str) -> RouteDecision {
    if !session.resolved {
        return RouteDecision::Pending;
    }

    if session.identity.is_none() {
        return RouteDecision::Redirect {
            to: routes::LOGIN.to_owned(),
            return_to: Some(path.to_owned()),
        };
    }

    if !allowed_roles.is_empty()
        && let Some(profile) = &session.profile
        && !allowed_roles.contains(&profile.role)
    {
        return RouteDecision::Redirect {
            to: role_home(profile.role).to_owned(),
            return_to: None,
        };
    }

    RouteDecision::Allow
}
