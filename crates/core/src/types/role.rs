//! User roles.

use serde::{Deserialize, Serialize};

/// The closed set of roles an identity can hold.
///
/// Role gates which routes a user may enter. The set is closed on purpose:
/// route guarding matches exhaustively over it, so adding a role is a
/// compile-time-checked change rather than a runtime string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Browses restaurants, builds carts, places orders.
    #[default]
    Customer,
    /// Accepts and fulfills deliveries.
    Rider,
    /// Back-office access.
    Admin,
}

/// Error returned when parsing an unknown role string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Rider => write!(f, "rider"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "rider" => Ok(Self::Rider),
            "admin" => Ok(Self::Admin),
            other => Err(RoleParseError(other.to_owned())),
        }
    }
}
