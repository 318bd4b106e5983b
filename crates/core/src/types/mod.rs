//! Core domain types.

mod email;
mod id;
mod price;
mod role;
mod status;

pub use email::{Email, EmailError};
pub use id::{MenuItemId, OrderId, OrderItemId, RestaurantId, UserId};
pub use price::Price;
pub use role::{Role, RoleParseError};
pub use status::{OrderStatus, VehicleType};
