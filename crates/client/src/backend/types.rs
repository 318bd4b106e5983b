//! Row types for the hosted backend tables.
//!
//! Field names match the backend's column names so rows deserialize
//! directly from the wire. Unknown columns are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quickbite_core::{
    Email, MenuItemId, OrderId, OrderStatus, Price, RestaurantId, Role, UserId, VehicleType,
};

/// A row of the `users` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
    pub email: Email,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Role,
}

/// A partial update to a `users` row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfilePatch {
    /// Whether the patch would change anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.avatar_url.is_none()
    }
}

/// A row of the `restaurants` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub description: String,
    pub logo_url: String,
    pub cover_image: String,
    pub address: String,
    pub category: String,
    pub rating: f32,
    pub delivery_fee: Price,
    /// Estimated delivery time in minutes.
    pub estimated_delivery_time: u32,
    pub is_open: bool,
}

/// A row of the `menu_items` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image_url: String,
    pub category: String,
    pub restaurant_id: RestaurantId,
    pub is_available: bool,
}

/// A row of the `orders` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub customer_id: UserId,
    pub restaurant_id: RestaurantId,
    pub status: OrderStatus,
    pub total_amount: Price,
    pub delivery_address: String,
    pub rider_id: Option<UserId>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
}

/// Insert payload for the `orders` table.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub customer_id: UserId,
    pub restaurant_id: RestaurantId,
    pub status: OrderStatus,
    pub total_amount: Price,
    pub delivery_address: String,
}

/// Insert payload for the `order_items` table.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
    pub unit_price: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

/// Restaurant fields joined onto an order fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantContact {
    pub name: String,
    pub address: String,
}

/// Customer fields joined onto an order fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerContact {
    pub full_name: String,
    pub phone: Option<String>,
}

/// An order with its foreign keys expanded, as the tracking page and rider
/// dashboard consume it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithContacts {
    #[serde(flatten)]
    pub order: Order,
    pub restaurant: RestaurantContact,
    pub customer: CustomerContact,
}

/// A row of the `rider_details` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderDetails {
    pub user_id: UserId,
    pub vehicle_type: VehicleType,
    pub license_number: String,
    pub is_available: bool,
    pub rating: f32,
}

/// Insert payload for the `rider_details` table.
#[derive(Debug, Clone, Serialize)]
pub struct RiderApplication {
    pub user_id: UserId,
    pub vehicle_type: VehicleType,
    pub license_number: String,
}
