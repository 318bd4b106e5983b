//! Integration tests for QuickBite.
//!
//! The journeys run fully in-process against the in-memory backend, so no
//! external services are required:
//!
//! ```bash
//! cargo test -p quickbite-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `customer_journey` - sign-up through delivered order
//! - `rider_feed` - ready-order feed driving dashboard requeries
//! - `navigation_flow` - session transitions observed by the route guard

#![allow(clippy::unwrap_used)]

use std::sync::Once;

use chrono::Utc;

use quickbite_client::backend::memory::InMemoryBackend;
use quickbite_client::backend::types::{MenuItem, Restaurant};
use quickbite_core::{Email, MenuItemId, Price, RestaurantId};

/// Install a test-friendly tracing subscriber once per process.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Parse an email literal, panicking on a typo in the fixture itself.
#[must_use]
pub fn email(s: &str) -> Email {
    Email::parse(s).unwrap()
}

/// A restaurant row with plausible defaults.
#[must_use]
pub fn restaurant(name: &str) -> Restaurant {
    Restaurant {
        id: RestaurantId::random(),
        created_at: Utc::now(),
        name: name.to_owned(),
        description: format!("{name} test fixture"),
        logo_url: "https://img.example/logo.png".to_owned(),
        cover_image: "https://img.example/cover.jpg".to_owned(),
        address: "9 High St".to_owned(),
        category: "thai".to_owned(),
        rating: 4.6,
        delivery_fee: Price::from_cents(299),
        estimated_delivery_time: 30,
        is_open: true,
    }
}

/// An available menu item priced in cents.
#[must_use]
pub fn menu_item(restaurant: &Restaurant, name: &str, cents: i64) -> MenuItem {
    MenuItem {
        id: MenuItemId::random(),
        created_at: Utc::now(),
        name: name.to_owned(),
        description: format!("{name} test fixture"),
        price: Price::from_cents(cents),
        image_url: "https://img.example/dish.jpg".to_owned(),
        category: "mains".to_owned(),
        restaurant_id: restaurant.id,
        is_available: true,
    }
}

/// A backend seeded with one restaurant and two dishes.
#[must_use]
pub fn seeded_backend() -> (InMemoryBackend, Restaurant, Vec<MenuItem>) {
    init_tracing();
    let backend = InMemoryBackend::new();
    let venue = restaurant("Thai Garden");
    let dishes = vec![
        menu_item(&venue, "Pad Thai", 1250),
        menu_item(&venue, "Green Curry", 1400),
    ];

    backend.insert_restaurant(venue.clone());
    for dish in &dishes {
        backend.insert_menu_item(dish.clone());
    }
    (backend, venue, dishes)
}
