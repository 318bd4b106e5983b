//! Row-level endpoints (`/rest/v1/*`).
//!
//! Filters ride in the query string (`id=eq.{uuid}`, `rider_id=is.null`,
//! `status=in.(...)`) and writes use the `Prefer` header to pick between a
//! minimal response and the inserted representation. Foreign keys expand
//! inline through the `select` parameter.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use quickbite_core::{OrderId, OrderStatus, RestaurantId, UserId};

use super::RestBackend;
use crate::backend::types::{
    MenuItem, NewOrder, NewOrderItem, Order, OrderWithContacts, ProfilePatch, Restaurant,
    RiderApplication, RiderDetails, UserProfile,
};
use crate::backend::{
    BackendError, OrderGateway, RestaurantCatalog, RiderDirectory, UserDirectory,
};

/// Select clause expanding the restaurant and customer foreign keys.
const CONTACT_SELECT: &str =
    "*,restaurant:restaurant_id(name,address),customer:customer_id(full_name,phone)";

impl RestBackend {
    pub(super) async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, BackendError> {
        let response = self
            .authed(self.inner.http.get(self.table(table)))
            .query(query)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Fetch at most one row; `Ok(None)` when the filter matched nothing.
    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, BackendError> {
        let mut query = query.to_vec();
        query.push(("limit", "1".to_owned()));
        Ok(self.select(table, &query).await?.into_iter().next())
    }

    /// Insert a row and return it as the backend stored it.
    async fn insert_returning<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .authed(self.inner.http.post(self.table(table)))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        let mut rows: Vec<T> = Self::check(response).await?.json().await?;
        rows.drain(..).next().ok_or_else(|| BackendError::Status {
            status: 200,
            body: "insert returned an empty representation".to_owned(),
        })
    }

    async fn insert<B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<(), BackendError> {
        let response = self
            .authed(self.inner.http.post(self.table(table)))
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn patch<B: Serialize + ?Sized>(
        &self,
        table: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<(), BackendError> {
        let response = self
            .authed(self.inner.http.patch(self.table(table)))
            .header("Prefer", "return=minimal")
            .query(query)
            .json(body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

impl UserDirectory for RestBackend {
    #[instrument(skip(self))]
    async fn fetch_profile(&self, id: UserId) -> Result<Option<UserProfile>, BackendError> {
        self.select_one(
            "users",
            &[("id", format!("eq.{id}")), ("select", "*".to_owned())],
        )
        .await
    }

    #[instrument(skip(self, patch))]
    async fn update_profile(&self, id: UserId, patch: &ProfilePatch) -> Result<(), BackendError> {
        if patch.is_empty() {
            return Ok(());
        }
        self.patch("users", &[("id", format!("eq.{id}"))], patch)
            .await
    }
}

impl RestaurantCatalog for RestBackend {
    async fn list_restaurants(&self) -> Result<Vec<Restaurant>, BackendError> {
        if let Some(cached) = self.inner.restaurants.get(&()).await {
            return Ok(cached);
        }
        let rows: Vec<Restaurant> = self
            .select(
                "restaurants",
                &[
                    ("select", "*".to_owned()),
                    ("order", "rating.desc".to_owned()),
                ],
            )
            .await?;
        self.inner.restaurants.insert((), rows.clone()).await;
        debug!(count = rows.len(), "restaurant listing cached");
        Ok(rows)
    }

    async fn restaurant(&self, id: RestaurantId) -> Result<Option<Restaurant>, BackendError> {
        self.select_one(
            "restaurants",
            &[("id", format!("eq.{id}")), ("select", "*".to_owned())],
        )
        .await
    }

    async fn menu(&self, restaurant: RestaurantId) -> Result<Vec<MenuItem>, BackendError> {
        if let Some(cached) = self.inner.menus.get(&restaurant).await {
            return Ok(cached);
        }
        let rows: Vec<MenuItem> = self
            .select(
                "menu_items",
                &[
                    ("restaurant_id", format!("eq.{restaurant}")),
                    ("is_available", "eq.true".to_owned()),
                    ("select", "*".to_owned()),
                ],
            )
            .await?;
        self.inner.menus.insert(restaurant, rows.clone()).await;
        Ok(rows)
    }
}

impl OrderGateway for RestBackend {
    #[instrument(skip(self, order))]
    async fn create_order(&self, order: &NewOrder) -> Result<Order, BackendError> {
        self.insert_returning("orders", order).await
    }

    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn add_items(&self, items: &[NewOrderItem]) -> Result<(), BackendError> {
        self.insert("order_items", items).await
    }

    async fn orders_for_customer(&self, customer: UserId) -> Result<Vec<Order>, BackendError> {
        self.select(
            "orders",
            &[
                ("customer_id", format!("eq.{customer}")),
                ("select", "*".to_owned()),
                ("order", "created_at.desc".to_owned()),
            ],
        )
        .await
    }

    async fn order_detail(&self, id: OrderId) -> Result<Option<OrderWithContacts>, BackendError> {
        self.select_one(
            "orders",
            &[
                ("id", format!("eq.{id}")),
                ("select", CONTACT_SELECT.to_owned()),
            ],
        )
        .await
    }

    async fn available_orders(&self) -> Result<Vec<OrderWithContacts>, BackendError> {
        self.select(
            "orders",
            &[
                ("status", "eq.ready".to_owned()),
                ("rider_id", "is.null".to_owned()),
                ("select", CONTACT_SELECT.to_owned()),
            ],
        )
        .await
    }

    async fn active_orders_for_rider(
        &self,
        rider: UserId,
    ) -> Result<Vec<OrderWithContacts>, BackendError> {
        self.select(
            "orders",
            &[
                ("rider_id", format!("eq.{rider}")),
                ("status", "in.(assigned,in_delivery)".to_owned()),
                ("select", CONTACT_SELECT.to_owned()),
                ("order", "created_at.desc".to_owned()),
            ],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn assign_rider(
        &self,
        order: OrderId,
        rider: UserId,
        eta: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), BackendError> {
        self.patch(
            "orders",
            &[("id", format!("eq.{order}"))],
            &serde_json::json!({
                "rider_id": rider,
                "status": OrderStatus::Assigned,
                "estimated_delivery_time": eta,
            }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn set_status(&self, order: OrderId, status: OrderStatus) -> Result<(), BackendError> {
        self.patch(
            "orders",
            &[("id", format!("eq.{order}"))],
            &serde_json::json!({ "status": status }),
        )
        .await
    }
}

impl RiderDirectory for RestBackend {
    async fn details_for(&self, user: UserId) -> Result<Option<RiderDetails>, BackendError> {
        self.select_one(
            "rider_details",
            &[("user_id", format!("eq.{user}")), ("select", "*".to_owned())],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn set_availability(&self, user: UserId, available: bool) -> Result<(), BackendError> {
        self.patch(
            "rider_details",
            &[("user_id", format!("eq.{user}"))],
            &serde_json::json!({ "is_available": available }),
        )
        .await
    }

    #[instrument(skip(self, application), fields(user = %application.user_id))]
    async fn register(
        &self,
        application: &RiderApplication,
    ) -> Result<RiderDetails, BackendError> {
        self.insert_returning("rider_details", application).await
    }
}
