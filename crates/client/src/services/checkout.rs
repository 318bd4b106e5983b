//! Checkout: pricing quote and order placement.

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, instrument};

use quickbite_core::{OrderStatus, Price};

use crate::backend::BackendError;
use crate::backend::types::{NewOrder, NewOrderItem, Order};
use crate::backend::OrderGateway;
use crate::cart::{CartEngine, CartStore};
use crate::session::SessionSnapshot;

/// Flat delivery fee charged on every order.
pub const DELIVERY_FEE: Price = Price::new(Decimal::from_parts(299, 0, 0, false, 2));

/// Tax rate applied to the item subtotal (not the delivery fee).
pub const TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// The priced breakdown shown on the checkout page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutQuote {
    pub subtotal: Price,
    pub delivery_fee: Price,
    pub tax: Price,
    pub total: Price,
}

/// Price a cart subtotal: flat delivery fee plus 10% tax on the items.
#[must_use]
pub fn quote(subtotal: Price) -> CheckoutQuote {
    let tax = (subtotal * TAX_RATE).round_cents();
    CheckoutQuote {
        subtotal,
        delivery_fee: DELIVERY_FEE,
        tax,
        total: subtotal + DELIVERY_FEE + tax,
    }
}

/// Errors surfaced when placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("the cart is empty")]
    EmptyCart,

    #[error("a delivery address is required")]
    MissingAddress,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Turns the cart into an order.
pub struct CheckoutService<G, S: CartStore> {
    orders: G,
    cart: Arc<CartEngine<S>>,
}

impl<G, S> CheckoutService<G, S>
where
    G: OrderGateway,
    S: CartStore,
{
    pub const fn new(orders: G, cart: Arc<CartEngine<S>>) -> Self {
        Self { orders, cart }
    }

    /// Place an order for the cart's contents, then empty the cart.
    ///
    /// The order row is created first and the line items attached to it
    /// second; the cart is only cleared once both writes succeed, so a
    /// failed placement leaves the basket intact for a retry.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotAuthenticated`] without a signed-in
    /// identity, [`CheckoutError::MissingAddress`] for a blank address,
    /// [`CheckoutError::EmptyCart`] when there is nothing to order, or the
    /// underlying backend failure.
    #[instrument(skip(self, session))]
    pub async fn place_order(
        &self,
        session: &SessionSnapshot,
        delivery_address: &str,
    ) -> Result<Order, CheckoutError> {
        let identity = session
            .identity
            .as_ref()
            .ok_or(CheckoutError::NotAuthenticated)?;
        let delivery_address = delivery_address.trim();
        if delivery_address.is_empty() {
            return Err(CheckoutError::MissingAddress);
        }

        let cart = self.cart.snapshot();
        let Some(restaurant_id) = cart.restaurant_id else {
            return Err(CheckoutError::EmptyCart);
        };

        let subtotal: Price = cart.items.iter().map(crate::cart::CartLine::line_total).sum();
        let priced = quote(subtotal);

        let order = self
            .orders
            .create_order(&NewOrder {
                customer_id: identity.id,
                restaurant_id,
                status: OrderStatus::Pending,
                total_amount: priced.total,
                delivery_address: delivery_address.to_owned(),
            })
            .await?;

        let items: Vec<NewOrderItem> = cart
            .items
            .iter()
            .map(|line| NewOrderItem {
                order_id: order.id,
                menu_item_id: line.item_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                special_instructions: line.special_instructions.clone(),
            })
            .collect();
        self.orders.add_items(&items).await?;

        self.cart.clear();
        info!(order = %order.id, total = %priced.total, "order placed");
        Ok(order)
    }
}
