//! Polled ready-order feed.
//!
//! The hosted backend's push channel is not exposed here; instead a
//! background task polls the `orders` table for rows in the `ready` status
//! and emits an event for every order that entered the set since the last
//! poll. Consumers requery full state on each event, so the coarser
//! delivery (possible duplicates, no ordering) is within the feed's
//! contract. The first poll only establishes a baseline; orders already
//! ready when the subscription opens are not announced.

use std::collections::HashSet;

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;

use quickbite_core::OrderId;

use super::RestBackend;
use crate::backend::{BackendError, FeedTask, OrderFeed, ReadyOrder, ReadyOrderFeed};

#[derive(Debug, Deserialize)]
struct OrderIdRow {
    id: OrderId,
}

impl RestBackend {
    async fn ready_order_ids(&self) -> Result<HashSet<OrderId>, BackendError> {
        let rows: Vec<OrderIdRow> = self
            .select(
                "orders",
                &[
                    ("status", "eq.ready".to_owned()),
                    ("select", "id".to_owned()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }
}

impl ReadyOrderFeed for RestBackend {
    fn subscribe(&self) -> OrderFeed {
        let backend = self.clone();
        let interval = self.inner.poll_interval;
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            let mut previous: Option<HashSet<OrderId>> = None;
            loop {
                match backend.ready_order_ids().await {
                    Ok(current) => {
                        if let Some(previous) = &previous {
                            for &order_id in current.difference(previous) {
                                if tx.send(ReadyOrder { order_id }).is_err() {
                                    return;
                                }
                            }
                        }
                        previous = Some(current);
                    }
                    // Transient poll failures skip a beat rather than
                    // killing the subscription
                    Err(e) => warn!("ready-order poll failed: {e}"),
                }
                tokio::time::sleep(interval).await;
            }
        });

        OrderFeed::new(rx, Some(FeedTask(handle)))
    }
}
