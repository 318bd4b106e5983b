//! Hosted backend over HTTP.
//!
//! The backend exposes four surfaces on one base URL:
//! - `/auth/v1/*` for identity (password grant, sign-up, logout)
//! - `/rest/v1/*` for row-level reads and writes with query-string filters
//! - `/storage/v1/object/*` for blob uploads
//! - a ready-order feed, modeled here as a polling subscription
//!
//! Every request carries the public `apikey` header; row and storage calls
//! additionally carry a bearer token, the signed-in access token when one
//! exists and the public key otherwise (the backend's row-level rules
//! decide what an anonymous bearer may see).

mod auth;
mod data;
mod realtime;
mod storage;

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use moka::future::Cache;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;
use url::Url;

use quickbite_core::RestaurantId;

use super::types::{MenuItem, Restaurant};
use super::{AuthChange, AuthSession, BackendError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CATALOG_TTL: Duration = Duration::from_secs(300);
const CATALOG_CAPACITY: u64 = 256;

/// How much of an error body is kept for the error value.
const BODY_TRUNCATE: usize = 512;

struct RestInner {
    http: reqwest::Client,
    base: Url,
    anon_key: SecretString,
    session: RwLock<Option<AuthSession>>,
    auth_tx: broadcast::Sender<AuthChange>,
    restaurants: Cache<(), Vec<Restaurant>>,
    menus: Cache<RestaurantId, Vec<MenuItem>>,
    poll_interval: Duration,
}

/// Client for the hosted backend. Cheaply cloneable; clones share the
/// connection pool, session, and catalog caches.
#[derive(Clone)]
pub struct RestBackend {
    inner: Arc<RestInner>,
}

impl RestBackend {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &crate::config::ClientConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let (auth_tx, _) = broadcast::channel(16);

        Ok(Self {
            inner: Arc::new(RestInner {
                http,
                base: config.backend_url.clone(),
                anon_key: config.anon_key.clone(),
                session: RwLock::new(None),
                auth_tx,
                restaurants: Cache::builder()
                    .max_capacity(1)
                    .time_to_live(CATALOG_TTL)
                    .build(),
                menus: Cache::builder()
                    .max_capacity(CATALOG_CAPACITY)
                    .time_to_live(CATALOG_TTL)
                    .build(),
                poll_interval: config.feed_poll_interval,
            }),
        })
    }

    /// Absolute URL for a path under the backend base.
    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{path}",
            self.inner.base.as_str().trim_end_matches('/')
        )
    }

    fn table(&self, name: &str) -> String {
        self.endpoint(&format!("rest/v1/{name}"))
    }

    /// Attach the public API key and a bearer token. Row-level rules are
    /// evaluated against the signed-in token when one exists.
    fn authed(&self, rb: RequestBuilder) -> RequestBuilder {
        let anon = self.inner.anon_key.expose_secret().to_owned();
        let bearer = self
            .inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or_else(|| anon.clone(), |s| s.access_token.clone());
        rb.header("apikey", anon).bearer_auth(bearer)
    }

    fn current(&self) -> Option<AuthSession> {
        self.inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_session(&self, session: Option<AuthSession>) {
        *self
            .inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = session;
    }

    /// Turn a non-success response into a [`BackendError::Status`].
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            body: truncate(&body),
        })
    }
}

fn truncate(body: &str) -> String {
    let mut end = BODY_TRUNCATE.min(body.len());
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_owned()
}
