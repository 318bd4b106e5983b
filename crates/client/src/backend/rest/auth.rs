//! Identity endpoints (`/auth/v1/*`).

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use quickbite_core::{Email, Role, UserId};

use super::RestBackend;
use crate::backend::{
    AuthBackend, AuthChange, AuthError, AuthFeed, AuthSession, BackendError, ProfileSeed,
};

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

/// Sign-up payload. The `data` object is materialized into the new
/// identity's profile row by the backend.
#[derive(Debug, Serialize)]
struct SignUp<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpData<'a>,
}

#[derive(Debug, Serialize)]
struct SignUpData<'a> {
    full_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: UserId,
}

impl RestBackend {
    fn store_and_announce(&self, email: &Email, token: TokenResponse) -> AuthSession {
        let session = AuthSession {
            user_id: token.user.id,
            email: email.clone(),
            access_token: token.access_token,
        };
        self.set_session(Some(session.clone()));
        let _ = self
            .inner
            .auth_tx
            .send(AuthChange::SignedIn(session.clone()));
        session
    }
}

impl AuthBackend for RestBackend {
    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthSession, AuthError> {
        let url = self.endpoint("auth/v1/token?grant_type=password");
        let response = self
            .authed(self.inner.http.post(url))
            .json(&PasswordGrant {
                email: email.as_str(),
                password,
            })
            .send()
            .await
            .map_err(BackendError::from)?;

        // The password grant reports a bad pair as 400
        if response.status().as_u16() == 400 {
            return Err(AuthError::InvalidCredentials);
        }
        let token: TokenResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(BackendError::from)?;

        debug!(user = %token.user.id, "signed in");
        Ok(self.store_and_announce(email, token))
    }

    #[instrument(skip(self, password, seed))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        seed: &ProfileSeed,
    ) -> Result<AuthSession, AuthError> {
        let url = self.endpoint("auth/v1/signup");
        let response = self
            .authed(self.inner.http.post(url))
            .json(&SignUp {
                email: email.as_str(),
                password,
                data: SignUpData {
                    full_name: &seed.full_name,
                    phone: seed.phone.as_deref(),
                    role: seed.role,
                },
            })
            .send()
            .await
            .map_err(BackendError::from)?;

        // The signup endpoint reports an already-registered email as 400
        // or 422 depending on version
        if matches!(response.status().as_u16(), 400 | 422) {
            return Err(AuthError::DuplicateEmail);
        }
        let token: TokenResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(BackendError::from)?;

        debug!(user = %token.user.id, "signed up");
        Ok(self.store_and_announce(email, token))
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), AuthError> {
        let url = self.endpoint("auth/v1/logout");
        let response = self
            .authed(self.inner.http.post(url))
            .send()
            .await
            .map_err(BackendError::from)?;
        Self::check(response).await?;

        self.set_session(None);
        let _ = self.inner.auth_tx.send(AuthChange::SignedOut);
        Ok(())
    }

    /// The session is held in memory only; a fresh process starts signed
    /// out. The cart is the only state persisted locally.
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        Ok(self.current())
    }

    fn subscribe(&self) -> AuthFeed {
        AuthFeed::new(self.inner.auth_tx.subscribe())
    }
}
