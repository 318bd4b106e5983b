//! Process-wide authentication/profile state.
//!
//! The session store wraps the hosted auth backend and caches the current
//! identity and its profile row for the rest of the app. It is a small
//! state machine:
//!
//! ```text
//! Unknown --(active session)--> Authenticated(identity, profile?)
//!         --(no session)------> Anonymous
//! ```
//!
//! `Unknown` lasts only until the initial session query resolves; the
//! navigation guard renders a loading state rather than deciding anything
//! while the store is unresolved. A failed profile fetch is logged and
//! leaves the identity usable with `profile = None`; role gating then
//! treats the role as absent.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use quickbite_core::{Email, Role, UserId};

use crate::backend::types::{ProfilePatch, UserProfile};
use crate::backend::{AuthBackend, AuthChange, AuthError, AuthSession, BackendError, ProfileSeed, UserDirectory};

/// The authenticated identity, as reported by the auth backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub email: Email,
}

/// Session store states.
#[derive(Debug, Clone, Default)]
enum SessionState {
    /// The initial session query has not resolved yet.
    #[default]
    Unknown,
    /// No identity is signed in.
    Anonymous,
    /// An identity is signed in; the profile row may still be missing if
    /// its fetch failed.
    Authenticated {
        identity: Identity,
        profile: Option<UserProfile>,
    },
}

/// A point-in-time copy of the session, consumed by the navigation guard
/// and page views.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// False only while the initial session query is outstanding.
    pub resolved: bool,
    pub identity: Option<Identity>,
    pub profile: Option<UserProfile>,
}

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A profile operation was attempted with no identity signed in.
    #[error("not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Process-wide session store.
///
/// Constructed once at startup and injected into whatever consumes it;
/// there is deliberately no global instance. Call [`initialize`] before
/// first use and hold the guard from [`watch`] for the life of the
/// process.
///
/// [`initialize`]: Self::initialize
/// [`watch`]: Self::watch
pub struct SessionStore<A, U> {
    auth: A,
    users: U,
    state: RwLock<SessionState>,
}

impl<A, U> SessionStore<A, U>
where
    A: AuthBackend,
    U: UserDirectory,
{
    /// Create a store in the `Unknown` state.
    pub const fn new(auth: A, users: U) -> Self {
        Self {
            auth,
            users,
            state: RwLock::new(SessionState::Unknown),
        }
    }

    /// Resolve the initial state by querying for an existing session.
    ///
    /// A failed query is logged and resolves to `Anonymous`; startup never
    /// blocks on the backend being healthy.
    #[instrument(skip(self))]
    pub async fn initialize(&self) {
        match self.auth.current_session().await {
            Ok(session) => self.apply_session(session).await,
            Err(e) => {
                warn!("initial session query failed: {e}");
                self.apply_session(None).await;
            }
        }
    }

    /// Re-run the state transition for an auth change: fetch the profile
    /// for a live session, or drop to `Anonymous` for none.
    async fn apply_session(&self, session: Option<AuthSession>) {
        match session {
            Some(session) => {
                let profile = match self.users.fetch_profile(session.user_id).await {
                    Ok(Some(profile)) => Some(profile),
                    Ok(None) => {
                        warn!(user = %session.user_id, "no profile row for identity");
                        None
                    }
                    Err(e) => {
                        // Identity is still usable; role gating treats the
                        // role as absent until a later refresh succeeds.
                        warn!(user = %session.user_id, "profile fetch failed: {e}");
                        None
                    }
                };
                let identity = Identity {
                    id: session.user_id,
                    email: session.email,
                };
                *self.write() = SessionState::Authenticated { identity, profile };
            }
            None => *self.write() = SessionState::Anonymous,
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for a bad email/password
    /// pair, or the underlying backend failure.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &Email, password: &str) -> Result<(), AuthError> {
        let session = self.auth.sign_in(email, password).await?;
        self.apply_session(Some(session)).await;
        Ok(())
    }

    /// Register a new identity. The profile's role defaults to customer
    /// when the seed leaves it unspecified.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateEmail`] if the email is taken, or the
    /// underlying backend failure.
    #[instrument(skip(self, password, seed))]
    pub async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        seed: &ProfileSeed,
    ) -> Result<Identity, AuthError> {
        let session = self.auth.sign_up(email, password, seed).await?;
        let identity = Identity {
            id: session.user_id,
            email: session.email.clone(),
        };
        self.apply_session(Some(session)).await;
        Ok(identity)
    }

    /// Sign out. Local state is cleared regardless of the backend outcome:
    /// a dead backend must not trap the user in a signed-in UI.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if let Err(e) = self.auth.sign_out().await {
            warn!("backend sign-out failed, clearing local session anyway: {e}");
        }
        self.apply_session(None).await;
        info!("signed out");
    }

    /// Apply a partial profile update, then re-fetch the profile row so
    /// the cached copy reflects what the backend actually stored.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotAuthenticated`] while anonymous or
    /// unresolved, or the underlying backend failure.
    #[instrument(skip(self, patch))]
    pub async fn update_profile(&self, patch: &ProfilePatch) -> Result<(), SessionError> {
        let identity = self.identity().ok_or(SessionError::NotAuthenticated)?;

        self.users.update_profile(identity.id, patch).await?;

        match self.users.fetch_profile(identity.id).await {
            Ok(profile) => {
                let mut state = self.write();
                if let SessionState::Authenticated {
                    profile: cached, ..
                } = &mut *state
                {
                    *cached = profile;
                }
            }
            Err(e) => warn!("profile refresh after update failed: {e}"),
        }

        Ok(())
    }

    /// Spawn the listener that keeps this store in sync with the auth
    /// backend's change feed. The subscription lives until the returned
    /// guard is dropped.
    #[must_use]
    pub fn watch(self: &Arc<Self>) -> SessionWatch
    where
        A: 'static,
        U: 'static,
    {
        let store = Arc::clone(self);
        let mut feed = store.auth.subscribe();
        let handle = tokio::spawn(async move {
            while let Some(change) = feed.next().await {
                match change {
                    AuthChange::SignedIn(session) => store.apply_session(Some(session)).await,
                    AuthChange::SignedOut => store.apply_session(None).await,
                }
            }
        });
        SessionWatch { handle }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current identity, if authenticated.
    pub fn identity(&self) -> Option<Identity> {
        match &*self.read() {
            SessionState::Authenticated { identity, .. } => Some(identity.clone()),
            _ => None,
        }
    }

    /// Current cached profile, if authenticated and fetched.
    pub fn profile(&self) -> Option<UserProfile> {
        match &*self.read() {
            SessionState::Authenticated { profile, .. } => profile.clone(),
            _ => None,
        }
    }

    /// Current role, absent while the profile is missing.
    pub fn role(&self) -> Option<Role> {
        self.profile().map(|p| p.role)
    }

    /// Whether the cached profile carries the rider role.
    pub fn is_rider(&self) -> bool {
        self.role() == Some(Role::Rider)
    }

    /// Whether the cached profile carries the customer role.
    pub fn is_customer(&self) -> bool {
        self.role() == Some(Role::Customer)
    }

    /// Whether the cached profile carries the admin role.
    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    /// A point-in-time copy for the navigation guard.
    pub fn snapshot(&self) -> SessionSnapshot {
        match &*self.read() {
            SessionState::Unknown => SessionSnapshot {
                resolved: false,
                identity: None,
                profile: None,
            },
            SessionState::Anonymous => SessionSnapshot {
                resolved: true,
                identity: None,
                profile: None,
            },
            SessionState::Authenticated { identity, profile } => SessionSnapshot {
                resolved: true,
                identity: Some(identity.clone()),
                profile: profile.clone(),
            },
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Guard for the auth feed listener; dropping it releases the
/// subscription on process teardown.
pub struct SessionWatch {
    handle: JoinHandle<()>,
}

impl Drop for SessionWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::memory::InMemoryBackend;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn seed(name: &str, role: Option<Role>) -> ProfileSeed {
        ProfileSeed {
            full_name: name.to_owned(),
            phone: None,
            role,
        }
    }

    fn store(backend: &InMemoryBackend) -> SessionStore<InMemoryBackend, InMemoryBackend> {
        SessionStore::new(backend.clone(), backend.clone())
    }

    #[tokio::test]
    async fn test_starts_unresolved() {
        let backend = InMemoryBackend::new();
        let store = store(&backend);

        let snapshot = store.snapshot();
        assert!(!snapshot.resolved);
        assert!(snapshot.identity.is_none());
    }

    #[tokio::test]
    async fn test_initialize_without_session_is_anonymous() {
        let backend = InMemoryBackend::new();
        let store = store(&backend);
        store.initialize().await;

        let snapshot = store.snapshot();
        assert!(snapshot.resolved);
        assert!(snapshot.identity.is_none());
        assert!(snapshot.profile.is_none());
    }

    #[tokio::test]
    async fn test_sign_up_defaults_to_customer() {
        let backend = InMemoryBackend::new();
        let store = store(&backend);
        store.initialize().await;

        store
            .sign_up(&email("dina@example.com"), "hunter-two", &seed("Dina", None))
            .await
            .unwrap();

        assert!(store.is_customer());
        assert!(!store.is_rider());
        assert_eq!(store.profile().unwrap().full_name, "Dina");
    }

    #[tokio::test]
    async fn test_login_with_bad_password_fails() {
        let backend = InMemoryBackend::new();
        let store = store(&backend);
        store.initialize().await;

        store
            .sign_up(&email("dina@example.com"), "hunter-two", &seed("Dina", None))
            .await
            .unwrap();
        store.logout().await;

        let err = store
            .login(&email("dina@example.com"), "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(store.identity().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let backend = InMemoryBackend::new();
        let store = store(&backend);
        store.initialize().await;

        store
            .sign_up(&email("dina@example.com"), "hunter-two", &seed("Dina", None))
            .await
            .unwrap();
        let err = store
            .sign_up(&email("dina@example.com"), "other", &seed("Imposter", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_profile_fetch_failure_keeps_identity() {
        let backend = InMemoryBackend::new();
        let store = store(&backend);
        store.initialize().await;

        store
            .sign_up(&email("rui@example.com"), "pw-123456", &seed("Rui", Some(Role::Rider)))
            .await
            .unwrap();
        store.logout().await;

        backend.fail_profile_fetches(true);
        store.login(&email("rui@example.com"), "pw-123456").await.unwrap();

        let snapshot = store.snapshot();
        assert!(snapshot.identity.is_some(), "identity survives fetch failure");
        assert!(snapshot.profile.is_none());
        // Derived booleans are all false while the profile is absent
        assert!(!store.is_rider());
        assert!(!store.is_customer());
        assert!(!store.is_admin());
    }

    #[tokio::test]
    async fn test_logout_clears_state_even_if_backend_fails() {
        let backend = InMemoryBackend::new();
        let store = store(&backend);
        store.initialize().await;

        store
            .sign_up(&email("dina@example.com"), "hunter-two", &seed("Dina", None))
            .await
            .unwrap();
        backend.fail_sign_out(true);
        store.logout().await;

        assert!(store.identity().is_none());
        assert!(store.snapshot().resolved);
    }

    #[tokio::test]
    async fn test_update_profile_requires_authentication() {
        let backend = InMemoryBackend::new();
        let store = store(&backend);
        store.initialize().await;

        let err = store
            .update_profile(&ProfilePatch {
                phone: Some("555-0100".to_owned()),
                ..ProfilePatch::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_update_profile_refetches() {
        let backend = InMemoryBackend::new();
        let store = store(&backend);
        store.initialize().await;

        store
            .sign_up(&email("dina@example.com"), "hunter-two", &seed("Dina", None))
            .await
            .unwrap();
        store
            .update_profile(&ProfilePatch {
                address: Some("12 Noodle Way".to_owned()),
                ..ProfilePatch::default()
            })
            .await
            .unwrap();

        assert_eq!(
            store.profile().unwrap().address.as_deref(),
            Some("12 Noodle Way")
        );
    }

    #[tokio::test]
    async fn test_watch_applies_feed_events() {
        let backend = InMemoryBackend::new();
        let store = Arc::new(SessionStore::new(backend.clone(), backend.clone()));
        store.initialize().await;
        let _watch = store.watch();

        // Sign in through the backend directly, as another surface would;
        // the feed should carry the change into this store.
        backend
            .sign_up_direct(&email("dina@example.com"), "hunter-two", &seed("Dina", None))
            .unwrap();
        backend.emit_signed_out();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(store.identity().is_none());
    }
}
