//! Email/password identity client.
//!
//! # Architecture
//!
//! - Sign-in and sign-up go to the provider's REST auth endpoint
//! - Sign-up also writes a `users/{uid}` profile document with the new
//!   user's id token
//! - The session is mirrored under [`SESSION_STORAGE_KEY`] in the same
//!   key-value store as the cart, and restored at startup
//! - Session changes are published on a `tokio::sync::watch` channel
//!
//! # Example
//!
//! ```rust,ignore
//! use tote_client::identity::{IdentityClient, LoginForm};
//!
//! let identity = IdentityClient::new(&identity_config, storage)?;
//! let form = LoginForm::demo();
//! let user = identity.sign_in(&form.validate()?, &form.password).await?;
//! ```

mod error;
mod forms;
mod session;

pub use error::IdentityError;
pub use forms::{
    DEMO_EMAIL, DEMO_PASSWORD, FormError, LoginForm, MIN_PASSWORD_LENGTH, Profile, RegisterForm,
};
pub use session::{AuthUser, SESSION_STORAGE_KEY, Session};

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tote_core::Email;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::IdentityConfig;
use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::storage::KeyValueStore;
use error::ProviderErrorBody;
use session::StoredSession;

/// Token lifetime assumed when the provider omits `expiresIn`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Sign-in / sign-up response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

/// Client for the identity provider.
///
/// Cheap to clone; clones share the session and its subscribers.
#[derive(Clone)]
pub struct IdentityClient {
    inner: Arc<IdentityClientInner>,
}

struct IdentityClientInner {
    client: reqwest::Client,
    config: IdentityConfig,
    storage: Arc<dyn KeyValueStore>,
    session: RwLock<Option<Session>>,
    user_tx: watch::Sender<Option<AuthUser>>,
}

impl IdentityClient {
    /// Create a signed-out identity client.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Http` if the HTTP client fails to build.
    pub fn new(
        config: &IdentityConfig,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tote/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let (user_tx, _) = watch::channel(None);

        Ok(Self {
            inner: Arc::new(IdentityClientInner {
                client,
                config: config.clone(),
                storage,
                session: RwLock::new(None),
                user_tx,
            }),
        })
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<AuthUser> {
        self.inner.user_tx.borrow().clone()
    }

    /// The current session including tokens, if any.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.inner.session.read().clone()
    }

    /// Observe session changes.
    ///
    /// The receiver starts with the current user and sees every sign-in,
    /// sign-up, sign-out, and restore after that.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthUser>> {
        self.inner.user_tx.subscribe()
    }

    /// Restore the persisted session, if one is stored and still valid.
    ///
    /// Expired or unreadable sessions are deleted from storage. Storage
    /// failures are logged and treated as signed out.
    #[instrument(skip(self))]
    pub async fn restore_session(&self) -> Option<AuthUser> {
        let raw = match self.inner.storage.get(SESSION_STORAGE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session");
                return None;
            }
        };

        let session = serde_json::from_str::<StoredSession>(&raw)
            .ok()
            .and_then(StoredSession::into_session);

        match session {
            Some(session) if !session.is_expired_at(Utc::now()) => {
                info!(uid = %session.user.uid, "Session restored");
                let user = session.user.clone();
                self.publish(Some(session));
                Some(user)
            }
            Some(_) => {
                debug!("Persisted session expired");
                self.discard_persisted().await;
                None
            }
            None => {
                warn!("Discarding unreadable persisted session");
                self.discard_persisted().await;
                None
            }
        }
    }

    fn publish(&self, session: Option<Session>) {
        let user = session.as_ref().map(|s| s.user.clone());
        match &user {
            Some(user) => set_sentry_user(&user.uid, Some(user.email.as_str())),
            None => clear_sentry_user(),
        }
        *self.inner.session.write() = session;
        self.inner.user_tx.send_replace(user);
    }

    async fn persist(&self, session: &Session) {
        let stored = match serde_json::to_string(&session.to_stored()) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize session");
                return;
            }
        };
        if let Err(e) = self.inner.storage.set(SESSION_STORAGE_KEY, stored).await {
            warn!(error = %e, "Failed to persist session");
        }
    }

    async fn discard_persisted(&self) {
        if let Err(e) = self.inner.storage.remove(SESSION_STORAGE_KEY).await {
            warn!(error = %e, "Failed to remove persisted session");
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns the provider's rejection mapped to an `IdentityError` variant,
    /// or `IdentityError::Http` if the request fails.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthUser, IdentityError> {
        let response: AuthResponse = self
            .auth_request("accounts:signInWithPassword", email, password)
            .await?;
        let session = session_from(response, email);

        self.persist(&session).await;
        let user = session.user.clone();
        self.publish(Some(session));

        info!(uid = %user.uid, "Signed in");
        add_breadcrumb("auth", "Signed in", None);
        Ok(user)
    }

    /// Create an account, then write its profile document.
    ///
    /// The user is only signed in once both steps succeed.
    ///
    /// # Errors
    ///
    /// Returns the provider's rejection of either step mapped to an
    /// `IdentityError` variant, or `IdentityError::Http` if a request fails.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn sign_up(
        &self,
        email: &Email,
        password: &str,
        profile: &Profile,
    ) -> Result<AuthUser, IdentityError> {
        let response: AuthResponse = self.auth_request("accounts:signUp", email, password).await?;
        let session = session_from(response, email);

        self.write_profile(&session, profile).await?;

        self.persist(&session).await;
        let user = session.user.clone();
        self.publish(Some(session));

        info!(uid = %user.uid, "Account created");
        add_breadcrumb("auth", "Signed up", None);
        Ok(user)
    }

    /// Sign out and forget the persisted session.
    ///
    /// Signing out while signed out is a no-op apart from the storage delete.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        let was_signed_in = self.current_user().is_some();
        self.publish(None);
        self.discard_persisted().await;

        if was_signed_in {
            info!("Signed out");
            add_breadcrumb("auth", "Signed out", None);
        }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// `POST {auth_url}/{method}?key=...` with an email/password body.
    async fn auth_request<T: DeserializeOwned>(
        &self,
        method: &str,
        email: &Email,
        password: &str,
    ) -> Result<T, IdentityError> {
        let url = self.auth_endpoint(method)?;
        let body = serde_json::json!({
            "email": email.as_str(),
            "password": password,
            "returnSecureToken": true,
        });

        let response = self.inner.client.post(url).json(&body).send().await?;
        read_json(response).await
    }

    fn auth_endpoint(&self, method: &str) -> Result<Url, IdentityError> {
        let mut url = Url::parse(&format!("{}/{method}", self.inner.config.auth_url))
            .map_err(|e| IdentityError::Provider(format!("invalid auth URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("key", self.inner.config.api_key.expose_secret());
        Ok(url)
    }

    /// `PATCH` the `users/{uid}` document with the profile fields.
    async fn write_profile(&self, session: &Session, profile: &Profile) -> Result<(), IdentityError> {
        let url = format!(
            "{}/projects/{}/databases/(default)/documents/users/{}",
            self.inner.config.documents_url,
            self.inner.config.project_id,
            urlencoding::encode(&session.user.uid),
        );
        let body = serde_json::json!({
            "fields": {
                "firstName": { "stringValue": profile.first_name },
                "lastName": { "stringValue": profile.last_name },
                "email": { "stringValue": session.user.email.as_str() },
                "createdAt": { "timestampValue": Utc::now().to_rfc3339() },
            }
        });

        let response = self
            .inner
            .client
            .patch(&url)
            .bearer_auth(session.id_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(uid = %session.user.uid, "Profile document written");
            return Ok(());
        }

        let body = response.text().await?;
        warn!(status = %status, "Profile document write rejected");
        Err(ProviderErrorBody::into_error(&body))
    }
}

/// Decode a success body, or map an error body to an `IdentityError`.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, IdentityError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let err = ProviderErrorBody::into_error(&body);
        debug!(status = %status, error = %err, "Identity provider rejected request");
        return Err(err);
    }

    Ok(serde_json::from_str(&body)?)
}

fn session_from(response: AuthResponse, requested: &Email) -> Session {
    let email = response
        .email
        .as_deref()
        .and_then(|e| Email::parse(e).ok())
        .unwrap_or_else(|| requested.clone());
    let expires_in = response
        .expires_in
        .as_deref()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS);

    Session {
        user: AuthUser {
            uid: response.local_id,
            email,
        },
        id_token: SecretString::from(response.id_token),
        refresh_token: SecretString::from(response.refresh_token),
        expires_at: expiry_after(Utc::now(), expires_in),
    }
}

/// `now + expires_in` seconds; out-of-range lifetimes get the default.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    Duration::try_seconds(expires_in)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .or_else(|| now.checked_add_signed(Duration::seconds(DEFAULT_EXPIRES_IN_SECS)))
        .unwrap_or(now)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn client(storage: &MemoryStore) -> IdentityClient {
        let config = IdentityConfig {
            auth_url: "http://127.0.0.1:9".to_string(),
            documents_url: "http://127.0.0.1:9".to_string(),
            ..IdentityConfig::new(SecretString::from("test-api-key"), "tote-test")
        };
        IdentityClient::new(&config, Arc::new(storage.clone())).unwrap()
    }

    fn stored(expires_in: Duration) -> String {
        let session = Session {
            user: AuthUser {
                uid: "uid-7".to_string(),
                email: Email::parse("demo@example.com").unwrap(),
            },
            id_token: SecretString::from("id"),
            refresh_token: SecretString::from("refresh"),
            expires_at: Utc::now() + expires_in,
        };
        serde_json::to_string(&session.to_stored()).unwrap()
    }

    #[test]
    fn test_auth_endpoint_carries_key() {
        let identity = client(&MemoryStore::new());
        let url = identity.auth_endpoint("accounts:signUp").unwrap();
        assert_eq!(url.path(), "/accounts:signUp");
        assert_eq!(url.query(), Some("key=test-api-key"));
    }

    #[test]
    fn test_session_from_response() {
        let requested = Email::parse("demo@example.com").unwrap();
        let response: AuthResponse = serde_json::from_str(
            r#"{"localId":"abc","email":"demo@example.com","idToken":"t","refreshToken":"r","expiresIn":"3600"}"#,
        )
        .unwrap();

        let session = session_from(response, &requested);
        assert_eq!(session.user.uid, "abc");
        assert_eq!(session.user.email, requested);
        assert!(!session.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_out_of_range_expiry_uses_default_lifetime() {
        let requested = Email::parse("demo@example.com").unwrap();
        let response: AuthResponse = serde_json::from_str(
            r#"{"localId":"abc","idToken":"t","refreshToken":"r","expiresIn":"9223372036854775807"}"#,
        )
        .unwrap();

        let before = Utc::now();
        let session = session_from(response, &requested);
        let lifetime = session.expires_at - before;
        assert!(lifetime > Duration::minutes(59));
        assert!(lifetime <= Duration::seconds(DEFAULT_EXPIRES_IN_SECS + 1));
        assert!(!session.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_expiry_after_overflow_falls_back() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, 120), now + Duration::seconds(120));
        assert_eq!(
            expiry_after(now, i64::MIN),
            now + Duration::seconds(DEFAULT_EXPIRES_IN_SECS)
        );
        assert_eq!(expiry_after(DateTime::<Utc>::MAX_UTC, 3600), DateTime::<Utc>::MAX_UTC);
    }

    #[tokio::test]
    async fn test_restore_valid_session_notifies_subscribers() {
        let storage = MemoryStore::new();
        storage
            .set(SESSION_STORAGE_KEY, stored(Duration::hours(1)))
            .await
            .unwrap();
        let identity = client(&storage);
        let rx = identity.subscribe();

        let user = identity.restore_session().await.unwrap();
        assert_eq!(user.uid, "uid-7");
        assert_eq!(identity.current_user(), Some(user.clone()));
        assert_eq!(*rx.borrow(), Some(user));
    }

    #[tokio::test]
    async fn test_restore_discards_expired_session() {
        let storage = MemoryStore::new();
        storage
            .set(SESSION_STORAGE_KEY, stored(Duration::hours(-1)))
            .await
            .unwrap();
        let identity = client(&storage);

        assert!(identity.restore_session().await.is_none());
        assert!(storage.get(SESSION_STORAGE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_discards_garbage() {
        let storage = MemoryStore::new();
        storage
            .set(SESSION_STORAGE_KEY, "{\"uid\":1}".to_string())
            .await
            .unwrap();
        let identity = client(&storage);

        assert!(identity.restore_session().await.is_none());
        assert!(storage.get(SESSION_STORAGE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_out_clears_session() {
        let storage = MemoryStore::new();
        storage
            .set(SESSION_STORAGE_KEY, stored(Duration::hours(1)))
            .await
            .unwrap();
        let identity = client(&storage);
        identity.restore_session().await.unwrap();
        let mut rx = identity.subscribe();

        identity.sign_out().await;
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
        assert!(identity.current_user().is_none());
        assert!(identity.session().is_none());
        assert!(storage.get(SESSION_STORAGE_KEY).await.unwrap().is_none());
    }
}
