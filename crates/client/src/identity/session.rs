//! Signed-in session and its persisted form.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tote_core::Email;

/// Storage key holding the persisted session.
pub const SESSION_STORAGE_KEY: &str = "session";

/// Sessions this close to expiry are treated as already expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The signed-in user as exposed to the rest of the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    /// Provider-assigned user id
    pub uid: String,
    pub email: Email,
}

/// An authenticated session.
///
/// Implements `Debug` manually to redact tokens.
#[derive(Clone)]
pub struct Session {
    pub user: AuthUser,
    pub id_token: SecretString,
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Session {
    /// Whether the id token is expired (or about to be) at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(Duration::seconds(EXPIRY_MARGIN_SECS))
            .is_none_or(|deadline| deadline <= now)
    }

    pub(crate) fn to_stored(&self) -> StoredSession {
        StoredSession {
            uid: self.user.uid.clone(),
            email: self.user.email.as_str().to_string(),
            id_token: self.id_token.expose_secret().to_string(),
            refresh_token: self.refresh_token.expose_secret().to_string(),
            expires_at: self.expires_at,
        }
    }
}

/// On-disk representation of a [`Session`].
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredSession {
    uid: String,
    email: String,
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl StoredSession {
    /// Rebuild the session; `None` if the stored email no longer parses.
    pub(crate) fn into_session(self) -> Option<Session> {
        let email = Email::parse(&self.email).ok()?;
        Some(Session {
            user: AuthUser {
                uid: self.uid,
                email,
            },
            id_token: SecretString::from(self.id_token),
            refresh_token: SecretString::from(self.refresh_token),
            expires_at: self.expires_at,
        })
    }
}
