//! Identity error types.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur during identity operations.
///
/// Provider rejections display as the message shown to the user.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No account for the email.
    #[error("No user found with this email")]
    UserNotFound,

    /// Account exists but the password is wrong.
    #[error("Incorrect password")]
    WrongPassword,

    /// Provider does not say which half of the credentials was wrong.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Provider rejected the email format.
    #[error("Invalid email address")]
    InvalidEmail,

    /// Sign-up with an email that is already registered.
    #[error("Email already in use")]
    EmailInUse,

    /// Sign-up password rejected by the provider.
    #[error("Password should be at least 6 characters")]
    WeakPassword,

    /// Any other provider rejection, message passed through verbatim.
    #[error("{0}")]
    Provider(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider response was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl IdentityError {
    /// Map a provider error message such as `WEAK_PASSWORD : Password should
    /// be at least 6 characters` to a variant.
    #[must_use]
    pub fn from_provider_message(message: &str) -> Self {
        let code = message
            .split([' ', ':'])
            .next()
            .unwrap_or_default()
            .trim();

        match code {
            "EMAIL_NOT_FOUND" => Self::UserNotFound,
            "INVALID_PASSWORD" => Self::WrongPassword,
            "INVALID_LOGIN_CREDENTIALS" => Self::InvalidCredentials,
            "INVALID_EMAIL" => Self::InvalidEmail,
            "EMAIL_EXISTS" => Self::EmailInUse,
            "WEAK_PASSWORD" => Self::WeakPassword,
            _ => Self::Provider(message.to_string()),
        }
    }

    /// Whether the provider refused the request, as opposed to the request
    /// never completing.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !matches!(self, Self::Http(_) | Self::Parse(_))
    }
}

/// `{"error": {"code": 400, "message": "EMAIL_NOT_FOUND"}}`
#[derive(Debug, Deserialize)]
pub(crate) struct ProviderErrorBody {
    pub error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProviderErrorDetail {
    #[serde(default)]
    pub message: String,
}

impl ProviderErrorBody {
    /// Decode an error response body, falling back to the raw text.
    pub(crate) fn into_error(body: &str) -> IdentityError {
        match serde_json::from_str::<Self>(body) {
            Ok(parsed) if !parsed.error.message.is_empty() => {
                IdentityError::from_provider_message(&parsed.error.message)
            }
            _ => IdentityError::Provider(body.chars().take(200).collect()),
        }
    }
}
