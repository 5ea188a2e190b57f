//! Unified error handling with Sentry integration.
//!
//! Provides a unified `ToteError` type that front ends convert component
//! errors into. [`ToteError::report`] captures the errors worth investigating
//! to Sentry, and [`ToteError::user_message`] gives the text to show without
//! leaking internal details.

use thiserror::Error;

use crate::cart::CartError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::identity::{FormError, IdentityError};
use crate::state::ContextError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum ToteError {
    /// Catalog read failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Identity operation failed.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Cart command rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// User input did not validate.
    #[error("{0}")]
    Form(#[from] FormError),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ToteError {
    /// Whether this error points at a fault rather than a user mistake or an
    /// expected condition.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::Catalog(err) => matches!(
                err,
                CatalogError::Http(_) | CatalogError::Api { .. } | CatalogError::Parse(_)
            ),
            Self::Identity(err) => !err.is_rejection(),
            Self::Cart(_) | Self::Form(_) | Self::Config(_) => false,
        }
    }

    /// Log the error, capturing server errors to Sentry.
    pub fn report(&self) {
        if self.is_server_error() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Operation failed"
            );
        } else {
            tracing::debug!(error = %self, "Operation rejected");
        }
    }

    /// Message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Catalog(err) => match err {
                CatalogError::NotFound(_) => "Product not found".to_string(),
                CatalogError::RateLimited(secs) => {
                    format!("Too many requests, try again in {secs} seconds")
                }
                CatalogError::Http(_) => {
                    "Could not reach the store, check your connection".to_string()
                }
                CatalogError::Api { .. } | CatalogError::Parse(_) => {
                    "The store is having trouble right now".to_string()
                }
            },
            Self::Identity(err) => match err {
                IdentityError::Http(_) => {
                    "Could not reach the sign-in service, check your connection".to_string()
                }
                IdentityError::Parse(_) => "Sign-in service error".to_string(),
                rejection => rejection.to_string(),
            },
            Self::Cart(err) => match err {
                CartError::NotReady(_) | CartError::LoadInProgress => {
                    "Your cart is still loading".to_string()
                }
                CartError::EmptyCart => "Your cart is empty".to_string(),
            },
            Self::Form(err) => err.to_string(),
            Self::Config(err) => err.to_string(),
        }
    }
}

impl From<ContextError> for ToteError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Catalog(e) => Self::Catalog(e),
            ContextError::Identity(e) => Self::Identity(e),
        }
    }
}

/// Result type alias for `ToteError`.
pub type Result<T> = std::result::Result<T, ToteError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product to cart", Some(&[("product_id", "3")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
