//! Application context shared across front-end commands.

use std::sync::Arc;

use tracing::info;

use crate::cart::CartStore;
use crate::catalog::{CatalogClient, CatalogError};
use crate::config::{ClientConfig, ConfigError};
use crate::identity::{IdentityClient, IdentityError};
use crate::storage::{self, KeyValueStore};

/// Error composing the application context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("catalog client: {0}")]
    Catalog(#[from] CatalogError),
    #[error("identity client: {0}")]
    Identity(#[from] IdentityError),
}

/// Everything a front end needs, wired once at startup.
///
/// This struct is cheaply cloneable via `Arc`. The cart is loaded and any
/// persisted session restored before [`AppContext::open`] returns.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<AppContextInner>,
}

struct AppContextInner {
    cart: CartStore,
    catalog: CatalogClient,
    identity: Option<IdentityClient>,
}

impl AppContext {
    /// Compose the application from configuration.
    ///
    /// Storage falls back to memory when the configured backend cannot be
    /// opened; see [`storage::open`].
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client fails to build.
    pub async fn open(config: &ClientConfig) -> Result<Self, ContextError> {
        let storage = storage::open(&config.storage).await;
        Self::with_storage(config, storage).await
    }

    /// Compose the application over an already opened store.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client fails to build.
    pub async fn with_storage(
        config: &ClientConfig,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ContextError> {
        let catalog = CatalogClient::new(&config.catalog)?;
        let identity = config
            .identity
            .as_ref()
            .map(|identity| IdentityClient::new(identity, Arc::clone(&storage)))
            .transpose()?;

        let cart = CartStore::open(storage).await;
        if let Some(identity) = &identity
            && let Some(user) = identity.restore_session().await
        {
            info!(email = %user.email, "Signed in from previous session");
        }

        Ok(Self {
            inner: Arc::new(AppContextInner {
                cart,
                catalog,
                identity,
            }),
        })
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    /// Get a reference to the catalog client.
    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// Get a reference to the identity client.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` when identity is not configured.
    pub fn identity(&self) -> Result<&IdentityClient, ConfigError> {
        self.inner
            .identity
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("TOTE_IDENTITY_API_KEY".to_string()))
    }
}
