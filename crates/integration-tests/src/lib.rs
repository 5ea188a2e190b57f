//! Integration tests for Tote.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tote-integration-tests
//! ```
//!
//! No external services are needed: each test stands up fake catalog and
//! identity services on an ephemeral local port and points the real clients
//! at them.
//!
//! # Test Categories
//!
//! - `catalog_client` - Catalog reads, caching, and status mapping
//! - `identity_client` - Sign-in, sign-up, and session persistence
//! - `cart_persistence` - Cart restart round-trips over the file store

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use secrecy::SecretString;
use serde_json::{Value, json};
use tote_client::config::{CatalogConfig, IdentityConfig};

/// API key the fake identity service accepts.
pub const TEST_API_KEY: &str = "test-api-key";

/// Serve `router` on an ephemeral local port and return its base URL.
///
/// # Panics
///
/// Panics if the listener cannot be bound.
#[allow(clippy::unwrap_used)]
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

/// Catalog configuration pointing at a fake service.
#[must_use]
pub fn catalog_config(base_url: &str) -> CatalogConfig {
    CatalogConfig {
        base_url: base_url.to_string(),
        cache_ttl: Duration::from_secs(60),
    }
}

/// Identity configuration pointing both endpoints at a fake service.
#[must_use]
pub fn identity_config(base_url: &str, project_id: &str) -> IdentityConfig {
    IdentityConfig {
        auth_url: base_url.to_string(),
        documents_url: base_url.to_string(),
        ..IdentityConfig::new(SecretString::from(TEST_API_KEY), project_id)
    }
}

/// A fresh, not yet created directory under the system temp dir.
#[must_use]
pub fn scratch_dir(name: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("tote-it-{name}-{}-{n}", std::process::id()))
}

/// Three catalog records in the demo service's shape.
#[must_use]
pub fn sample_products() -> Value {
    json!([
        {
            "id": 1,
            "title": "Fjallraven Foldsack No. 1 Backpack",
            "price": 109.95,
            "description": "Your perfect pack for everyday use.",
            "category": "men's clothing",
            "image": "https://fakestoreapi.com/img/81fPKd-2AYL._AC_SL1500_.jpg",
            "rating": { "rate": 3.9, "count": 120 }
        },
        {
            "id": 9,
            "title": "WD 2TB Elements Portable External Hard Drive",
            "price": 64,
            "description": "USB 3.0 and USB 2.0 compatibility.",
            "category": "electronics",
            "image": "https://fakestoreapi.com/img/61IBBVJvSDL._AC_SY879_.jpg",
            "rating": { "rate": 3.3, "count": 203 }
        },
        {
            "id": 10,
            "title": "SanDisk SSD PLUS 1TB Internal SSD",
            "price": 109,
            "description": "Easy upgrade for faster boot up.",
            "category": "electronics",
            "image": "https://fakestoreapi.com/img/61U7T1koQqL._AC_SX679_.jpg",
            "rating": { "rate": 2.9, "count": 470 }
        }
    ])
}
