//! Integration tests for cart persistence over the file store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use tote_client::AppContext;
use tote_client::cart::{CART_STORAGE_KEY, CartLineItem, CartPhase, CartStore};
use tote_client::catalog::Product;
use tote_client::config::{ClientConfig, IdentityConfig};
use tote_client::storage::{self, FileStore, KeyValueStore, StorageBackend};
use tote_core::{Price, ProductId};
use tote_integration_tests::{catalog_config, scratch_dir};

fn product(id: i64, title: &str, cents: i64) -> Product {
    Product {
        id: ProductId::new(id),
        title: title.to_string(),
        price: Price::from_cents(cents),
        description: String::new(),
        category: "misc".to_string(),
        image: format!("https://img.example.com/{id}.png"),
        rating: None,
    }
}

async fn file_store(dir: &std::path::Path) -> Arc<dyn KeyValueStore> {
    Arc::new(FileStore::open(dir).await.unwrap())
}

#[tokio::test]
async fn test_cart_survives_restart() {
    let dir = scratch_dir("restart");

    let store = CartStore::open(file_store(&dir).await).await;
    for _ in 0..3 {
        store.add_to_cart(&product(5, "Mug", 899)).unwrap();
    }
    store.add_to_cart(&product(6, "Tea", 450)).unwrap();
    store.remove_from_cart(ProductId::new(6)).unwrap();
    store.flush().await;
    drop(store);

    let restarted = CartStore::open(file_store(&dir).await).await;
    assert_eq!(restarted.phase(), CartPhase::Ready);
    let items = restarted.items();
    assert_eq!(items.len(), 1);
    let mug = items.first().unwrap();
    assert_eq!(mug.id, ProductId::new(5));
    assert_eq!(mug.quantity, 3);
    assert_eq!(mug.title, "Mug");
    assert_eq!(restarted.total_price(), Price::from_cents(2697));

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn test_clear_then_restart_is_empty() {
    let dir = scratch_dir("clear");

    let store = CartStore::open(file_store(&dir).await).await;
    store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();
    store.clear_cart().unwrap();
    store.flush().await;

    assert!(!dir.join(format!("{CART_STORAGE_KEY}.json")).exists());

    let restarted = CartStore::open(file_store(&dir).await).await;
    assert!(restarted.items().is_empty());

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn test_snapshot_written_by_hand_is_loaded() {
    let dir = scratch_dir("handwritten");
    let storage = file_store(&dir).await;
    storage
        .set(
            CART_STORAGE_KEY,
            r#"[{"id":1,"title":"Shirt","price":20.0,"image":"u","quantity":2}]"#.to_string(),
        )
        .await
        .unwrap();

    let store = CartStore::open(storage).await;
    assert_eq!(
        store.items(),
        vec![CartLineItem {
            id: ProductId::new(1),
            title: "Shirt".to_string(),
            price: Price::from_cents(2000),
            image: "u".to_string(),
            quantity: 2,
        }]
    );
    assert_eq!(store.total_items(), 2);

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn test_app_context_over_file_storage() {
    let dir = scratch_dir("context");
    let config = ClientConfig {
        storage: StorageBackend::File(dir.clone()),
        catalog: catalog_config("http://127.0.0.1:9"),
        identity: None::<IdentityConfig>,
        sentry_dsn: None,
        sentry_environment: None,
    };

    let context = AppContext::open(&config).await.unwrap();
    context.cart().add_to_cart(&product(2, "Hat", 1500)).unwrap();
    context.cart().flush().await;
    drop(context);

    let storage = storage::open(&config.storage).await;
    assert!(storage.get(CART_STORAGE_KEY).await.unwrap().is_some());

    let reopened = AppContext::open(&config).await.unwrap();
    assert_eq!(reopened.cart().total_items(), 1);

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}
