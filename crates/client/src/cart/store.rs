//! The live cart and its persistence mirror.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --load()--> Loading --snapshot read--> Ready
//! ```
//!
//! Mutation commands are rejected until the store is `Ready`, so nothing the
//! user does can be overwritten by a late-arriving snapshot.
//!
//! # Persistence
//!
//! Every command updates memory synchronously, then enqueues the resulting
//! snapshot (or, for clear, a key removal) on a channel drained by a single
//! background writer. Enqueueing happens under the state lock, so storage
//! sees writes in exactly the order memory changed. Write failures are
//! logged and dropped; memory stays authoritative for the session.

use core::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tote_core::{Price, ProductId};
use tracing::{debug, error, info, instrument, warn};

use super::checkout::OrderSummary;
use super::{CartAction, CartLineItem, CartState, Persistence};
use crate::catalog::Product;
use crate::error::add_breadcrumb;
use crate::storage::KeyValueStore;

/// Storage key holding the JSON array of line items.
pub const CART_STORAGE_KEY: &str = "cart";

/// Where the store is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartPhase {
    Uninitialized,
    Loading,
    Ready,
}

impl fmt::Display for CartPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
        })
    }
}

/// Errors returned by cart commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// A mutation arrived before the persisted cart finished loading.
    #[error("cart is not ready (currently {0})")]
    NotReady(CartPhase),

    /// `load()` was called while another load was running.
    #[error("cart is already loading")]
    LoadInProgress,

    /// Checkout needs at least one item.
    #[error("cart is empty")]
    EmptyCart,
}

enum PersistOp {
    Write(String),
    Remove,
    Flush(oneshot::Sender<()>),
}

/// Single source of truth for cart contents.
///
/// Cheap to clone; clones share the same state and writer.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    shared: Mutex<Shared>,
}

struct Shared {
    phase: CartPhase,
    cart: CartState,
    writer: Option<mpsc::UnboundedSender<PersistOp>>,
}

impl Shared {
    /// Reduce `action` into the cart and enqueue the matching storage change.
    fn apply(&mut self, action: CartAction) {
        let persistence = action.persistence();
        self.cart = std::mem::take(&mut self.cart).reduce(action);

        let op = match persistence {
            Persistence::None => return,
            Persistence::Remove => PersistOp::Remove,
            Persistence::Write => match serde_json::to_string(&self.cart) {
                Ok(json) => PersistOp::Write(json),
                Err(e) => {
                    error!(error = %e, "Failed to serialize cart");
                    return;
                }
            },
        };

        let sent = self
            .writer
            .as_ref()
            .is_some_and(|writer| writer.send(op).is_ok());
        if !sent {
            warn!("Cart writer is not running; change kept in memory only");
        }
    }
}

/// Puts the phase back to `Uninitialized` if a load is dropped mid-read, so a
/// cancelled load can be retried.
struct LoadGuard<'a> {
    shared: &'a Mutex<Shared>,
    completed: bool,
}

impl LoadGuard<'_> {
    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let mut shared = self.shared.lock();
        if shared.phase == CartPhase::Loading {
            warn!("Cart load cancelled before the snapshot was read");
            shared.phase = CartPhase::Uninitialized;
        }
    }
}

impl CartStore {
    /// Create an unloaded store over `storage`.
    ///
    /// Call [`CartStore::load`] before issuing commands.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(CartStoreInner {
                storage,
                key: CART_STORAGE_KEY.to_string(),
                shared: Mutex::new(Shared {
                    phase: CartPhase::Uninitialized,
                    cart: CartState::new(),
                    writer: None,
                }),
            }),
        }
    }

    /// Create a store and wait for its persisted cart to load.
    pub async fn open(storage: Arc<dyn KeyValueStore>) -> Self {
        let store = Self::new(storage);
        // A fresh store is Uninitialized, so load cannot report LoadInProgress.
        if let Err(e) = store.load().await {
            warn!(error = %e, "Cart load skipped");
        }
        store
    }

    /// Load the persisted cart and start the writer.
    ///
    /// A missing, unreadable, or unparseable snapshot leaves the cart empty;
    /// the failure is logged, not returned. Loading an already `Ready` store
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LoadInProgress` if another load is running.
    #[instrument(skip(self), fields(key = %self.inner.key))]
    pub async fn load(&self) -> Result<(), CartError> {
        {
            let mut shared = self.inner.shared.lock();
            match shared.phase {
                CartPhase::Ready => {
                    debug!("Cart already loaded");
                    return Ok(());
                }
                CartPhase::Loading => return Err(CartError::LoadInProgress),
                CartPhase::Uninitialized => shared.phase = CartPhase::Loading,
            }
        }
        let guard = LoadGuard {
            shared: &self.inner.shared,
            completed: false,
        };

        let snapshot = self.read_snapshot().await;
        let writer = spawn_writer(Arc::clone(&self.inner.storage), self.inner.key.clone());

        let mut shared = self.inner.shared.lock();
        shared.apply(CartAction::Load(snapshot));
        shared.writer = Some(writer);
        shared.phase = CartPhase::Ready;
        guard.complete();
        info!(
            items = shared.cart.items().len(),
            total_items = shared.cart.total_items(),
            "Cart loaded"
        );
        Ok(())
    }

    async fn read_snapshot(&self) -> Vec<CartLineItem> {
        let raw = match self.inner.storage.get(&self.inner.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!(error = %e, "Error loading cart");
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            error!(error = %e, "Error parsing persisted cart");
            Vec::new()
        })
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> CartPhase {
        self.inner.shared.lock().phase
    }

    fn dispatch(&self, action: CartAction) -> Result<(), CartError> {
        let mut shared = self.inner.shared.lock();
        if shared.phase != CartPhase::Ready {
            return Err(CartError::NotReady(shared.phase));
        }
        shared.apply(action);
        Ok(())
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Add one unit of `product`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotReady` before the cart has loaded.
    pub fn add_to_cart(&self, product: &Product) -> Result<(), CartError> {
        self.dispatch(CartAction::Add(CartLineItem::from_product(product)))?;
        add_breadcrumb(
            "cart",
            "Added product to cart",
            Some(&[("product_id", &product.id.to_string())]),
        );
        Ok(())
    }

    /// Set the quantity of `id`; zero or below removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotReady` before the cart has loaded.
    pub fn update_quantity(&self, id: ProductId, quantity: i64) -> Result<(), CartError> {
        self.dispatch(CartAction::UpdateQuantity { id, quantity })
    }

    /// Remove `id` regardless of quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotReady` before the cart has loaded.
    pub fn remove_from_cart(&self, id: ProductId) -> Result<(), CartError> {
        self.dispatch(CartAction::Remove(id))
    }

    /// Empty the cart and delete the persisted snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotReady` before the cart has loaded.
    pub fn clear_cart(&self) -> Result<(), CartError> {
        self.dispatch(CartAction::Clear)?;
        add_breadcrumb("cart", "Cleared cart", None);
        Ok(())
    }

    /// Place the order: summarize the cart, then clear it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotReady` before the cart has loaded and
    /// `CartError::EmptyCart` when there is nothing to check out.
    pub fn checkout(&self) -> Result<OrderSummary, CartError> {
        let mut shared = self.inner.shared.lock();
        if shared.phase != CartPhase::Ready {
            return Err(CartError::NotReady(shared.phase));
        }
        if shared.cart.is_empty() {
            return Err(CartError::EmptyCart);
        }

        let summary = OrderSummary::from_cart(&shared.cart);
        shared.apply(CartAction::Clear);
        drop(shared);

        info!(
            total = %summary.total_price,
            total_items = summary.total_items,
            "Order placed"
        );
        add_breadcrumb("cart", "Checked out", None);
        Ok(summary)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// A copy of the current cart.
    #[must_use]
    pub fn snapshot(&self) -> CartState {
        self.inner.shared.lock().cart.clone()
    }

    /// Current line items.
    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        self.inner.shared.lock().cart.items().to_vec()
    }

    /// Sum of `price * quantity` over all items.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.inner.shared.lock().cart.total_price()
    }

    /// Sum of quantities over all items.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.inner.shared.lock().cart.total_items()
    }

    /// Wait until every change made before this call has reached storage.
    ///
    /// Returns immediately on a store that never loaded.
    pub async fn flush(&self) {
        let done = {
            let shared = self.inner.shared.lock();
            let Some(writer) = shared.writer.as_ref() else {
                return;
            };
            let (tx, rx) = oneshot::channel();
            if writer.send(PersistOp::Flush(tx)).is_err() {
                return;
            }
            rx
        };
        let _ = done.await;
    }
}

/// Start the background task that applies storage changes in order.
fn spawn_writer(storage: Arc<dyn KeyValueStore>, key: String) -> mpsc::UnboundedSender<PersistOp> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(op) = rx.recv().await {
            match op {
                PersistOp::Write(json) => {
                    if let Err(e) = storage.set(&key, json).await {
                        warn!(error = %e, "Failed to persist cart");
                    }
                }
                PersistOp::Remove => {
                    if let Err(e) = storage.remove(&key).await {
                        warn!(error = %e, "Failed to remove persisted cart");
                    }
                }
                PersistOp::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Cart writer stopped");
    });

    tx
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::super::test_support::product;
    use super::*;
    use crate::storage::{MemoryStore, StorageError};

    async fn open_on(storage: &MemoryStore) -> CartStore {
        CartStore::open(Arc::new(storage.clone())).await
    }

    async fn stored_cart(storage: &MemoryStore) -> Option<String> {
        storage.get(CART_STORAGE_KEY).await.unwrap()
    }

    /// Storage whose every operation fails.
    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable(format!("read {key}")))
        }

        async fn set(&self, key: &str, _value: String) -> Result<(), StorageError> {
            Err(StorageError::Unavailable(format!("write {key}")))
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable(format!("remove {key}")))
        }
    }

    /// Storage whose reads wait until the test opens the gate.
    struct GatedStore {
        gate: parking_lot::Mutex<Option<oneshot::Receiver<()>>>,
        inner: MemoryStore,
    }

    impl GatedStore {
        fn new(inner: MemoryStore) -> (Arc<Self>, oneshot::Sender<()>) {
            let (tx, rx) = oneshot::channel();
            let store = Arc::new(Self {
                gate: parking_lot::Mutex::new(Some(rx)),
                inner,
            });
            (store, tx)
        }
    }

    #[async_trait]
    impl KeyValueStore for GatedStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            let gate = self.gate.lock().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key).await
        }
    }

    async fn wait_for_phase(store: &CartStore, phase: CartPhase) {
        while store.phase() != phase {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_commands_rejected_while_loading() {
        let memory = MemoryStore::new();
        memory
            .set(
                CART_STORAGE_KEY,
                r#"[{"id":1,"title":"Shirt","price":20.0,"image":"u","quantity":2}]"#.to_string(),
            )
            .await
            .unwrap();
        let (storage, open_gate) = GatedStore::new(memory);
        let store = CartStore::new(storage);

        let loading = tokio::spawn({
            let store = store.clone();
            async move { store.load().await }
        });
        wait_for_phase(&store, CartPhase::Loading).await;

        assert_eq!(
            store.add_to_cart(&product(2, "Hat", 1500)),
            Err(CartError::NotReady(CartPhase::Loading))
        );
        assert_eq!(store.checkout(), Err(CartError::NotReady(CartPhase::Loading)));
        assert_eq!(store.load().await, Err(CartError::LoadInProgress));

        open_gate.send(()).unwrap();
        loading.await.unwrap().unwrap();

        assert_eq!(store.phase(), CartPhase::Ready);
        assert_eq!(store.total_items(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_load_can_be_retried() {
        let (storage, _open_gate) = GatedStore::new(MemoryStore::new());
        let store = CartStore::new(storage);

        let loading = tokio::spawn({
            let store = store.clone();
            async move { store.load().await }
        });
        wait_for_phase(&store, CartPhase::Loading).await;
        loading.abort();
        assert!(loading.await.unwrap_err().is_cancelled());

        assert_eq!(store.phase(), CartPhase::Uninitialized);
        assert_eq!(
            store.add_to_cart(&product(1, "Shirt", 2000)),
            Err(CartError::NotReady(CartPhase::Uninitialized))
        );

        // The gate was consumed by the first read, so this load goes straight through.
        store.load().await.unwrap();
        assert_eq!(store.phase(), CartPhase::Ready);
        store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();
        assert_eq!(store.total_items(), 1);
    }

    #[tokio::test]
    async fn test_totals_saturate_on_huge_prices() {
        let storage = MemoryStore::new();
        storage
            .set(
                CART_STORAGE_KEY,
                r#"[{"id":1,"title":"Yacht","price":"79228162514264337593543950335","image":"u","quantity":2}]"#
                    .to_string(),
            )
            .await
            .unwrap();
        let store = open_on(&storage).await;
        let max: Price = serde_json::from_str("\"79228162514264337593543950335\"").unwrap();

        assert_eq!(store.total_items(), 2);
        assert_eq!(store.total_price(), max);
        store.add_to_cart(&product(2, "Hat", 1500)).unwrap();
        assert_eq!(store.total_price(), max);

        let summary = store.checkout().unwrap();
        assert_eq!(summary.total_price, max);
        assert_eq!(summary.lines.first().map(|l| l.line_total), Some(max));
    }

    #[tokio::test]
    async fn test_commands_rejected_before_load() {
        let storage = MemoryStore::new();
        let store = CartStore::new(Arc::new(storage.clone()));

        assert_eq!(store.phase(), CartPhase::Uninitialized);
        assert_eq!(
            store.add_to_cart(&product(1, "Shirt", 2000)),
            Err(CartError::NotReady(CartPhase::Uninitialized))
        );
        assert_eq!(
            store.clear_cart(),
            Err(CartError::NotReady(CartPhase::Uninitialized))
        );
        assert!(store.items().is_empty());

        store.load().await.unwrap();
        assert_eq!(store.phase(), CartPhase::Ready);
        store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();
        assert_eq!(store.total_items(), 1);
    }

    #[tokio::test]
    async fn test_load_is_idempotent_once_ready() {
        let storage = MemoryStore::new();
        let store = open_on(&storage).await;
        store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();

        store.load().await.unwrap();
        assert_eq!(store.total_items(), 1);
    }

    #[tokio::test]
    async fn test_shirt_and_hat_scenario() {
        let storage = MemoryStore::new();
        let store = open_on(&storage).await;

        store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();
        store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();
        store.add_to_cart(&product(2, "Hat", 1500)).unwrap();

        let items = store.items();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items
                .iter()
                .map(|i| (i.id.as_i64(), i.quantity, i.price))
                .collect::<Vec<_>>(),
            vec![
                (1, 2, Price::from_cents(2000)),
                (2, 1, Price::from_cents(1500))
            ]
        );
        assert_eq!(store.total_price(), Price::from_cents(5500));
        assert_eq!(store.total_items(), 3);
    }

    #[tokio::test]
    async fn test_every_mutation_is_persisted() {
        let storage = MemoryStore::new();
        let store = open_on(&storage).await;

        store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();
        store.flush().await;
        let persisted: Vec<CartLineItem> =
            serde_json::from_str(&stored_cart(&storage).await.unwrap()).unwrap();
        assert_eq!(persisted, store.items());

        store.update_quantity(ProductId::new(1), 4).unwrap();
        store.flush().await;
        let persisted: Vec<CartLineItem> =
            serde_json::from_str(&stored_cart(&storage).await.unwrap()).unwrap();
        assert_eq!(persisted.first().map(|i| i.quantity), Some(4));

        store.remove_from_cart(ProductId::new(1)).unwrap();
        store.flush().await;
        assert_eq!(stored_cart(&storage).await.as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_update_quantity_zero_removes() {
        let store = open_on(&MemoryStore::new()).await;
        store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();
        store.update_quantity(ProductId::new(1), 0).unwrap();
        assert!(store.snapshot().get(ProductId::new(1)).is_none());
    }

    #[tokio::test]
    async fn test_remove_twice_leaves_state_unchanged() {
        let store = open_on(&MemoryStore::new()).await;
        store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();
        store.add_to_cart(&product(2, "Hat", 1500)).unwrap();

        store.remove_from_cart(ProductId::new(1)).unwrap();
        let once = store.snapshot();
        store.remove_from_cart(ProductId::new(1)).unwrap();
        assert_eq!(store.snapshot(), once);
    }

    #[tokio::test]
    async fn test_clear_deletes_key_and_reload_is_empty() {
        let storage = MemoryStore::new();
        let store = open_on(&storage).await;
        store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();
        store.flush().await;
        assert!(stored_cart(&storage).await.is_some());

        store.clear_cart().unwrap();
        store.flush().await;
        assert!(stored_cart(&storage).await.is_none());

        let reopened = open_on(&storage).await;
        assert!(reopened.items().is_empty());
    }

    #[tokio::test]
    async fn test_restart_round_trip() {
        let storage = MemoryStore::new();
        let store = open_on(&storage).await;
        for _ in 0..3 {
            store.add_to_cart(&product(5, "Mug", 899)).unwrap();
        }
        store.flush().await;
        drop(store);

        let restarted = open_on(&storage).await;
        let items = restarted.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().map(|i| (i.id, i.quantity)), Some((ProductId::new(5), 3)));
    }

    #[tokio::test]
    async fn test_unparseable_snapshot_starts_empty() {
        let storage = MemoryStore::new();
        storage
            .set(CART_STORAGE_KEY, "{not json".to_string())
            .await
            .unwrap();

        let store = open_on(&storage).await;
        assert_eq!(store.phase(), CartPhase::Ready);
        assert!(store.items().is_empty());
    }

    #[tokio::test]
    async fn test_broken_storage_never_surfaces() {
        let store = CartStore::open(Arc::new(BrokenStore)).await;
        assert_eq!(store.phase(), CartPhase::Ready);

        store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();
        store.clear_cart().unwrap();
        store.add_to_cart(&product(2, "Hat", 1500)).unwrap();
        store.flush().await;

        assert_eq!(store.total_items(), 1);
    }

    #[tokio::test]
    async fn test_rapid_mutations_persist_in_order() {
        let storage = MemoryStore::new();
        let store = open_on(&storage).await;
        store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();
        for quantity in 1..=200 {
            store.update_quantity(ProductId::new(1), quantity).unwrap();
        }
        store.add_to_cart(&product(2, "Hat", 1500)).unwrap();
        store.flush().await;

        let persisted: CartState =
            serde_json::from_str(&stored_cart(&storage).await.unwrap()).unwrap();
        assert_eq!(persisted, store.snapshot());
        assert_eq!(persisted.get(ProductId::new(1)).map(|i| i.quantity), Some(200));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = open_on(&MemoryStore::new()).await;
        let view = store.clone();
        store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();
        assert_eq!(view.total_items(), 1);
    }

    #[tokio::test]
    async fn test_checkout_summarizes_and_clears() {
        let storage = MemoryStore::new();
        let store = open_on(&storage).await;
        store.add_to_cart(&product(1, "Shirt", 2000)).unwrap();
        store.add_to_cart(&product(2, "Hat", 1500)).unwrap();
        store.flush().await;

        let summary = store.checkout().unwrap();
        assert_eq!(summary.total_price, Price::from_cents(3500));
        assert_eq!(summary.total_items, 2);
        assert!(store.items().is_empty());

        store.flush().await;
        assert!(stored_cart(&storage).await.is_none());
    }

    #[tokio::test]
    async fn test_checkout_empty_cart_fails() {
        let store = open_on(&MemoryStore::new()).await;
        assert_eq!(store.checkout(), Err(CartError::EmptyCart));
    }

    #[tokio::test]
    async fn test_flush_on_unloaded_store_returns() {
        let store = CartStore::new(Arc::new(MemoryStore::new()));
        store.flush().await;
        assert_eq!(store.phase(), CartPhase::Uninitialized);
    }
}
