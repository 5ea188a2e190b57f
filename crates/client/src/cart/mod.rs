//! Shopping cart.
//!
//! [`CartState`] is a plain value with a pure reducer; [`CartStore`] owns the
//! live state, gates commands on the initial load, and mirrors every change
//! into the key-value store through a single ordered writer.
//!
//! # Invariants
//!
//! - At most one [`CartLineItem`] per product id
//! - Every item present has `quantity >= 1`
//! - Line items keep the title, price and image captured when first added

mod checkout;
mod store;

pub use checkout::{OrderLine, OrderSummary};
pub use store::{CART_STORAGE_KEY, CartError, CartPhase, CartStore};

use serde::{Deserialize, Serialize};
use tote_core::{Price, ProductId};

use crate::catalog::Product;

/// One distinct product held in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub id: ProductId,
    pub title: String,
    pub price: Price,
    pub image: String,
    pub quantity: u32,
}

impl CartLineItem {
    /// A single unit of `product`, copying its display attributes.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id,
            title: product.title.clone(),
            price: product.price,
            image: product.image.clone(),
            quantity: 1,
        }
    }

    /// `price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// A change to the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Replace the items wholesale with a persisted snapshot.
    Load(Vec<CartLineItem>),
    /// Add one unit; the item's own quantity is ignored.
    Add(CartLineItem),
    /// Set a quantity; zero or below removes the item.
    UpdateQuantity { id: ProductId, quantity: i64 },
    /// Remove the item regardless of quantity.
    Remove(ProductId),
    /// Remove everything.
    Clear,
}

/// What an action requires of the persisted snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Persistence {
    /// Nothing; the state came from storage.
    None,
    /// Write the resulting item list.
    Write,
    /// Delete the stored key.
    Remove,
}

impl CartAction {
    pub(crate) const fn persistence(&self) -> Persistence {
        match self {
            Self::Load(_) => Persistence::None,
            Self::Add(_) | Self::UpdateQuantity { .. } | Self::Remove(_) => Persistence::Write,
            Self::Clear => Persistence::Remove,
        }
    }
}

/// The cart's contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartState {
    items: Vec<CartLineItem>,
}

impl CartState {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from a persisted snapshot.
    ///
    /// Snapshots written by this crate already satisfy the invariants; anything
    /// else is repaired: zero quantities are dropped and for duplicate ids the
    /// first occurrence wins.
    #[must_use]
    pub fn from_snapshot(items: Vec<CartLineItem>) -> Self {
        let before = items.len();
        let mut normalized: Vec<CartLineItem> = Vec::with_capacity(before);
        for item in items {
            if item.quantity > 0 && !normalized.iter().any(|kept| kept.id == item.id) {
                normalized.push(item);
            }
        }
        if normalized.len() != before {
            tracing::warn!(
                dropped = before - normalized.len(),
                "Dropped invalid entries from persisted cart"
            );
        }
        Self { items: normalized }
    }

    /// Apply `action`, returning the resulting cart.
    #[must_use]
    pub fn reduce(self, action: CartAction) -> Self {
        let mut items = self.items;
        match action {
            CartAction::Load(snapshot) => return Self::from_snapshot(snapshot),
            CartAction::Add(item) => {
                if let Some(existing) = items.iter_mut().find(|i| i.id == item.id) {
                    existing.quantity = existing.quantity.saturating_add(1);
                } else {
                    items.push(CartLineItem { quantity: 1, ..item });
                }
            }
            CartAction::UpdateQuantity { id, quantity } => {
                if quantity <= 0 {
                    items.retain(|i| i.id != id);
                } else if let Some(existing) = items.iter_mut().find(|i| i.id == id) {
                    existing.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
                }
            }
            CartAction::Remove(id) => items.retain(|i| i.id != id),
            CartAction::Clear => items.clear(),
        }
        Self { items }
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// The line item for `id`, if present.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of `price * quantity` over all items.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    /// Sum of quantities over all items.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use tote_core::{Price, ProductId};

    use crate::catalog::Product;

    pub fn product(id: i64, title: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            title: title.to_string(),
            price: Price::from_cents(cents),
            description: String::new(),
            category: "misc".to_string(),
            image: format!("u{id}"),
            rating: None,
        }
    }
}
