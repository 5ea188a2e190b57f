//! Domain types for the product catalog.
//!
//! These mirror the catalog service's JSON records. Only `id`, `title`,
//! `price` and `image` are required; the remaining fields default when the
//! service omits them.

use serde::{Deserialize, Serialize};
use tote_core::{Price, ProductId};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog primary key.
    pub id: ProductId,
    /// Display title.
    pub title: String,
    /// Unit price.
    pub price: Price,
    /// Long-form description.
    #[serde(default)]
    pub description: String,
    /// Category name as published by the catalog (e.g., "electronics").
    #[serde(default)]
    pub category: String,
    /// Image URL.
    pub image: String,
    /// Aggregate customer rating, when the catalog has one.
    #[serde(default)]
    pub rating: Option<Rating>,
}

/// Customer rating summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    /// Average rating (e.g., 3.9).
    pub rate: f64,
    /// Number of ratings.
    pub count: u32,
}
