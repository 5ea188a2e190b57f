//! Order summaries produced at checkout.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tote_core::{Price, ProductId};

use super::{CartLineItem, CartState};

/// One line of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub id: ProductId,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Price,
    pub line_total: Price,
}

impl From<&CartLineItem> for OrderLine {
    fn from(item: &CartLineItem) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            quantity: item.quantity,
            unit_price: item.price,
            line_total: item.line_total(),
        }
    }
}

impl fmt::Display for OrderLine {
    /// `2 x $20.00 = $40.00`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} x {} = {}",
            self.quantity, self.unit_price, self.line_total
        )
    }
}

/// What was in the cart when the order was placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub lines: Vec<OrderLine>,
    pub total_price: Price,
    pub total_items: u64,
    pub placed_at: DateTime<Utc>,
}

impl OrderSummary {
    pub(crate) fn from_cart(cart: &CartState) -> Self {
        Self {
            lines: cart.items().iter().map(OrderLine::from).collect(),
            total_price: cart.total_price(),
            total_items: cart.total_items(),
            placed_at: Utc::now(),
        }
    }

    /// `Total: $55.00`
    #[must_use]
    pub fn total_line(&self) -> String {
        format!("Total: {}", self.total_price)
    }
}
