//! Cart and checkout commands.

use tote_client::AppContext;
use tote_core::ProductId;
use tracing::info;

/// Print the cart contents and totals.
pub fn show(context: &AppContext) {
    let cart = context.cart().snapshot();
    if cart.is_empty() {
        info!("Your cart is empty");
        return;
    }

    for item in cart.items() {
        info!(
            "{:>4}  {} x {}  {}  = {}",
            item.id.as_i64(),
            item.quantity,
            item.price,
            item.title,
            item.line_total()
        );
    }
    info!("Items: {}", cart.total_items());
    info!("Total: {}", cart.total_price());
}

/// Add one unit of the product with `id`.
pub async fn add(context: &AppContext, id: ProductId) -> tote_client::Result<()> {
    let product = context.catalog().get_product(id).await?;
    context.cart().add_to_cart(&product)?;

    let quantity = context
        .cart()
        .snapshot()
        .get(id)
        .map_or(0, |item| item.quantity);
    info!("Added {} to cart (now {quantity})", product.title);
    Ok(())
}

/// Set the quantity for `id`; zero or below removes it.
pub fn set(context: &AppContext, id: ProductId, quantity: i64) -> tote_client::Result<()> {
    let in_cart = context.cart().snapshot().get(id).is_some();

    context.cart().update_quantity(id, quantity)?;
    if !in_cart {
        info!("Product {id} is not in your cart");
    } else if quantity <= 0 {
        info!("Removed product {id} from cart");
    } else {
        info!("Set product {id} quantity to {quantity}");
    }
    Ok(())
}

/// Remove `id` from the cart.
pub fn remove(context: &AppContext, id: ProductId) -> tote_client::Result<()> {
    context.cart().remove_from_cart(id)?;
    info!("Removed product {id} from cart");
    Ok(())
}

/// Empty the cart.
pub fn clear(context: &AppContext) -> tote_client::Result<()> {
    context.cart().clear_cart()?;
    info!("Cart cleared");
    Ok(())
}

/// Place the order and empty the cart.
pub fn checkout(context: &AppContext) -> tote_client::Result<()> {
    let summary = context.cart().checkout()?;

    info!("Order summary");
    for line in &summary.lines {
        info!("  {}  {line}", line.title);
    }
    info!("{}", summary.total_line());
    info!("");
    info!("Your order has been placed successfully!");
    Ok(())
}
