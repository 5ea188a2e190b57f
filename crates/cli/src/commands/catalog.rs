//! Catalog browsing commands.

use tote_client::AppContext;
use tote_client::catalog::{CategoryFilter, ProductFilter, display_category};
use tote_core::ProductId;
use tracing::info;

/// List products, optionally narrowed by category and title search.
pub async fn list(
    context: &AppContext,
    category: Option<&str>,
    search: Option<String>,
) -> tote_client::Result<()> {
    let products = context.catalog().list_products().await?;
    let filter = ProductFilter::new(CategoryFilter::parse(category.unwrap_or_default()), search);
    let matching = filter.apply(&products);

    if matching.is_empty() {
        info!("No products found");
        return Ok(());
    }

    for product in &matching {
        info!(
            "{:>4}  {:<10}  {}  [{}]",
            product.id.as_i64(),
            product.price.to_string(),
            product.title,
            display_category(&product.category)
        );
    }
    info!("{} of {} products", matching.len(), products.len());
    Ok(())
}

/// Show one product in full.
pub async fn show(context: &AppContext, id: ProductId) -> tote_client::Result<()> {
    let product = context.catalog().get_product(id).await?;

    info!("{}", product.title);
    info!("  Price:    {}", product.price);
    info!("  Category: {}", display_category(&product.category));
    if let Some(rating) = product.rating {
        info!("  Rating:   {:.1} ({} reviews)", rating.rate, rating.count);
    }
    info!("  Image:    {}", product.image);
    if !product.description.is_empty() {
        info!("");
        info!("{}", product.description);
    }

    let in_cart = context
        .cart()
        .snapshot()
        .get(id)
        .map_or(0, |item| item.quantity);
    if in_cart > 0 {
        info!("");
        info!("In your cart: {in_cart}");
    }
    Ok(())
}

/// List the category selectors accepted by `products --category`.
pub async fn categories(context: &AppContext) -> tote_client::Result<()> {
    let categories = context.catalog().list_categories().await?;

    info!("all  (All)");
    for category in categories {
        info!("{category}  ({})", display_category(&category));
    }
    Ok(())
}
