//! Client-side product filtering for catalog listings.

use super::types::Product;

/// Which categories a listing shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    /// Every category.
    #[default]
    All,
    /// Exactly this category name.
    Named(String),
}

impl CategoryFilter {
    /// Parse a user-facing selector; `"all"` (any case) or blank means every category.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Named(value.to_string())
        }
    }

    fn matches(&self, product: &Product) -> bool {
        match self {
            Self::All => true,
            Self::Named(name) => product.category == *name,
        }
    }
}

/// Category plus free-text search over titles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: CategoryFilter,
    pub query: Option<String>,
}

impl ProductFilter {
    /// Create a filter.
    #[must_use]
    pub fn new(category: CategoryFilter, query: Option<String>) -> Self {
        Self {
            category,
            query: query.filter(|q| !q.trim().is_empty()),
        }
    }

    /// Whether `product` passes both the category and search conditions.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if !self.category.matches(product) {
            return false;
        }
        self.query.as_ref().is_none_or(|query| {
            product
                .title
                .to_lowercase()
                .contains(&query.trim().to_lowercase())
        })
    }

    /// Products passing the filter, in their original order.
    #[must_use]
    pub fn apply<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        products.iter().filter(|p| self.matches(p)).collect()
    }
}

/// Category name with its first character upper-cased, for display.
#[must_use]
pub fn display_category(category: &str) -> String {
    let mut chars = category.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
