//! Category registry and name resolution
//!
//! The registry is an external collaborator; the core only reads it.
//! Free-text category suggestions from the OCR layer resolve to a
//! registered id, falling back to the "Uncategorized" category.

use tracing::warn;

use crate::error::Result;
use crate::models::Category;

/// Identifier of the fallback category
pub const UNCATEGORIZED_ID: &str = "uncategorized";

/// Display name of the fallback category; every registry must contain it
pub const UNCATEGORIZED_NAME: &str = "Uncategorized";

/// Read-only source of registered categories
pub trait CategoryRegistry {
    /// All registered categories
    fn list(&self) -> Result<Vec<Category>>;
}

/// Fixed in-memory registry
pub struct StaticCategoryRegistry {
    categories: Vec<Category>,
}

impl StaticCategoryRegistry {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Registry seeded with the default category set
    pub fn with_defaults() -> Self {
        Self::new(default_categories())
    }
}

impl CategoryRegistry for StaticCategoryRegistry {
    fn list(&self) -> Result<Vec<Category>> {
        Ok(self.categories.clone())
    }
}

/// Default category set installed for new users
pub fn default_categories() -> Vec<Category> {
    let seed: [(&str, &str, &str); 8] = [
        ("Groceries", "🛒", "Regular food shopping"),
        ("Dining", "🍽️", "Restaurants and takeout"),
        ("Transport", "🚗", "Gas, public transit, ride-sharing"),
        ("Entertainment", "🎬", "Movies, games, hobbies"),
        ("Shopping", "🛍️", "Clothing, general purchases"),
        ("Health", "🏥", "Medical, pharmacy, fitness"),
        ("Utilities", "💡", "Bills, internet, phone"),
        (UNCATEGORIZED_NAME, "📦", "Everything else"),
    ];

    seed.iter()
        .map(|(name, icon, description)| Category {
            id: name.to_lowercase(),
            name: name.to_string(),
            icon: Some(icon.to_string()),
            description: Some(description.to_string()),
        })
        .collect()
}

/// Resolve a category display name against a registry snapshot
///
/// Exact name match wins; anything else resolves to the "Uncategorized"
/// category's id. Never fails: a registry missing the fallback entry
/// still yields the well-known id.
pub fn resolve_category_id(name: &str, categories: &[Category]) -> String {
    let trimmed = name.trim();
    if let Some(category) = categories.iter().find(|c| c.name == trimmed) {
        return category.id.clone();
    }

    match categories.iter().find(|c| c.name == UNCATEGORIZED_NAME) {
        Some(fallback) => fallback.id.clone(),
        None => {
            warn!("registry has no Uncategorized entry, using the well-known id");
            UNCATEGORIZED_ID.to_string()
        }
    }
}
