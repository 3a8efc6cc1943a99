//! AI-path item validation
//!
//! The AI-assisted OCR endpoint ships pre-parsed items. These checks
//! attach advisory flags instead of rejecting lines; the regex path
//! never carries validation flags because its patterns already enforce
//! shape.

use crate::models::{AiValidationFlag, Category, RawOcrItem};

/// Validation thresholds
#[derive(Debug, Clone)]
pub struct ItemValidationConfig {
    /// Unit prices at or above this are suspect on a receipt line
    pub unit_price_ceiling: f64,
    /// Quantities above this are suspect
    pub quantity_ceiling: f64,
    /// Allowed difference between total and quantity x unit price
    pub total_tolerance: f64,
    /// Minimum trimmed description length
    pub min_description_len: usize,
}

impl Default for ItemValidationConfig {
    fn default() -> Self {
        Self {
            unit_price_ceiling: 1000.0,
            quantity_ceiling: 50.0,
            total_tolerance: 0.05,
            min_description_len: 3,
        }
    }
}

/// Check one pre-parsed item against the thresholds and the registry
///
/// Flag order is stable: price, quantity, description, category, total.
pub fn validate_item(
    item: &RawOcrItem,
    categories: &[Category],
    config: &ItemValidationConfig,
) -> Vec<AiValidationFlag> {
    let mut flags = Vec::new();

    if item.unit_price <= 0.0 || item.unit_price >= config.unit_price_ceiling {
        flags.push(AiValidationFlag::PriceSuspicious);
    }
    if item.quantity <= 0.0 || item.quantity > config.quantity_ceiling {
        flags.push(AiValidationFlag::QuantityUnusual);
    }
    if item.description.trim().chars().count() < config.min_description_len {
        flags.push(AiValidationFlag::DescriptionUnclear);
    }
    if let Some(suggested) = &item.suggested_category {
        if !categories.iter().any(|c| c.name == suggested.trim()) {
            flags.push(AiValidationFlag::CategoryMismatch);
        }
    }
    if (item.total - item.quantity * item.unit_price).abs() > config.total_tolerance {
        flags.push(AiValidationFlag::TotalCalculationError);
    }

    flags
}
