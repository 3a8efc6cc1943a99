//! Monthly budget tracking
//!
//! A budget pairs a category with a monthly limit; progress is the
//! item spend accumulated against it. Limits come from the default
//! table until the user sets their own.

use chrono::{Datelike, NaiveDate};

use crate::models::{round2, Budget, Category, Receipt};

/// Fallback limit for categories without a default of their own
const DEFAULT_MONTHLY_LIMIT: f64 = 200.0;

/// Month key in `YYYY-MM` form
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Default monthly limit for a category, keyed by display name
pub fn default_limit(category_name: &str) -> f64 {
    match category_name {
        "Groceries" => 400.0,
        "Transport" => 200.0,
        "Entertainment" => 150.0,
        "Shopping" => 300.0,
        "Health" => 200.0,
        "Utilities" => 150.0,
        "Dining" => 300.0,
        _ => DEFAULT_MONTHLY_LIMIT,
    }
}

/// One budget per category for `month`, with spend filled in
///
/// Spend sums the item totals of receipts dated inside the month, so a
/// mixed-category receipt splits across budgets the way its items do.
pub fn budget_progress(
    categories: &[Category],
    receipts: &[Receipt],
    month: &str,
) -> Vec<Budget> {
    categories
        .iter()
        .map(|category| {
            let spent = receipts
                .iter()
                .filter(|r| month_key(r.date) == month)
                .flat_map(|r| r.items.iter())
                .filter(|i| i.category_id == category.id)
                .map(|i| i.total)
                .sum::<f64>();
            Budget {
                id: format!("{}-{}", category.id, month),
                category_id: category.id.clone(),
                category_name: category.name.clone(),
                limit: default_limit(&category.name),
                spent: round2(spent),
                month: month.to_string(),
            }
        })
        .collect()
}
