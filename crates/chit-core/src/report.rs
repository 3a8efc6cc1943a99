//! Weekly spending reports
//!
//! Aggregates one calendar week of receipts into totals, counts, and
//! a short list of rule-based highlights for the report page.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{Duration, NaiveDate};

use crate::models::{
    round2, Category, HighlightKind, Receipt, WeeklyHighlight, WeeklyReport,
};

/// Build the report for the week starting at `week_start`
///
/// The window covers `week_start` through `week_start + 6` inclusive.
/// `categories` supplies display names for the top-category highlight.
pub fn build_weekly_report(
    receipts: &[Receipt],
    categories: &[Category],
    week_start: NaiveDate,
) -> WeeklyReport {
    let week_end = week_start + Duration::days(6);

    let mut in_week: Vec<Receipt> = receipts
        .iter()
        .filter(|r| r.date >= week_start && r.date <= week_end)
        .cloned()
        .collect();
    in_week.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));

    let total_spent = round2(in_week.iter().map(|r| r.total).sum::<f64>());
    let anomalies_count = in_week
        .iter()
        .filter(|r| !r.anomaly_flags.is_empty())
        .count();
    let highlights = build_highlights(&in_week, categories, total_spent, anomalies_count);

    WeeklyReport {
        week_start,
        week_end,
        total_spent,
        receipt_count: in_week.len(),
        anomalies_count,
        highlights,
        receipts: in_week,
    }
}

fn build_highlights(
    receipts: &[Receipt],
    categories: &[Category],
    total_spent: f64,
    anomalies_count: usize,
) -> Vec<WeeklyHighlight> {
    let mut highlights = Vec::new();
    if receipts.is_empty() {
        return highlights;
    }

    if anomalies_count > 0 {
        highlights.push(WeeklyHighlight {
            title: "Receipts need review".to_string(),
            description: format!(
                "{} of {} receipts this week carry anomaly flags",
                anomalies_count,
                receipts.len()
            ),
            kind: HighlightKind::Warning,
        });
    }

    if total_spent > 0.0 {
        if let Some((category_id, category_total)) = top_category(receipts) {
            let name = categories
                .iter()
                .find(|c| c.id == category_id)
                .map(|c| c.name.clone())
                .unwrap_or(category_id);
            let share = category_total / total_spent * 100.0;
            highlights.push(WeeklyHighlight {
                title: format!("Most spent on {}", name),
                description: format!(
                    "{:.2} this week, {:.0}% of your spending",
                    category_total, share
                ),
                kind: HighlightKind::Info,
            });
        }
    }

    if let Some(largest) = receipts
        .iter()
        .max_by(|a, b| a.total.partial_cmp(&b.total).unwrap_or(Ordering::Equal))
    {
        highlights.push(WeeklyHighlight {
            title: "Largest receipt".to_string(),
            description: format!(
                "{} on {} for {:.2}",
                largest.store, largest.date, largest.total
            ),
            kind: HighlightKind::Info,
        });
    }

    if anomalies_count == 0 {
        highlights.push(WeeklyHighlight {
            title: "All receipts look clean".to_string(),
            description: format!(
                "{} receipts processed with no anomalies",
                receipts.len()
            ),
            kind: HighlightKind::Success,
        });
    }

    highlights
}

/// Category with the largest item spend across the week
fn top_category(receipts: &[Receipt]) -> Option<(String, f64)> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for receipt in receipts {
        for item in &receipt.items {
            *totals.entry(item.category_id.as_str()).or_insert(0.0) += item.total;
        }
    }
    totals
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        .map(|(id, total)| (id.to_string(), round2(total)))
}
