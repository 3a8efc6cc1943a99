//! Line-item parsing
//!
//! Scans OCR text line by line, rejects non-product lines with a noise
//! filter, and extracts description/quantity/price from the survivors
//! using an ordered list of layout matchers. Receipts from different
//! regions place quantity, unit price, and totals in incompatible
//! positions, so the most constrained layout is tried first and the
//! first match wins. Lines matching nothing are dropped without error.

use regex::{Captures, Regex};
use tracing::debug;

use crate::extract::parse_amount;
use crate::models::{round2, ReceiptItem};

/// How many lines a matcher may scan backward for a description
const DESCRIPTION_LOOKBACK: usize = 2;

/// Rejects lines that cannot be product lines
///
/// Applied before every pattern attempt and again when a matcher scans
/// backward for a description.
pub struct NoiseFilter {
    /// Totals, headers, and till vocabulary at the start of a line
    keyword_start: Regex,
    /// Contact and company-registration lines
    contact: Regex,
    /// Street/address vocabulary and postal tokens
    address: Regex,
    /// Rounding, discounts, service charges, gratuities
    adjustment: Regex,
    /// Digits and punctuation only: barcodes, dates, dividers, phone fragments
    numeric_only: Regex,
}

impl NoiseFilter {
    pub fn new() -> Self {
        Self {
            keyword_start: Regex::new(
                r"(?i)^(sub\s*total|total|vat\b|gst\b|tax\b|receipt|table\b|cashier|payment\s+terms?|change\b|cash\b|card\b|balance|invoice|thank|welcome|served\s+by|order\s+(no|num))",
            )
            .expect("valid regex"),
            contact: Regex::new(
                r"(?i)(\btel\b|telephone|\bfax\b|e-?mail|website|www\.|https?:|\bphone\b|\breg\.?\s*no\b|registration|company\s+no|\bssm\b|\b\d{6,}-[A-Z]\b)",
            )
            .expect("valid regex"),
            address: Regex::new(
                r"(?i)\b(street|road|\brd\b|avenue|\bave\b|jalan|lorong|lane|drive|boulevard|blvd|floor|suite|block|postcode|zip)\b|\b\d{5}\s*$|\b[A-Za-z]{1,2}\d{1,2}[A-Za-z]?\s+\d[A-Za-z]{2}\b",
            )
            .expect("valid regex"),
            adjustment: Regex::new(
                r"(?i)(rounding|rounded|\bdiscount\b|\bdisc\b|service\s+charge|svc\s+chg|gratuity|\btip\b|promo|voucher|coupon)",
            )
            .expect("valid regex"),
            numeric_only: Regex::new(r"^[\d\s.,:\-/#*=%'()+]+$").expect("valid regex"),
        }
    }

    /// True when the line must not produce an item or a description
    pub fn is_noise(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return true;
        }
        self.numeric_only.is_match(trimmed)
            || self.keyword_start.is_match(trimmed)
            || self.contact.is_match(trimmed)
            || self.address.is_match(trimmed)
            || self.adjustment.is_match(trimmed)
    }
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Surrounding lines available to a matcher
struct LineContext<'a> {
    lines: &'a [&'a str],
    index: usize,
    filter: &'a NoiseFilter,
}

impl<'a> LineContext<'a> {
    /// Nearest non-noise line within `max_back` lines above the current one
    fn description_lookback(&self, max_back: usize) -> Option<String> {
        let start = self.index.saturating_sub(max_back);
        for j in (start..self.index).rev() {
            let line = self.lines[j].trim();
            if !line.is_empty() && !self.filter.is_noise(line) {
                return Some(line.to_string());
            }
        }
        None
    }
}

/// One layout in the matcher cascade
///
/// The cascade is a data-driven list so new receipt formats slot in
/// without touching the scan loop, and each matcher tests in isolation.
struct LineMatcher {
    /// Layout name, for debug logging
    name: &'static str,
    regex: Regex,
    /// Builds an item from a successful match; `None` rejects the line
    build: fn(&Captures<'_>, &LineContext<'_>) -> Option<ReceiptItem>,
}

/// Parses product lines out of raw OCR text
pub struct LineItemParser {
    filter: NoiseFilter,
    matchers: Vec<LineMatcher>,
}

impl LineItemParser {
    pub fn new() -> Self {
        let matchers = vec![
            // -2 * RM 45.29 ... = RM 90.57 (description on an earlier line)
            LineMatcher {
                name: "qty-times-unit",
                regex: Regex::new(
                    r"^\s*\(?(?P<qty>-?\d+(?:\.\d+)?)\)?\s*[*xX]\s*(?:RM|[$£€¥])\s*(?P<unit>\d[\d.,]*).*?=\s*(?:RM|[$£€¥])\s*(?P<total>\d[\d.,]*)\s*$",
                )
                .expect("valid regex"),
                build: build_qty_times_unit,
            },
            // 3x Lager £15.75
            LineMatcher {
                name: "qty-x-description",
                regex: Regex::new(
                    r"^\s*(?P<qty>\d+(?:\.\d+)?)\s*[xX]\s+(?P<desc>.+?)\s+(?:RM\s*|[$£€¥]\s*)?(?P<price>\d[\d.,]*)\s*$",
                )
                .expect("valid regex"),
                build: build_qty_x_description,
            },
            // Steak & Ale Pie £13.50
            LineMatcher {
                name: "description-price",
                regex: Regex::new(
                    r"^\s*(?P<desc>.+?)\s+(?:RM\s*|[$£€¥]\s*)(?P<price>\d[\d.,]*)\s*$",
                )
                .expect("valid regex"),
                build: build_description_price,
            },
            // 2 Nasi Lemak 5.50 (no currency marker)
            LineMatcher {
                name: "qty-description-price",
                regex: Regex::new(
                    r"^\s*(?P<qty>\d+(?:\.\d+)?)\s+(?P<desc>\D.*?)\s+(?P<price>\d+(?:\.\d{1,2})?)\s*$",
                )
                .expect("valid regex"),
                build: build_qty_description_price,
            },
        ];

        Self {
            filter: NoiseFilter::new(),
            matchers,
        }
    }

    /// Extract product items, top to bottom, first matching layout wins
    pub fn parse(&self, raw_text: &str) -> Vec<ReceiptItem> {
        let lines: Vec<&str> = raw_text.lines().map(str::trim).collect();
        let mut items = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            if line.is_empty() || self.filter.is_noise(line) {
                continue;
            }

            let ctx = LineContext {
                lines: &lines,
                index,
                filter: &self.filter,
            };

            // The first layout whose shape fits owns the line; if its
            // builder then rejects it, later layouts must not reinterpret
            // the leftovers as a description
            for matcher in &self.matchers {
                if let Some(caps) = matcher.regex.captures(line) {
                    match (matcher.build)(&caps, &ctx) {
                        Some(item) => {
                            debug!(
                                pattern = matcher.name,
                                description = %item.description,
                                "line item matched"
                            );
                            items.push(item);
                        }
                        None => {
                            debug!(pattern = matcher.name, %line, "layout matched but line rejected")
                        }
                    }
                    break;
                }
            }
        }

        items
    }
}

impl Default for LineItemParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Quantity, unit price, and total all printed; description looked up
/// from an earlier line
fn build_qty_times_unit(caps: &Captures<'_>, ctx: &LineContext<'_>) -> Option<ReceiptItem> {
    // Returns print as negative quantities; the item keeps the magnitude
    let quantity = caps.name("qty")?.as_str().parse::<f64>().ok()?.abs();
    let unit_price = parse_amount(caps.name("unit")?.as_str())?;
    let total = parse_amount(caps.name("total")?.as_str())?;
    let description = ctx.description_lookback(DESCRIPTION_LOOKBACK)?;
    finish(&description, quantity, unit_price, total)
}

/// Quantity and per-unit price on one line; total is quantity x price,
/// unit price derived back by division
fn build_qty_x_description(caps: &Captures<'_>, _ctx: &LineContext<'_>) -> Option<ReceiptItem> {
    let quantity: f64 = caps.name("qty")?.as_str().parse().ok()?;
    if quantity <= 0.0 {
        return None;
    }
    let printed = parse_amount(caps.name("price")?.as_str())?;
    let total = round2(quantity * printed);
    let unit_price = round2(total / quantity);
    finish(caps.name("desc")?.as_str(), quantity, unit_price, total)
}

/// Single item at quantity 1; the description itself must not be noise
fn build_description_price(caps: &Captures<'_>, ctx: &LineContext<'_>) -> Option<ReceiptItem> {
    let description = caps.name("desc")?.as_str().trim();
    if ctx.filter.is_noise(description) {
        return None;
    }
    let price = parse_amount(caps.name("price")?.as_str())?;
    if price <= 0.0 {
        return None;
    }
    finish(description, 1.0, price, price)
}

/// Space-separated quantity, free-text description, bare trailing price
fn build_qty_description_price(caps: &Captures<'_>, _ctx: &LineContext<'_>) -> Option<ReceiptItem> {
    let quantity: f64 = caps.name("qty")?.as_str().parse().ok()?;
    if quantity <= 0.0 {
        return None;
    }
    let printed = parse_amount(caps.name("price")?.as_str())?;
    let total = round2(quantity * printed);
    let unit_price = round2(total / quantity);
    finish(caps.name("desc")?.as_str(), quantity, unit_price, total)
}

/// Shared finalizer enforcing the item invariants
fn finish(description: &str, quantity: f64, unit_price: f64, total: f64) -> Option<ReceiptItem> {
    let description = description.trim();
    if description.chars().count() <= 2 {
        return None;
    }
    if quantity <= 0.0 || total < 0.0 {
        return None;
    }
    Some(ReceiptItem::new(
        description,
        quantity,
        round2(unit_price),
        round2(total),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_keywords() {
        let filter = NoiseFilter::new();
        assert!(filter.is_noise("Subtotal: 10.00"));
        assert!(filter.is_noise("Sub Total : RM 10.50"));
        assert!(filter.is_noise("TOTAL 45.90"));
        assert!(filter.is_noise("VAT 20%"));
        assert!(filter.is_noise("GST 6% : RM 1.26"));
        assert!(filter.is_noise("Tax: 1.50"));
        assert!(filter.is_noise("Receipt #9921"));
        assert!(filter.is_noise("Table 12"));
        assert!(filter.is_noise("Cashier: Amy"));
        assert!(filter.is_noise("Payment terms: 30 days"));
    }

    #[test]
    fn test_noise_contact_and_registration() {
        let filter = NoiseFilter::new();
        assert!(filter.is_noise("Tel: 03-7727 1234"));
        assert!(filter.is_noise("Fax 03-7727 1235"));
        assert!(filter.is_noise("Email: hello@cafe.example"));
        assert!(filter.is_noise("www.cafe.example"));
        assert!(filter.is_noise("Reg No 558211-X"));
    }

    #[test]
    fn test_noise_address() {
        let filter = NoiseFilter::new();
        assert!(filter.is_noise("123 Main Street, Springfield"));
        assert!(filter.is_noise("12 Jalan Ampang"));
        assert!(filter.is_noise("Kuala Lumpur 50450"));
        assert!(filter.is_noise("London SW1A 1AA"));
    }

    #[test]
    fn test_noise_adjustments() {
        let filter = NoiseFilter::new();
        assert!(filter.is_noise("Rounding adj: 0.02"));
        assert!(filter.is_noise("Discount -1.00"));
        assert!(filter.is_noise("Service charge 10%"));
        assert!(filter.is_noise("Gratuity included"));
    }

    #[test]
    fn test_noise_numeric_only() {
        let filter = NoiseFilter::new();
        assert!(filter.is_noise("0012345"));
        assert!(filter.is_noise("12/05/2024 14:02"));
        assert!(filter.is_noise("--------"));
        assert!(filter.is_noise("***"));
        assert!(filter.is_noise(""));
    }

    #[test]
    fn test_product_lines_pass_the_filter() {
        let filter = NoiseFilter::new();
        assert!(!filter.is_noise("Steak & Ale Pie £13.50"));
        assert!(!filter.is_noise("2 * RM 45.29 = RM 90.57"));
        assert!(!filter.is_noise("3x Lager £15.75"));
        assert!(!filter.is_noise("Taxi fare 12.00"));
        assert!(!filter.is_noise("Nasi Goreng"));
    }

    #[test]
    fn test_qty_times_unit_with_lookback() {
        let items = LineItemParser::new().parse("Nasi Goreng Special\n-2 * RM 45.29 = RM 90.57");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Nasi Goreng Special");
        assert_eq!(items[0].quantity, 2.0);
        assert_eq!(items[0].unit_price, 45.29);
        assert_eq!(items[0].total, 90.57);
    }

    #[test]
    fn test_qty_times_unit_lookback_skips_noise() {
        // A barcode between the name and the quantity line
        let items = LineItemParser::new().parse("Teh Tarik\n0098812\n2 * RM 2.50 = RM 5.00");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Teh Tarik");
        assert_eq!(items[0].total, 5.0);
    }

    #[test]
    fn test_qty_times_unit_without_description_dropped() {
        let items = LineItemParser::new().parse("2 * RM 45.29 = RM 90.57");
        assert!(items.is_empty());
    }

    #[test]
    fn test_qty_times_unit_lookback_limited_to_two_lines() {
        let text = "Mee Goreng\n0001\n0002\n1 * RM 6.00 = RM 6.00";
        let items = LineItemParser::new().parse(text);
        assert!(items.is_empty(), "description three lines up is out of reach");
    }

    #[test]
    fn test_qty_x_description() {
        let items = LineItemParser::new().parse("3x Lager £15.75");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Lager");
        assert_eq!(items[0].quantity, 3.0);
        assert_eq!(items[0].unit_price, 15.75);
        assert_eq!(items[0].total, 47.25);
    }

    #[test]
    fn test_qty_x_description_unit_times_out() {
        let items = LineItemParser::new().parse("2x Coffee £3.00");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Coffee");
        assert_eq!(items[0].quantity, 2.0);
        assert_eq!(items[0].unit_price, 3.0);
        assert_eq!(items[0].total, 6.0);
    }

    #[test]
    fn test_description_price() {
        let items = LineItemParser::new().parse("Steak & Ale Pie £13.50");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Steak & Ale Pie");
        assert_eq!(items[0].quantity, 1.0);
        assert_eq!(items[0].unit_price, 13.5);
        assert_eq!(items[0].total, 13.5);
    }

    #[test]
    fn test_description_price_rm() {
        let items = LineItemParser::new().parse("Nasi Lemak RM 5.50");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Nasi Lemak");
        assert_eq!(items[0].total, 5.5);
    }

    #[test]
    fn test_description_price_rejects_numeric_description() {
        // Line survives the filter because of the currency symbol, but the
        // description is a bare barcode
        let items = LineItemParser::new().parse("12345 £3.00");
        assert!(items.is_empty());
    }

    #[test]
    fn test_description_price_rejects_zero_price() {
        let items = LineItemParser::new().parse("Mystery Item £0.00");
        assert!(items.is_empty());
    }

    #[test]
    fn test_qty_description_price() {
        let items = LineItemParser::new().parse("2 Roti Canai 1.50");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Roti Canai");
        assert_eq!(items[0].quantity, 2.0);
        assert_eq!(items[0].unit_price, 1.5);
        assert_eq!(items[0].total, 3.0);
    }

    #[test]
    fn test_short_description_dropped() {
        let items = LineItemParser::new().parse("Ab £3.00");
        assert!(items.is_empty());
    }

    #[test]
    fn test_description_length_counts_characters_not_bytes() {
        // "Tè" is three bytes but still a two-character description
        let items = LineItemParser::new().parse("Tè £3.00");
        assert!(items.is_empty());

        let items = LineItemParser::new().parse("Thé £3.00");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Thé");
    }

    #[test]
    fn test_address_never_becomes_an_item() {
        let items = LineItemParser::new().parse("123 Main Street, Springfield");
        assert!(items.is_empty());
    }

    #[test]
    fn test_unmatched_lines_dropped_silently() {
        let items = LineItemParser::new().parse("some stray ocr noise\nanother line");
        assert!(items.is_empty());
    }

    #[test]
    fn test_empty_text() {
        assert!(LineItemParser::new().parse("").is_empty());
    }

    #[test]
    fn test_mixed_receipt() {
        let text = "Joe's Cafe\n\
                    12 Jalan Ampang\n\
                    Tel: 03-7727 1234\n\
                    2x Coffee £3.00\n\
                    Steak & Ale Pie £13.50\n\
                    Sub Total : 19.50\n\
                    Service charge 10%\n\
                    Total: £21.45";
        let items = LineItemParser::new().parse(text);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "Coffee");
        assert_eq!(items[0].total, 6.0);
        assert_eq!(items[1].description, "Steak & Ale Pie");
        assert_eq!(items[1].total, 13.5);
    }

    #[test]
    fn test_items_start_uncategorized() {
        let items = LineItemParser::new().parse("2x Coffee £3.00");
        assert_eq!(items[0].category_id, "uncategorized");
    }
}
