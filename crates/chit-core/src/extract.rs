//! Receipt field extraction
//!
//! Derives store, date, total, and tax from a raw OCR payload using
//! ordered pattern cascades. Extraction never fails: ambiguity degrades
//! to a documented default (unknown store, today's date, zero amounts).

use chrono::{Local, NaiveDate};
use regex::Regex;
use tracing::debug;

use crate::models::{round2, OcrPayload};

/// Store name used when no candidate line qualifies
pub const UNKNOWN_STORE: &str = "Unknown Store";

/// Amount sub-pattern shared by the total/tax cascades. Digits with
/// optional comma/space thousands separators and a decimal part; spaces
/// only, so a match never crosses a line break.
const AMOUNT: &str = r"(?P<amt>\d(?:[\d,\. ]*\d)?)";

/// Fields derived from one OCR payload
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub store: String,
    pub date: NaiveDate,
    pub total: f64,
    pub tax: f64,
}

/// One labeled pattern in an amount cascade
struct AmountPattern {
    /// Receipt layout the pattern targets, for debug logging
    name: &'static str,
    regex: Regex,
}

impl AmountPattern {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("valid regex"),
        }
    }

    /// First match in `text` that is not a shadowed sub-total line
    ///
    /// Generic total patterns carry an optional `sub` group so a
    /// "Sub Total" line never satisfies a plain "Total" pattern.
    fn find(&self, text: &str) -> Option<f64> {
        for caps in self.regex.captures_iter(text) {
            if caps.name("sub").is_some() {
                continue;
            }
            if let Some(amount) = caps.name("amt").and_then(|m| parse_amount(m.as_str())) {
                return Some(amount);
            }
        }
        None
    }
}

/// Extracts store, date, total, and tax from OCR payloads
pub struct FieldExtractor {
    /// `D{1,2}/D{1,2}/D{2,4}`, optionally followed by a time
    slash_date: Regex,
    /// Strict `YYYY-MM-DD` shape for structured dates
    iso_date: Regex,
    /// Line made only of digits/whitespace/colon/hyphen/slash; never a store name
    non_store_line: Regex,
    total_patterns: Vec<AmountPattern>,
    tax_patterns: Vec<AmountPattern>,
}

impl FieldExtractor {
    pub fn new() -> Self {
        let total_patterns = vec![
            // Malaysian layouts abbreviate the total line and the OCR keeps the quote
            AmountPattern::new("tot-rm", &format!(r"(?i)\bTOT'?\s*:\s*RM\s*{}", AMOUNT)),
            AmountPattern::new(
                "total-rm",
                &format!(r"(?i)\b(?P<sub>sub\s*)?total\s*:?\s*RM\s*{}", AMOUNT),
            ),
            AmountPattern::new(
                "total-symbol",
                &format!(r"(?i)\b(?P<sub>sub\s*)?total\s*:?\s*[$£€¥]\s*{}", AMOUNT),
            ),
            AmountPattern::new(
                "total-bare",
                &format!(r"(?i)\b(?P<sub>sub\s*)?total\s*:\s*{}", AMOUNT),
            ),
            AmountPattern::new(
                "subtotal-rm",
                &format!(r"(?i)\bsub\s*total\s*:?\s*RM\s*{}", AMOUNT),
            ),
        ];

        let tax_patterns = vec![
            AmountPattern::new(
                "gst-rate-rm",
                &format!(
                    r"(?i)\b(?:GST|TAX)\s*\d{{1,2}}(?:\.\d+)?\s*%\s*:?\s*RM\s*{}",
                    AMOUNT
                ),
            ),
            AmountPattern::new("gst-rm", &format!(r"(?i)\bGST\s*:?\s*RM\s*{}", AMOUNT)),
            AmountPattern::new(
                "vat-rate",
                &format!(
                    r"(?i)\bVAT\s*\d{{1,2}}(?:\.\d+)?\s*%\s*:?\s*[$£€¥]?\s*{}",
                    AMOUNT
                ),
            ),
            AmountPattern::new(
                "tax-bare",
                &format!(r"(?i)\btax\s*:\s*(?:RM|[$£€¥])?\s*{}", AMOUNT),
            ),
        ];

        Self {
            slash_date: Regex::new(
                r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})(?:\s+\d{1,2}:\d{2}(?::\d{2})?)?",
            )
            .expect("valid regex"),
            iso_date: Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"),
            non_store_line: Regex::new(r"^[\d\s:\-/]+$").expect("valid regex"),
            total_patterns,
            tax_patterns,
        }
    }

    /// Derive all four fields. Always returns a complete, defaulted tuple.
    pub fn extract(&self, payload: &OcrPayload) -> ExtractedFields {
        ExtractedFields {
            store: self.extract_store(payload),
            date: self.extract_date(payload),
            total: self.extract_total(payload),
            tax: self.extract_tax(payload),
        }
    }

    /// Structured store if usable, else the first plausible header line
    fn extract_store(&self, payload: &OcrPayload) -> String {
        if let Some(store) = &payload.store {
            let trimmed = store.trim();
            if !trimmed.is_empty() && trimmed != UNKNOWN_STORE {
                return trimmed.to_string();
            }
        }

        // First 3 non-empty lines; store names sit at the top of a receipt
        for line in payload
            .raw_text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(3)
        {
            if line.len() > 2 && !self.non_store_line.is_match(line) {
                return line.to_string();
            }
        }

        UNKNOWN_STORE.to_string()
    }

    /// Structured ISO date if real, else the first slash date in the text
    fn extract_date(&self, payload: &OcrPayload) -> NaiveDate {
        if let Some(date) = &payload.date {
            let trimmed = date.trim();
            if self.iso_date.is_match(trimmed) {
                if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                    return parsed;
                }
            }
        }

        if let Some(caps) = self.slash_date.captures(&payload.raw_text) {
            let first: u32 = caps[1].parse().unwrap_or(0);
            let second: u32 = caps[2].parse().unwrap_or(0);
            let year_text = &caps[3];
            let year: i32 = if year_text.len() == 2 {
                format!("20{}", year_text).parse().unwrap_or(0)
            } else {
                year_text.parse().unwrap_or(0)
            };

            // A group over 12 can only be the day; when both fit either
            // slot, assume DD/MM (EU/UK receipts dominate the corpus)
            let (day, month) = if first > 12 {
                (first, second)
            } else if second > 12 {
                (second, first)
            } else {
                (first, second)
            };

            if let Some(parsed) = NaiveDate::from_ymd_opt(year, month, day) {
                return parsed;
            }
            debug!(day, month, year, "discarding impossible receipt date");
        }

        Local::now().date_naive()
    }

    /// Structured total if positive, else the total pattern cascade
    ///
    /// A zero result here may still be replaced by the items-total
    /// fallback during assembly.
    fn extract_total(&self, payload: &OcrPayload) -> f64 {
        if let Some(total) = payload.total {
            if total > 0.0 {
                return round2(total);
            }
        }

        for pattern in &self.total_patterns {
            if let Some(amount) = pattern.find(&payload.raw_text) {
                debug!(pattern = pattern.name, amount, "total pattern matched");
                return amount;
            }
        }
        0.0
    }

    /// Structured tax if positive, else the tax pattern cascade
    fn extract_tax(&self, payload: &OcrPayload) -> f64 {
        if let Some(tax) = payload.tax {
            if tax > 0.0 {
                return round2(tax);
            }
        }

        for pattern in &self.tax_patterns {
            if let Some(amount) = pattern.find(&payload.raw_text) {
                debug!(pattern = pattern.name, amount, "tax pattern matched");
                return amount;
            }
        }
        0.0
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a matched amount, stripping thousands separators and whitespace
pub(crate) fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| *v >= 0.0)
        .map(round2)
}
