//! Domain models for Chit

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ========== OCR Payload Models ==========

/// Raw payload produced by the OCR collaborator
///
/// The regex-only endpoint fills `raw_text` and `confidence`; the
/// AI-assisted endpoint additionally pre-populates structured fields and
/// items. Extractors must tolerate any subset and fall back to `raw_text`
/// parsing uniformly. Field names follow the collaborator's wire format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrPayload {
    /// Full text as returned by the OCR engine, preserved verbatim
    pub raw_text: String,
    /// Whole-document confidence in [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    /// Pre-extracted date; only trusted when it is a real `YYYY-MM-DD` date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<f64>,
    /// Free-text category suggestions, resolved against the registry later
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    /// Pre-parsed line items from the AI-assisted endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<RawOcrItem>>,
    /// Bounding-box annotations; passed through untouched, never processed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boxes: Option<serde_json::Value>,
}

/// A pre-parsed line item from the AI-assisted OCR endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawOcrItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total: f64,
    /// Free-text category name suggested by the AI layer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_category: Option<String>,
    /// Item-level confidence in [0, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

// ========== Receipt Models ==========

/// Categorical warning attached to a receipt at save time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyFlag {
    /// Same store, same date, total within tolerance of a prior receipt
    Duplicate,
    /// Total far above the user's recent average
    Spike,
    /// OCR engine reported low confidence
    OcrMismatch,
    /// Effective tax rate outside the plausible band
    TaxMismatch,
}

impl AnomalyFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Duplicate => "duplicate",
            Self::Spike => "spike",
            Self::OcrMismatch => "ocr_mismatch",
            Self::TaxMismatch => "tax_mismatch",
        }
    }
}

impl std::str::FromStr for AnomalyFlag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duplicate" => Ok(Self::Duplicate),
            "spike" => Ok(Self::Spike),
            "ocr_mismatch" => Ok(Self::OcrMismatch),
            "tax_mismatch" => Ok(Self::TaxMismatch),
            _ => Err(format!("Unknown anomaly flag: {}", s)),
        }
    }
}

impl std::fmt::Display for AnomalyFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Item-level validation signal from the AI-assisted path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiValidationFlag {
    /// Unit price outside the plausible range for a receipt line
    PriceSuspicious,
    /// Quantity non-positive or implausibly large
    QuantityUnusual,
    /// Description too short to identify a product
    DescriptionUnclear,
    /// Suggested category not present in the registry
    CategoryMismatch,
    /// Line total does not match quantity x unit price
    TotalCalculationError,
}

impl AiValidationFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceSuspicious => "price_suspicious",
            Self::QuantityUnusual => "quantity_unusual",
            Self::DescriptionUnclear => "description_unclear",
            Self::CategoryMismatch => "category_mismatch",
            Self::TotalCalculationError => "total_calculation_error",
        }
    }
}

impl std::str::FromStr for AiValidationFlag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "price_suspicious" => Ok(Self::PriceSuspicious),
            "quantity_unusual" => Ok(Self::QuantityUnusual),
            "description_unclear" => Ok(Self::DescriptionUnclear),
            "category_mismatch" => Ok(Self::CategoryMismatch),
            "total_calculation_error" => Ok(Self::TotalCalculationError),
            _ => Err(format!("Unknown validation flag: {}", s)),
        }
    }
}

impl std::fmt::Display for AiValidationFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Receipt workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    /// Normalized and saved without anomalies
    #[default]
    Processed,
    /// Awaiting OCR completion
    Pending,
    /// Saved with one or more anomaly flags
    Flagged,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Pending => "pending",
            Self::Flagged => "flagged",
        }
    }

    /// Status implied by a receipt's anomaly flags
    pub fn from_flags(flags: &[AnomalyFlag]) -> Self {
        if flags.is_empty() {
            Self::Processed
        } else {
            Self::Flagged
        }
    }
}

impl std::str::FromStr for ReceiptStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processed" => Ok(Self::Processed),
            "pending" => Ok(Self::Pending),
            "flagged" => Ok(Self::Flagged),
            _ => Err(format!("Unknown receipt status: {}", s)),
        }
    }
}

impl std::fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single line item on a receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptItem {
    /// Product description (trimmed, more than 2 characters)
    pub description: String,
    /// Purchased quantity; 1 when the layout carries no quantity
    pub quantity: f64,
    /// Price per unit; derived as total/quantity when only the line total is printed
    pub unit_price: f64,
    /// Line total, never negative
    pub total: f64,
    /// Registry category id; "uncategorized" until resolved
    pub category_id: String,
    /// Validation flags from the AI-assisted path; empty on the regex path
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ai_validation_flags: Vec<AiValidationFlag>,
    /// Item-level confidence from the AI-assisted path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_confidence: Option<f64>,
}

impl ReceiptItem {
    /// New unresolved item as produced by the line parser
    pub fn new(description: impl Into<String>, quantity: f64, unit_price: f64, total: f64) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            total,
            category_id: crate::categories::UNCATEGORIZED_ID.to_string(),
            ai_validation_flags: Vec::new(),
            ai_confidence: None,
        }
    }
}

/// Fully normalized receipt produced by the assembly pipeline
///
/// Created fresh on every upload, never mutated in place. `anomaly_flags`
/// stays empty until save-time detection has history to compare against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedReceipt {
    /// Store name; "Unknown Store" when none could be identified
    pub store: String,
    /// Purchase date; today's local date when no date was parseable
    pub date: NaiveDate,
    /// Receipt total; recomputed from items + tax when extraction yields 0
    pub total: f64,
    pub tax: f64,
    pub items: Vec<ReceiptItem>,
    /// Original OCR text, preserved verbatim for audit
    pub raw_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Free-text category suggestions carried over from the OCR layer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category_suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomaly_flags: Vec<AnomalyFlag>,
}

/// A stored receipt record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub id: i64,
    /// Owning user; opaque identifier, auth lives outside the core
    pub user_id: String,
    pub store: String,
    pub date: NaiveDate,
    pub total: f64,
    pub tax: f64,
    /// Workflow status
    pub status: ReceiptStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomaly_flags: Vec<AnomalyFlag>,
    /// Path to the stored image file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// Whole-document OCR confidence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_confidence: Option<f64>,
    /// Original OCR text, preserved verbatim for audit
    pub raw_text: String,
    pub items: Vec<ReceiptItem>,
    pub created_at: DateTime<Utc>,
}

impl Receipt {
    /// Copy of this receipt with the item at `index` replaced
    ///
    /// Item edits never splice the stored list in place.
    pub fn with_item_replaced(&self, index: usize, item: ReceiptItem) -> Result<Receipt> {
        if index >= self.items.len() {
            return Err(Error::InvalidData(format!(
                "No item at index {} (receipt has {})",
                index,
                self.items.len()
            )));
        }
        let mut items = self.items.clone();
        items[index] = item;
        Ok(Receipt {
            items,
            ..self.clone()
        })
    }

    /// Sum of line-item totals
    pub fn items_total(&self) -> f64 {
        round2(self.items.iter().map(|i| i.total).sum())
    }
}

/// New receipt for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReceipt {
    pub user_id: String,
    pub store: String,
    pub date: NaiveDate,
    pub total: f64,
    pub tax: f64,
    pub status: ReceiptStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomaly_flags: Vec<AnomalyFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_confidence: Option<f64>,
    pub raw_text: String,
    pub items: Vec<ReceiptItem>,
}

impl NewReceipt {
    /// Creation record from pipeline output plus save-time detection results
    pub fn from_normalized(
        user_id: &str,
        receipt: &NormalizedReceipt,
        image_path: Option<String>,
        anomaly_flags: Vec<AnomalyFlag>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            store: receipt.store.clone(),
            date: receipt.date,
            total: receipt.total,
            tax: receipt.tax,
            status: ReceiptStatus::from_flags(&anomaly_flags),
            anomaly_flags,
            image_path,
            ocr_confidence: receipt.confidence,
            raw_text: receipt.raw_text.clone(),
            items: receipt.items.clone(),
        }
    }
}

// ========== Category Models ==========

/// A spending category from the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ========== Budget Models ==========

/// Budget progress for one category in one month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub category_id: String,
    pub category_name: String,
    /// Monthly limit in currency units
    pub limit: f64,
    /// Spend accumulated so far in the month
    pub spent: f64,
    /// Month key in `YYYY-MM` form
    pub month: String,
}

// ========== Report Models ==========

/// Tone of a weekly report highlight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    Info,
    Warning,
    Success,
}

impl HighlightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Success => "success",
        }
    }
}

impl std::str::FromStr for HighlightKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "success" => Ok(Self::Success),
            _ => Err(format!("Unknown highlight kind: {}", s)),
        }
    }
}

impl std::fmt::Display for HighlightKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single callout in a weekly report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyHighlight {
    pub title: String,
    pub description: String,
    pub kind: HighlightKind,
}

/// Aggregated view of one week of receipts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub week_start: NaiveDate,
    /// Last day included in the report (week_start + 6)
    pub week_end: NaiveDate,
    pub total_spent: f64,
    pub receipt_count: usize,
    /// Receipts carrying at least one anomaly flag
    pub anomalies_count: usize,
    pub highlights: Vec<WeeklyHighlight>,
    pub receipts: Vec<Receipt>,
}

// ========== Save Models ==========

/// Whether a save creates a new receipt or edits a stored one
///
/// Duplicate and spike detection only run on creation; an edited receipt
/// keeps its original duplicate/spike status unless re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Create,
    Edit,
}

/// Round a currency amount to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anomaly_flag_as_str() {
        assert_eq!(AnomalyFlag::Duplicate.as_str(), "duplicate");
        assert_eq!(AnomalyFlag::Spike.as_str(), "spike");
        assert_eq!(AnomalyFlag::OcrMismatch.as_str(), "ocr_mismatch");
        assert_eq!(AnomalyFlag::TaxMismatch.as_str(), "tax_mismatch");
    }

    #[test]
    fn test_anomaly_flag_from_str() {
        assert_eq!(
            "duplicate".parse::<AnomalyFlag>().unwrap(),
            AnomalyFlag::Duplicate
        );
        assert_eq!("SPIKE".parse::<AnomalyFlag>().unwrap(), AnomalyFlag::Spike);
        assert_eq!(
            "ocr_mismatch".parse::<AnomalyFlag>().unwrap(),
            AnomalyFlag::OcrMismatch
        );
        assert!("invalid".parse::<AnomalyFlag>().is_err());
    }

    #[test]
    fn test_anomaly_flag_serde() {
        let flag = AnomalyFlag::TaxMismatch;
        let json = serde_json::to_string(&flag).unwrap();
        assert_eq!(json, r#""tax_mismatch""#);

        let parsed: AnomalyFlag = serde_json::from_str(r#""spike""#).unwrap();
        assert_eq!(parsed, AnomalyFlag::Spike);
    }

    #[test]
    fn test_receipt_status_from_flags() {
        assert_eq!(ReceiptStatus::from_flags(&[]), ReceiptStatus::Processed);
        assert_eq!(
            ReceiptStatus::from_flags(&[AnomalyFlag::Duplicate]),
            ReceiptStatus::Flagged
        );
    }

    #[test]
    fn test_ocr_payload_partial_json() {
        // Regex-only producers send just text and confidence
        let payload: OcrPayload =
            serde_json::from_str(r#"{"rawText": "Total: RM 5.00", "confidence": 0.92}"#).unwrap();
        assert_eq!(payload.raw_text, "Total: RM 5.00");
        assert_eq!(payload.confidence, Some(0.92));
        assert!(payload.store.is_none());
        assert!(payload.items.is_none());
        assert!(payload.categories.is_empty());
    }

    #[test]
    fn test_ocr_payload_ai_items() {
        let payload: OcrPayload = serde_json::from_str(
            r#"{
                "rawText": "x",
                "items": [
                    {"description": "Coffee", "quantity": 2, "unitPrice": 3.0, "total": 6.0, "suggestedCategory": "Dining"}
                ]
            }"#,
        )
        .unwrap();
        let items = payload.items.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_price, 3.0);
        assert_eq!(items[0].suggested_category.as_deref(), Some("Dining"));
    }

    #[test]
    fn test_with_item_replaced() {
        let receipt = Receipt {
            id: 1,
            user_id: "u1".to_string(),
            store: "Cafe".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            total: 9.0,
            tax: 0.0,
            status: ReceiptStatus::Processed,
            anomaly_flags: vec![],
            image_path: None,
            ocr_confidence: None,
            raw_text: String::new(),
            items: vec![
                ReceiptItem::new("Coffee", 1.0, 3.0, 3.0),
                ReceiptItem::new("Cake", 1.0, 6.0, 6.0),
            ],
            created_at: Utc::now(),
        };

        let edited = receipt
            .with_item_replaced(1, ReceiptItem::new("Scone", 1.0, 4.0, 4.0))
            .unwrap();
        assert_eq!(edited.items[1].description, "Scone");
        // Original list untouched
        assert_eq!(receipt.items[1].description, "Cake");
        // Callers rebuild the receipt total from the edited items
        assert_eq!(edited.items_total(), 7.0);
        assert_eq!(receipt.items_total(), 9.0);

        assert!(receipt
            .with_item_replaced(5, ReceiptItem::new("Scone", 1.0, 4.0, 4.0))
            .is_err());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(3.004999), 3.0);
        assert_eq!(round2(3.005001), 3.01);
        assert_eq!(round2(46.0000000001), 46.0);
    }
}
