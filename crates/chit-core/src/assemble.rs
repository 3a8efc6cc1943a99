//! Receipt assembly
//!
//! Orchestrates field extraction, line-item parsing, category
//! resolution, and the items-total fallback into a single normalized
//! receipt. Anomaly detection does not run here; flags stay empty
//! until save time, when the owner's history is available.

use tracing::debug;

use crate::categories::{resolve_category_id, CategoryRegistry, UNCATEGORIZED_NAME};
use crate::error::{Error, Result};
use crate::extract::FieldExtractor;
use crate::items::LineItemParser;
use crate::models::{round2, Category, NormalizedReceipt, OcrPayload, RawOcrItem, ReceiptItem};
use crate::validate::{validate_item, ItemValidationConfig};

pub struct ReceiptAssembler {
    extractor: FieldExtractor,
    parser: LineItemParser,
    validation: ItemValidationConfig,
}

impl ReceiptAssembler {
    pub fn new() -> Self {
        Self {
            extractor: FieldExtractor::new(),
            parser: LineItemParser::new(),
            validation: ItemValidationConfig::default(),
        }
    }

    /// Build a normalized receipt from one OCR payload
    ///
    /// The registry is read once up front so every item in the receipt
    /// resolves against the same category snapshot. An empty registry
    /// is a deployment fault and fails the whole call.
    pub fn assemble(
        &self,
        payload: &OcrPayload,
        registry: &dyn CategoryRegistry,
    ) -> Result<NormalizedReceipt> {
        let categories = registry.list()?;
        if categories.is_empty() {
            return Err(Error::Configuration(
                "category registry is empty; seed categories before assembling receipts"
                    .to_string(),
            ));
        }

        let fields = self.extractor.extract(payload);

        // AI-assisted payloads arrive with items already parsed
        let items = match &payload.items {
            Some(raw_items) => self.convert_ai_items(raw_items, &categories),
            None => {
                let default_id = resolve_category_id(UNCATEGORIZED_NAME, &categories);
                let mut items = self.parser.parse(&payload.raw_text);
                for item in &mut items {
                    item.category_id = default_id.clone();
                }
                items
            }
        };

        let tax = fields.tax;
        let mut total = fields.total;
        if total == 0.0 && !items.is_empty() {
            let items_sum: f64 = items.iter().map(|item| item.total).sum();
            total = round2(items_sum + tax);
            debug!(total, "no printed total found; summed line items");
        }

        Ok(NormalizedReceipt {
            store: fields.store,
            date: fields.date,
            total,
            tax,
            items,
            raw_text: payload.raw_text.clone(),
            confidence: payload.confidence,
            category_suggestions: payload.categories.clone(),
            anomaly_flags: Vec::new(),
        })
    }

    /// Convert pre-parsed items, attaching validation flags
    ///
    /// Quantities default to 1 and unit prices are derived from the
    /// line total when the AI left them out. Items whose descriptions
    /// are too short to mean anything are dropped outright.
    fn convert_ai_items(
        &self,
        raw_items: &[RawOcrItem],
        categories: &[Category],
    ) -> Vec<ReceiptItem> {
        raw_items
            .iter()
            .filter_map(|raw| {
                let description = raw.description.trim();
                if description.chars().count() <= 2 {
                    debug!(description, "dropping AI item with unusable description");
                    return None;
                }

                let flags = validate_item(raw, categories, &self.validation);

                let quantity = if raw.quantity > 0.0 { raw.quantity } else { 1.0 };
                let total = round2(raw.total.max(0.0));
                let unit_price = if raw.unit_price > 0.0 {
                    round2(raw.unit_price)
                } else {
                    round2(total / quantity)
                };

                let category_name = raw
                    .suggested_category
                    .as_deref()
                    .unwrap_or(UNCATEGORIZED_NAME);

                let mut item = ReceiptItem::new(description, quantity, unit_price, total);
                item.category_id = resolve_category_id(category_name, categories);
                item.ai_validation_flags = flags;
                item.ai_confidence = raw.confidence;
                Some(item)
            })
            .collect()
    }
}

impl Default for ReceiptAssembler {
    fn default() -> Self {
        Self::new()
    }
}
