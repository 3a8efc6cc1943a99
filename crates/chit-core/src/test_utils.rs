//! Test utilities for chit-core
//!
//! Fixture builders and canned OCR service bodies shared by unit and
//! integration tests, standing in for the external OCR collaborator.

use chrono::{NaiveDate, Utc};

use crate::models::{NormalizedReceipt, Receipt, ReceiptItem, ReceiptStatus};

/// Shorthand for dates in fixtures
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

/// Stored receipt with sensible defaults
pub fn stored_receipt(id: i64, user_id: &str, store: &str, date: NaiveDate, total: f64) -> Receipt {
    Receipt {
        id,
        user_id: user_id.to_string(),
        store: store.to_string(),
        date,
        total,
        tax: 0.0,
        status: ReceiptStatus::Processed,
        anomaly_flags: Vec::new(),
        image_path: None,
        ocr_confidence: Some(0.9),
        raw_text: String::new(),
        items: Vec::new(),
        created_at: Utc::now(),
    }
}

/// Pipeline output with sensible defaults
pub fn normalized_receipt(store: &str, date: NaiveDate, total: f64) -> NormalizedReceipt {
    NormalizedReceipt {
        store: store.to_string(),
        date,
        total,
        tax: 0.0,
        items: Vec::new(),
        raw_text: String::new(),
        confidence: Some(0.9),
        category_suggestions: Vec::new(),
        anomaly_flags: Vec::new(),
    }
}

/// Item assigned to `category_id`
pub fn categorized_item(description: &str, total: f64, category_id: &str) -> ReceiptItem {
    let mut item = ReceiptItem::new(description, 1.0, total, total);
    item.category_id = category_id.to_string();
    item
}

/// OCR body for a readable two-item cafe receipt
pub fn sample_ocr_body() -> &'static str {
    r#"{
        "rawText": "Joe's Cafe\n12/25/2023\n2x Coffee £3.00\nMuffin £2.50\nTotal: £8.50",
        "confidence": 0.93
    }"#
}

/// OCR body the service returns for an unreadable photo
pub fn unreadable_ocr_body() -> &'static str {
    r#"{"error": "unreadable_image", "message": "Image too blurry to read"}"#
}
