//! Chit Core Library
//!
//! Shared functionality for the Chit receipt tracker:
//! - OCR response ingestion for the external OCR service
//! - Field extraction from raw receipt text (store, date, total, tax)
//! - Line-item parsing across common receipt layouts
//! - Category registry and name resolution
//! - Anomaly detection against the owner's receipt history
//! - Save/edit/delete workflow with ownership checks
//! - Weekly reports and monthly budget progress

pub mod anomaly;
pub mod assemble;
pub mod budget;
pub mod categories;
pub mod error;
pub mod extract;
pub mod items;
pub mod models;
pub mod ocr;
pub mod report;
pub mod save;
pub mod store;
pub mod validate;

/// Test utilities including canned OCR service bodies
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use anomaly::{AnomalyDetector, DetectorConfig};
pub use assemble::ReceiptAssembler;
pub use budget::{budget_progress, month_key};
pub use categories::{
    default_categories, resolve_category_id, CategoryRegistry, StaticCategoryRegistry,
};
pub use error::{Error, Result};
pub use extract::{ExtractedFields, FieldExtractor};
pub use items::LineItemParser;
pub use models::{
    AiValidationFlag, AnomalyFlag, Budget, Category, HighlightKind, NewReceipt,
    NormalizedReceipt, OcrPayload, RawOcrItem, Receipt, ReceiptItem, ReceiptStatus, SaveMode,
    WeeklyHighlight, WeeklyReport,
};
pub use ocr::parse_ocr_response;
pub use report::build_weekly_report;
pub use save::{ReceiptSaver, RejectReason, SaveOutcome};
pub use store::{
    hashed_image_path, ImageStore, MemoryImageStore, MemoryStore, ReceiptFilter, ReceiptStore,
};
pub use validate::{validate_item, ItemValidationConfig};
