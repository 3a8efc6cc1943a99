//! Receipt and image storage contracts
//!
//! The durable engine lives outside this crate. These traits define
//! exactly what the pipeline needs from it, and the in-memory
//! implementations back tests and development setups.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::models::{NewReceipt, Receipt};

/// Filters for listing a user's receipts
#[derive(Debug, Clone, Default)]
pub struct ReceiptFilter {
    /// Keep receipts with at least one item in this category
    pub category_id: Option<String>,
    /// Inclusive lower bound on the receipt date
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the receipt date
    pub date_to: Option<NaiveDate>,
    /// Case-insensitive substring match on the store name
    pub store_contains: Option<String>,
}

/// Receipt persistence operations the pipeline depends on
pub trait ReceiptStore {
    fn insert(&self, receipt: NewReceipt) -> Result<Receipt>;
    /// Replace the stored fields of `id`, keeping its id and creation time
    fn update(&self, id: i64, receipt: NewReceipt) -> Result<Receipt>;
    fn delete(&self, id: i64) -> Result<()>;
    fn get(&self, id: i64) -> Result<Option<Receipt>>;
    /// All of a user's receipts matching `filter`, most recent first
    fn find_by_user(&self, user_id: &str, filter: &ReceiptFilter) -> Result<Vec<Receipt>>;
}

/// Blob storage for receipt images
pub trait ImageStore {
    /// Store the blob and return its content-addressed path
    fn put(&self, bytes: &[u8], extension: &str) -> Result<String>;
    fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;
}

/// Content-addressed path for a receipt image
///
/// Re-uploading identical bytes maps to the same path, so duplicate
/// uploads cost no extra storage.
pub fn hashed_image_path(bytes: &[u8], extension: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hex::encode(hasher.finalize());
    format!("receipts/{}.{}", digest, extension.trim_start_matches('.'))
}

struct MemoryStoreInner {
    receipts: Vec<Receipt>,
    next_id: i64,
}

/// In-memory [`ReceiptStore`] used by tests and local development
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryStoreInner {
                receipts: Vec::new(),
                next_id: 1,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ReceiptStore for MemoryStore {
    fn insert(&self, receipt: NewReceipt) -> Result<Receipt> {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let stored = Receipt {
            id,
            user_id: receipt.user_id,
            store: receipt.store,
            date: receipt.date,
            total: receipt.total,
            tax: receipt.tax,
            status: receipt.status,
            anomaly_flags: receipt.anomaly_flags,
            image_path: receipt.image_path,
            ocr_confidence: receipt.ocr_confidence,
            raw_text: receipt.raw_text,
            items: receipt.items,
            created_at: Utc::now(),
        };
        inner.receipts.push(stored.clone());
        Ok(stored)
    }

    fn update(&self, id: i64, receipt: NewReceipt) -> Result<Receipt> {
        let mut inner = self.lock();
        let stored = inner
            .receipts
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("Receipt {} not found", id)))?;

        stored.user_id = receipt.user_id;
        stored.store = receipt.store;
        stored.date = receipt.date;
        stored.total = receipt.total;
        stored.tax = receipt.tax;
        stored.status = receipt.status;
        stored.anomaly_flags = receipt.anomaly_flags;
        stored.image_path = receipt.image_path;
        stored.ocr_confidence = receipt.ocr_confidence;
        stored.raw_text = receipt.raw_text;
        stored.items = receipt.items;
        Ok(stored.clone())
    }

    fn delete(&self, id: i64) -> Result<()> {
        let mut inner = self.lock();
        let before = inner.receipts.len();
        inner.receipts.retain(|r| r.id != id);
        if inner.receipts.len() == before {
            return Err(Error::NotFound(format!("Receipt {} not found", id)));
        }
        Ok(())
    }

    fn get(&self, id: i64) -> Result<Option<Receipt>> {
        let inner = self.lock();
        Ok(inner.receipts.iter().find(|r| r.id == id).cloned())
    }

    fn find_by_user(&self, user_id: &str, filter: &ReceiptFilter) -> Result<Vec<Receipt>> {
        let inner = self.lock();
        let mut matches: Vec<Receipt> = inner
            .receipts
            .iter()
            .filter(|r| r.user_id == user_id)
            .filter(|r| match &filter.category_id {
                Some(category_id) => r.items.iter().any(|i| &i.category_id == category_id),
                None => true,
            })
            .filter(|r| filter.date_from.map_or(true, |from| r.date >= from))
            .filter(|r| filter.date_to.map_or(true, |to| r.date <= to))
            .filter(|r| match &filter.store_contains {
                Some(needle) => r.store.to_lowercase().contains(&needle.to_lowercase()),
                None => true,
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(matches)
    }
}

/// In-memory [`ImageStore`] keyed by content hash
#[derive(Default)]
pub struct MemoryImageStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImageStore for MemoryImageStore {
    fn put(&self, bytes: &[u8], extension: &str) -> Result<String> {
        let path = hashed_image_path(bytes, extension);
        let mut blobs = self
            .blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        blobs.insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self
            .blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(blobs.get(path).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReceiptItem, ReceiptStatus};

    fn new_receipt(user_id: &str, store: &str, date: (i32, u32, u32), total: f64) -> NewReceipt {
        NewReceipt {
            user_id: user_id.to_string(),
            store: store.to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            total,
            tax: 0.0,
            status: ReceiptStatus::Processed,
            anomaly_flags: Vec::new(),
            image_path: None,
            ocr_confidence: Some(0.9),
            raw_text: String::new(),
            items: Vec::new(),
        }
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let first = store.insert(new_receipt("u1", "Shop", (2024, 1, 1), 10.0)).unwrap();
        let second = store.insert(new_receipt("u1", "Shop", (2024, 1, 2), 20.0)).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[test]
    fn test_get_returns_none_for_unknown_id() {
        let store = MemoryStore::new();
        assert!(store.get(99).unwrap().is_none());
    }

    #[test]
    fn test_find_by_user_is_scoped_and_sorted() {
        let store = MemoryStore::new();
        store.insert(new_receipt("u1", "Older", (2024, 1, 1), 10.0)).unwrap();
        store.insert(new_receipt("u2", "Other User", (2024, 1, 5), 10.0)).unwrap();
        store.insert(new_receipt("u1", "Newer", (2024, 1, 9), 10.0)).unwrap();

        let receipts = store.find_by_user("u1", &ReceiptFilter::default()).unwrap();
        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].store, "Newer");
        assert_eq!(receipts[1].store, "Older");
    }

    #[test]
    fn test_same_date_orders_newest_insert_first() {
        let store = MemoryStore::new();
        store.insert(new_receipt("u1", "First", (2024, 1, 1), 10.0)).unwrap();
        store.insert(new_receipt("u1", "Second", (2024, 1, 1), 20.0)).unwrap();

        let receipts = store.find_by_user("u1", &ReceiptFilter::default()).unwrap();
        assert_eq!(receipts[0].store, "Second");
    }

    #[test]
    fn test_filter_by_date_range() {
        let store = MemoryStore::new();
        store.insert(new_receipt("u1", "Early", (2024, 1, 1), 10.0)).unwrap();
        store.insert(new_receipt("u1", "Mid", (2024, 1, 15), 10.0)).unwrap();
        store.insert(new_receipt("u1", "Late", (2024, 2, 1), 10.0)).unwrap();

        let filter = ReceiptFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 1, 10),
            date_to: NaiveDate::from_ymd_opt(2024, 1, 31),
            ..ReceiptFilter::default()
        };
        let receipts = store.find_by_user("u1", &filter).unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].store, "Mid");
    }

    #[test]
    fn test_filter_by_store_substring_ignores_case() {
        let store = MemoryStore::new();
        store.insert(new_receipt("u1", "Joe's Cafe", (2024, 1, 1), 10.0)).unwrap();
        store.insert(new_receipt("u1", "Mega Mart", (2024, 1, 2), 10.0)).unwrap();

        let filter = ReceiptFilter {
            store_contains: Some("joe".to_string()),
            ..ReceiptFilter::default()
        };
        let receipts = store.find_by_user("u1", &filter).unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].store, "Joe's Cafe");
    }

    #[test]
    fn test_filter_by_item_category() {
        let store = MemoryStore::new();
        let mut groceries = new_receipt("u1", "Mega Mart", (2024, 1, 1), 3.0);
        let mut item = ReceiptItem::new("Milk", 1.0, 3.0, 3.0);
        item.category_id = "groceries".to_string();
        groceries.items.push(item);
        store.insert(groceries).unwrap();
        store.insert(new_receipt("u1", "Joe's Cafe", (2024, 1, 2), 6.0)).unwrap();

        let filter = ReceiptFilter {
            category_id: Some("groceries".to_string()),
            ..ReceiptFilter::default()
        };
        let receipts = store.find_by_user("u1", &filter).unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].store, "Mega Mart");
    }

    #[test]
    fn test_update_replaces_fields_keeps_identity() {
        let store = MemoryStore::new();
        let saved = store.insert(new_receipt("u1", "Shop", (2024, 1, 1), 10.0)).unwrap();

        let updated = store
            .update(saved.id, new_receipt("u1", "Shop Corrected", (2024, 1, 2), 12.0))
            .unwrap();

        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.created_at, saved.created_at);
        assert_eq!(updated.store, "Shop Corrected");
        assert_eq!(updated.total, 12.0);
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update(7, new_receipt("u1", "Shop", (2024, 1, 1), 10.0))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_delete_removes_receipt() {
        let store = MemoryStore::new();
        let saved = store.insert(new_receipt("u1", "Shop", (2024, 1, 1), 10.0)).unwrap();
        store.delete(saved.id).unwrap();
        assert!(store.get(saved.id).unwrap().is_none());
        assert!(matches!(store.delete(saved.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_hashed_image_path_is_stable_and_hex() {
        let path = hashed_image_path(b"fake jpeg bytes", "jpg");
        assert_eq!(path, hashed_image_path(b"fake jpeg bytes", "jpg"));
        assert!(path.starts_with("receipts/"));
        assert!(path.ends_with(".jpg"));
        let digest = &path["receipts/".len()..path.len() - ".jpg".len()];
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_image_store_round_trip_and_dedup() {
        let images = MemoryImageStore::new();
        let first = images.put(b"same bytes", ".png").unwrap();
        let second = images.put(b"same bytes", "png").unwrap();
        assert_eq!(first, second);
        assert_eq!(images.get(&first).unwrap().unwrap(), b"same bytes");
        assert!(images.get("receipts/missing.png").unwrap().is_none());
    }
}
