//! Save-time workflow
//!
//! Runs anomaly detection against the owner's history, rejects
//! duplicates with a message naming the conflicting receipt, enforces
//! ownership on edits and deletes, and derives the workflow status
//! from whatever flags remain.
//!
//! The duplicate check reads history and then writes; two concurrent
//! saves of the same receipt can both pass it. The worst case is one
//! extra receipt the owner deletes by hand, which is not worth a
//! store-level lock.

use tracing::{info, warn};

use crate::anomaly::AnomalyDetector;
use crate::error::{Error, Result};
use crate::models::{AnomalyFlag, NewReceipt, NormalizedReceipt, Receipt, SaveMode};
use crate::store::{ReceiptFilter, ReceiptStore};

/// Why a save, edit, or delete was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Duplicate,
    PermissionDenied,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Duplicate => "duplicate",
            RejectReason::PermissionDenied => "permission_denied",
        }
    }
}

/// Outcome of a save, edit, or delete attempt
///
/// Rejection is a normal workflow answer, not an error: the store was
/// reachable and made a decision.
#[derive(Debug, Clone)]
pub enum SaveOutcome {
    /// The record as saved, updated, or removed
    Accepted(Receipt),
    Rejected {
        reason: RejectReason,
        message: String,
    },
}

pub struct ReceiptSaver<'a> {
    store: &'a dyn ReceiptStore,
    detector: AnomalyDetector,
}

impl<'a> ReceiptSaver<'a> {
    pub fn new(store: &'a dyn ReceiptStore) -> Self {
        Self {
            store,
            detector: AnomalyDetector::new(),
        }
    }

    pub fn with_detector(store: &'a dyn ReceiptStore, detector: AnomalyDetector) -> Self {
        Self { store, detector }
    }

    /// Save a newly assembled receipt for `user_id`
    ///
    /// A duplicate is rejected before anything is written; every other
    /// anomaly is recorded on the receipt and flagged for review.
    pub fn save_new(
        &self,
        user_id: &str,
        receipt: &NormalizedReceipt,
        image_path: Option<String>,
    ) -> Result<SaveOutcome> {
        let history = self.store.find_by_user(user_id, &ReceiptFilter::default())?;
        let flags = self.detector.detect(receipt, &history, SaveMode::Create);

        if flags.contains(&AnomalyFlag::Duplicate) {
            let message = match self.detector.duplicate_of(receipt, &history) {
                Some(prior) => format!(
                    "Duplicate of receipt {}: {} on {} for {:.2}",
                    prior.id, prior.store, prior.date, prior.total
                ),
                None => "Duplicate of an existing receipt".to_string(),
            };
            warn!(user_id, store = %receipt.store, "rejected duplicate receipt");
            return Ok(SaveOutcome::Rejected {
                reason: RejectReason::Duplicate,
                message,
            });
        }

        let record = NewReceipt::from_normalized(user_id, receipt, image_path, flags);
        let saved = self.store.insert(record)?;
        info!(id = saved.id, user_id, "receipt saved");
        Ok(SaveOutcome::Accepted(saved))
    }

    /// Save even when the receipt duplicates an earlier one
    ///
    /// Used after the owner has seen the duplicate warning and
    /// confirmed the purchase really happened twice. The duplicate
    /// flag stays on the record.
    pub fn save_new_confirmed(
        &self,
        user_id: &str,
        receipt: &NormalizedReceipt,
        image_path: Option<String>,
    ) -> Result<SaveOutcome> {
        let history = self.store.find_by_user(user_id, &ReceiptFilter::default())?;
        let flags = self.detector.detect(receipt, &history, SaveMode::Create);

        let record = NewReceipt::from_normalized(user_id, receipt, image_path, flags);
        let saved = self.store.insert(record)?;
        info!(id = saved.id, user_id, "receipt saved past duplicate warning");
        Ok(SaveOutcome::Accepted(saved))
    }

    /// Replace a stored receipt with a corrected version
    ///
    /// Duplicate and spike keep their save-time verdicts; re-running
    /// them against history that now includes this receipt would flag
    /// every edit as its own duplicate. OCR confidence and tax are
    /// recomputed from the corrected fields.
    pub fn update_existing(
        &self,
        user_id: &str,
        id: i64,
        receipt: &NormalizedReceipt,
    ) -> Result<SaveOutcome> {
        let stored = self
            .store
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("Receipt {} not found", id)))?;

        if stored.user_id != user_id {
            warn!(user_id, id, "rejected edit of another user's receipt");
            return Ok(SaveOutcome::Rejected {
                reason: RejectReason::PermissionDenied,
                message: format!("Receipt {} belongs to another user", id),
            });
        }

        let mut flags: Vec<AnomalyFlag> = stored
            .anomaly_flags
            .iter()
            .copied()
            .filter(|flag| matches!(flag, AnomalyFlag::Duplicate | AnomalyFlag::Spike))
            .collect();
        flags.extend(self.detector.detect(receipt, &[], SaveMode::Edit));

        let record = NewReceipt::from_normalized(user_id, receipt, stored.image_path.clone(), flags);
        let updated = self.store.update(id, record)?;
        info!(id, user_id, "receipt updated");
        Ok(SaveOutcome::Accepted(updated))
    }

    /// Remove a stored receipt the user owns
    pub fn delete_existing(&self, user_id: &str, id: i64) -> Result<SaveOutcome> {
        let stored = self
            .store
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("Receipt {} not found", id)))?;

        if stored.user_id != user_id {
            warn!(user_id, id, "rejected delete of another user's receipt");
            return Ok(SaveOutcome::Rejected {
                reason: RejectReason::PermissionDenied,
                message: format!("Receipt {} belongs to another user", id),
            });
        }

        self.store.delete(id)?;
        info!(id, user_id, "receipt deleted");
        Ok(SaveOutcome::Accepted(stored))
    }
}
