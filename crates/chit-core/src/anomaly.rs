//! Receipt anomaly detection
//!
//! Four independent rules evaluated over a candidate receipt and the
//! owner's recent history:
//! - Duplicate: same store, same date, total within tolerance
//! - Spike: total far above the recent average
//! - OCR mismatch: engine reported low confidence
//! - Tax mismatch: effective tax rate outside the plausible band
//!
//! Detection runs once at save time against the then-current history.
//! Flags are not recomputed when later receipts arrive.

use tracing::debug;

use crate::models::{AnomalyFlag, NormalizedReceipt, Receipt, SaveMode};

/// Detection configuration
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// OCR confidence below this flags ocr_mismatch
    pub confidence_floor: f64,
    /// Effective tax rate below this percentage flags tax_mismatch
    pub tax_rate_min_percent: f64,
    /// Effective tax rate above this percentage flags tax_mismatch
    pub tax_rate_max_percent: f64,
    /// Candidate total must exceed the window mean times this to flag a spike
    pub spike_multiplier: f64,
    /// How many of the most recent receipts form the comparison window
    pub history_window: usize,
    /// The spike rule needs strictly more than this many receipts in the window
    pub spike_min_history: usize,
    /// Duplicate totals may differ by up to this many currency units
    pub duplicate_tolerance: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.70,   // OCR under 70% is suspect
            tax_rate_min_percent: 5.0,
            tax_rate_max_percent: 30.0,
            spike_multiplier: 3.0,    // 3x the recent mean
            history_window: 20,       // most recent 20 receipts
            spike_min_history: 5,     // strictly more than 5 to compare
            duplicate_tolerance: 1.0, // within one currency unit
        }
    }
}

/// Rule-based anomaly detector
///
/// Pure over its inputs: same candidate, same history snapshot, same
/// flags.
pub struct AnomalyDetector {
    config: DetectorConfig,
}

impl AnomalyDetector {
    pub fn new() -> Self {
        Self {
            config: DetectorConfig::default(),
        }
    }

    pub fn with_config(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Evaluate all rules and union the results
    ///
    /// `history` holds the owner's stored receipts, most recent first.
    /// Duplicate and spike only run in `SaveMode::Create`; an edited
    /// receipt keeps its original duplicate/spike status unless the
    /// caller re-evaluates.
    pub fn detect(
        &self,
        candidate: &NormalizedReceipt,
        history: &[Receipt],
        mode: SaveMode,
    ) -> Vec<AnomalyFlag> {
        let window = &history[..history.len().min(self.config.history_window)];
        let mut flags = Vec::new();

        if mode == SaveMode::Create {
            if self.is_duplicate(candidate, history) {
                flags.push(AnomalyFlag::Duplicate);
            }
            if self.is_spike(candidate, window) {
                flags.push(AnomalyFlag::Spike);
            }
        }
        if self.is_low_confidence(candidate) {
            flags.push(AnomalyFlag::OcrMismatch);
        }
        if self.is_tax_outlier(candidate) {
            flags.push(AnomalyFlag::TaxMismatch);
        }

        if !flags.is_empty() {
            debug!(store = %candidate.store, ?flags, "anomalies detected");
        }
        flags
    }

    /// First stored receipt the candidate duplicates, if any
    ///
    /// Same store name, same date, total within tolerance.
    pub fn duplicate_of<'h>(
        &self,
        candidate: &NormalizedReceipt,
        history: &'h [Receipt],
    ) -> Option<&'h Receipt> {
        history.iter().find(|prior| {
            prior.store == candidate.store
                && prior.date == candidate.date
                && (prior.total - candidate.total).abs() <= self.config.duplicate_tolerance
        })
    }

    fn is_duplicate(&self, candidate: &NormalizedReceipt, history: &[Receipt]) -> bool {
        self.duplicate_of(candidate, history).is_some()
    }

    /// Total more than `spike_multiplier` times the window mean
    fn is_spike(&self, candidate: &NormalizedReceipt, window: &[Receipt]) -> bool {
        if window.len() <= self.config.spike_min_history {
            return false;
        }
        let average = mean(window.iter().map(|r| r.total));
        candidate.total > self.config.spike_multiplier * average
    }

    fn is_low_confidence(&self, candidate: &NormalizedReceipt) -> bool {
        matches!(candidate.confidence, Some(c) if c < self.config.confidence_floor)
    }

    /// Effective rate below the minimum or above the maximum
    ///
    /// Zero tax is not an outlier: plenty of receipts are untaxed.
    fn is_tax_outlier(&self, candidate: &NormalizedReceipt) -> bool {
        let subtotal = candidate.total - candidate.tax;
        if subtotal <= 0.0 {
            return false;
        }
        let rate = candidate.tax / subtotal * 100.0;
        rate > 0.0
            && (rate < self.config.tax_rate_min_percent || rate > self.config.tax_rate_max_percent)
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Arithmetic mean; zero for an empty iterator
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
