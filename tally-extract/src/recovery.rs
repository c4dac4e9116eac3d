//! Second-pass recovery: when the first OCR pass yields too few rows, a
//! second enhanced pass runs and its rows are merged in with fuzzy dedup.
//! Both passes are merged as parsed, before any correction rewrites
//! descriptions.

use serde::{Deserialize, Serialize};
use tally_core::{Transaction, similarity};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryPolicy {
    pub enabled: bool,
    /// Total OCR passes, the first one included
    pub max_passes: u32,
    /// A first pass with more rows than this is good enough
    pub adequate_count: usize,
    pub duplicate_amount_tolerance: f64,
    /// Lowercased descriptions more similar than this are the same row
    pub description_similarity: f64,
    pub recovered_confidence: f64,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_passes: 2,
            adequate_count: 5,
            duplicate_amount_tolerance: 0.02,
            description_similarity: 0.8,
            recovered_confidence: 0.7,
        }
    }
}

impl RecoveryPolicy {
    pub fn needs_recovery(&self, count: usize) -> bool {
        self.enabled && self.max_passes > 1 && count <= self.adequate_count
    }

    /// Same date and amount, or near-identical descriptions. Rows whose
    /// description OCR lost are only ever matched on date and amount.
    pub fn is_duplicate(&self, a: &Transaction, b: &Transaction) -> bool {
        let same_row = a.date == b.date
            && (a.amount - b.amount).abs() < self.duplicate_amount_tolerance;
        if same_row {
            return true;
        }
        has_text(&a.description)
            && has_text(&b.description)
            && similarity(&a.description.to_lowercase(), &b.description.to_lowercase())
                > self.description_similarity
    }
}

fn has_text(description: &str) -> bool {
    description.chars().any(char::is_alphabetic)
}

/// Merge the recovery pass into the first pass.
///
/// Each recovered row is checked against the first-pass rows only. Rows with
/// no duplicate are appended, tagged `recovered` with the policy confidence.
/// The merged list is sorted by date, undated rows last.
pub fn merge_passes(
    original: Vec<Transaction>,
    recovered: Vec<Transaction>,
    policy: &RecoveryPolicy,
) -> (Vec<Transaction>, usize) {
    let mut additions = Vec::new();
    for mut candidate in recovered {
        if original.iter().any(|o| policy.is_duplicate(o, &candidate)) {
            debug!(description = %candidate.description, "recovered row already present");
            continue;
        }
        candidate.recovered = true;
        candidate.confidence = Some(policy.recovered_confidence);
        additions.push(candidate);
    }

    let added = additions.len();
    let mut merged = original;
    merged.extend(additions);
    merged.sort_by_key(|t| (t.date.is_none(), t.date));
    (merged, added)
}
