//! Normalization of per-stage worker counters into a common snapshot.
use serde_json::Value;

use crate::StageKind;

/// Counts shown for a stage, refreshed once per successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub processed: u64,
    pub total: Option<u64>,
    pub skipped: u64,
    pub errors: u64,
}

impl ProgressSnapshot {
    /// Whole-number completion percentage in `0..=100`.
    ///
    /// Embedding counts skipped chunks as handled; the other stages count
    /// only processed items. An absent or zero total yields 0.
    pub fn percent(&self, stage: StageKind) -> u8 {
        let total = match self.total {
            Some(total) if total > 0 => total,
            _ => return 0,
        };
        let done = match stage {
            StageKind::Embedding => self.processed.saturating_add(self.skipped),
            StageKind::PdfProcessing | StageKind::Summarization => self.processed,
        };
        let pct = u128::from(done) * 100 / u128::from(total);
        pct.min(100) as u8
    }
}

/// Stage-specific counters as reported in a status payload's `stats` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawCounts {
    pub processed: u64,
    /// Total the worker reported; zero means the worker does not know yet.
    pub reported_total: Option<u64>,
    pub skipped: u64,
    pub errors: u64,
}

impl RawCounts {
    /// Reads the field names each stage's worker uses.
    pub fn from_stats(stage: StageKind, stats: &Value) -> Self {
        let (processed, total, skipped) = match stage {
            StageKind::PdfProcessing => (
                count(stats, "processed_pdfs"),
                count(stats, "total_pdfs"),
                count(stats, "skipped"),
            ),
            StageKind::Embedding => (
                count(stats, "embedded"),
                count(stats, "total_chunks"),
                count(stats, "embedded_skipped"),
            ),
            StageKind::Summarization => (
                count(stats, "processed_papers").or_else(|| count(stats, "processed")),
                count(stats, "total_papers"),
                count(stats, "skipped"),
            ),
        };

        Self {
            processed: processed.unwrap_or(0),
            reported_total: total.filter(|total| *total > 0),
            skipped: skipped.unwrap_or(0),
            errors: count(stats, "errors").unwrap_or(0),
        }
    }
}

fn count(stats: &Value, key: &str) -> Option<u64> {
    let value = stats.get(key)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
}
