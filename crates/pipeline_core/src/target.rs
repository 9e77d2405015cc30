//! Target totals: what a job is expected to process, and which source wins.
use crate::{PipelineStats, StageKind};

/// How the target total of a freshly started job gets determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRequest {
    /// The caller gave a positive limit; no lookup needed.
    Immediate(u64),
    /// Ask the aggregate stats endpoint for the stage's backlog.
    FromStats,
}

pub fn resolve(explicit_limit: Option<u64>) -> TargetRequest {
    match explicit_limit {
        Some(limit) if limit > 0 => TargetRequest::Immediate(limit),
        _ => TargetRequest::FromStats,
    }
}

/// The backlog counter that stands in for a stage's total.
pub fn total_from_stats(stage: StageKind, stats: &PipelineStats) -> Option<u64> {
    let total = match stage {
        StageKind::PdfProcessing => Some(stats.missing_pdfs),
        StageKind::Summarization => Some(stats.missing_summary),
        StageKind::Embedding => {
            let embedded = stats
                .embed_estimate
                .as_ref()
                .map_or(0, |estimate| estimate.embedded_count);
            stats
                .chunks_total
                .map(|chunks| chunks.saturating_sub(embedded))
        }
    };
    total.filter(|total| *total > 0)
}

/// Where the displayed total came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalSource {
    Poll,
    Resolver,
    ProcessedFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    Applied,
    /// A poll already reported a total; the poll stays authoritative.
    SupersededByPoll,
    /// The job already had a resolution.
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Pending,
    Resolved(Option<u64>),
}

/// Target bookkeeping owned by one active job and dropped with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JobTarget {
    resolution: Resolution,
    poll_total: Option<u64>,
}

impl JobTarget {
    pub(crate) fn new(request: TargetRequest) -> Self {
        let resolution = match request {
            TargetRequest::Immediate(limit) => Resolution::Resolved(Some(limit)),
            TargetRequest::FromStats => Resolution::Pending,
        };
        Self {
            resolution,
            poll_total: None,
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.resolution == Resolution::Pending
    }

    /// Records a poll-reported total; a poll without one keeps the last seen.
    pub(crate) fn observe_poll(&mut self, reported: Option<u64>) {
        if reported.is_some() {
            self.poll_total = reported;
        }
    }

    pub(crate) fn land(&mut self, total: Option<u64>) -> Landing {
        if !self.is_pending() {
            return Landing::Duplicate;
        }
        if self.poll_total.is_some() {
            self.resolution = Resolution::Resolved(None);
            return Landing::SupersededByPoll;
        }
        self.resolution = Resolution::Resolved(total.filter(|total| *total > 0));
        Landing::Applied
    }

    /// `poll total`, else `resolved total`, else (once finished) the
    /// processed count so a finished job never shows an unknown total.
    pub(crate) fn effective(&self, processed: u64, finished: bool) -> Option<(u64, TotalSource)> {
        if let Some(total) = self.poll_total {
            return Some((total, TotalSource::Poll));
        }
        if let Resolution::Resolved(Some(total)) = self.resolution {
            return Some((total, TotalSource::Resolver));
        }
        if finished && processed > 0 {
            return Some((processed, TotalSource::ProcessedFallback));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EmbedEstimate;

    #[test]
    fn positive_limit_resolves_immediately() {
        assert_eq!(resolve(Some(5)), TargetRequest::Immediate(5));
        assert_eq!(resolve(Some(0)), TargetRequest::FromStats);
        assert_eq!(resolve(None), TargetRequest::FromStats);
    }

    #[test]
    fn stats_backlog_per_stage() {
        let stats = PipelineStats {
            missing_pdfs: 7,
            missing_summary: 42,
            chunks_total: Some(100),
            embed_estimate: Some(EmbedEstimate {
                persist_dir: "./chroma_store".to_string(),
                collection: "paper_chunks".to_string(),
                embedded_count: 60,
            }),
            ..PipelineStats::default()
        };
        assert_eq!(total_from_stats(StageKind::PdfProcessing, &stats), Some(7));
        assert_eq!(total_from_stats(StageKind::Summarization, &stats), Some(42));
        assert_eq!(total_from_stats(StageKind::Embedding, &stats), Some(40));
        assert_eq!(
            total_from_stats(StageKind::Embedding, &PipelineStats::default()),
            None
        );
    }

    #[test]
    fn poll_total_beats_resolver() {
        let mut target = JobTarget::new(TargetRequest::FromStats);
        assert_eq!(target.land(Some(42)), Landing::Applied);
        assert_eq!(target.effective(3, false), Some((42, TotalSource::Resolver)));

        target.observe_poll(Some(50));
        assert_eq!(target.effective(3, false), Some((50, TotalSource::Poll)));

        target.observe_poll(None);
        assert_eq!(target.effective(4, false), Some((50, TotalSource::Poll)));
    }

    #[test]
    fn late_resolution_is_discarded_once_poll_reported() {
        let mut target = JobTarget::new(TargetRequest::FromStats);
        target.observe_poll(Some(9));
        assert_eq!(target.land(Some(42)), Landing::SupersededByPoll);
        assert_eq!(target.effective(1, false), Some((9, TotalSource::Poll)));
        assert_eq!(target.land(Some(42)), Landing::Duplicate);
    }

    #[test]
    fn processed_fallback_only_when_finished() {
        let target = JobTarget::new(TargetRequest::FromStats);
        assert_eq!(target.effective(6, false), None);
        assert_eq!(
            target.effective(6, true),
            Some((6, TotalSource::ProcessedFallback))
        );
        assert_eq!(target.effective(0, true), None);
    }
}
