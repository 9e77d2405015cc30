use crate::{DedupeState, PipelineStats, StageKind, StagePoller, StageRunState, TotalSource};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineViewModel {
    pub stages: Vec<StageView>,
    pub stats: Option<PipelineStats>,
    pub stats_error: Option<String>,
    pub dedupe: DedupeState,
    pub dirty: bool,
}

impl PipelineViewModel {
    pub fn stage(&self, stage: StageKind) -> Option<&StageView> {
        self.stages.iter().find(|view| view.stage == stage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageView {
    pub stage: StageKind,
    pub run_state: StageRunState,
    pub job_id: Option<String>,
    pub processed: u64,
    pub total: Option<u64>,
    pub total_source: Option<TotalSource>,
    pub skipped: u64,
    pub errors: u64,
    pub percent: u8,
    pub last_error: Option<String>,
    pub last_message: Option<String>,
}

impl StageView {
    pub(crate) fn from_poller(poller: &StagePoller) -> Self {
        let progress = poller.progress();
        Self {
            stage: poller.stage(),
            run_state: poller.run_state(),
            job_id: poller.job_handle().map(|handle| handle.job_id.clone()),
            processed: progress.processed,
            total: progress.total,
            total_source: poller.total_source(),
            skipped: progress.skipped,
            errors: progress.errors,
            percent: poller.percent(),
            last_error: poller.last_error().map(ToOwned::to_owned),
            last_message: poller.last_message().map(ToOwned::to_owned),
        }
    }
}
