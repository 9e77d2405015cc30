use crate::view_model::{PipelineViewModel, StageView};
use crate::{
    DedupeOutcome, JobHandle, PipelineStats, PollPolicy, StageError, StageKind, StagePoller,
    StartParams,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DedupeState {
    #[default]
    Idle,
    Running,
    Done(DedupeOutcome),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("attachment dedupe is already running")]
pub struct DedupeInFlight;

/// The three stage pollers plus the state they share.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    pollers: [StagePoller; 3],
    policy: PollPolicy,
    stats: Option<PipelineStats>,
    stats_error: Option<String>,
    dedupe: DedupeState,
    dirty: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::with_policy(PollPolicy::default())
    }
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: PollPolicy) -> Self {
        Self {
            pollers: StageKind::ALL.map(StagePoller::new),
            policy,
            stats: None,
            stats_error: None,
            dedupe: DedupeState::Idle,
            dirty: false,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn poller(&self, stage: StageKind) -> &StagePoller {
        &self.pollers[stage.index()]
    }

    pub(crate) fn poller_mut(&mut self, stage: StageKind) -> &mut StagePoller {
        &mut self.pollers[stage.index()]
    }

    pub fn stats(&self) -> Option<&PipelineStats> {
        self.stats.as_ref()
    }

    pub fn dedupe(&self) -> &DedupeState {
        &self.dedupe
    }

    /// Claims the stage for a new job. Only one job per stage at a time.
    pub fn request_start(&mut self, params: &StartParams) -> Result<(), StageError> {
        self.poller_mut(params.stage()).begin_start(params)?;
        self.mark_dirty();
        Ok(())
    }

    pub fn request_stop(&self, stage: StageKind) -> Result<JobHandle, StageError> {
        self.poller(stage).begin_stop()
    }

    pub fn request_dedupe(&mut self) -> Result<(), DedupeInFlight> {
        if self.dedupe == DedupeState::Running {
            return Err(DedupeInFlight);
        }
        self.dedupe = DedupeState::Running;
        self.mark_dirty();
        Ok(())
    }

    pub(crate) fn set_stats(&mut self, stats: PipelineStats) {
        self.stats = Some(stats);
        self.stats_error = None;
        self.mark_dirty();
    }

    pub(crate) fn set_stats_error(&mut self, error: String) {
        self.stats_error = Some(error);
        self.mark_dirty();
    }

    pub(crate) fn finish_dedupe(&mut self, result: &Result<DedupeOutcome, String>) {
        self.dedupe = match result {
            Ok(outcome) => DedupeState::Done(outcome.clone()),
            Err(error) => DedupeState::Failed(error.clone()),
        };
        self.mark_dirty();
    }

    pub fn view(&self) -> PipelineViewModel {
        PipelineViewModel {
            stages: self.pollers.iter().map(StageView::from_poller).collect(),
            stats: self.stats.clone(),
            stats_error: self.stats_error.clone(),
            dedupe: self.dedupe.clone(),
            dirty: self.dirty,
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
