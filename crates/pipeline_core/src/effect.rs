use std::time::Duration;

use crate::{
    CompletionNotice, DedupeOutcome, JobHandle, PipelineStats, ProgressSnapshot, StageKind,
    StartParams,
};

/// IO the host must perform after an `update`.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartJob { params: StartParams },
    /// Fetch the job's status once `delay` has elapsed.
    SchedulePoll { handle: JobHandle, delay: Duration },
    CancelPoll { stage: StageKind },
    StopJob { handle: JobHandle },
    /// Look up the job's target total in the aggregate stats.
    ResolveTarget { handle: JobHandle },
    RefreshStats,
    DedupeAttachments,
    Emit(Event),
}

/// Notifications for the hosting application.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Progress {
        stage: StageKind,
        snapshot: ProgressSnapshot,
        percent: u8,
    },
    StageFinished(CompletionNotice),
    StageError {
        stage: StageKind,
        message: String,
    },
    /// Some stage finished; aggregate counters are being refreshed.
    ActivityChanged,
    StatsUpdated(PipelineStats),
    DedupeFinished(Result<DedupeOutcome, String>),
    /// A dedupe request arrived while one was still running.
    DedupeRejected(String),
}
