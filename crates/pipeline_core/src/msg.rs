use crate::{DedupeOutcome, JobStatus, PipelineStats, StageKind, StartParams};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Host asked to start a stage.
    StartRequested(StartParams),
    /// Worker accepted the start request.
    JobStarted { stage: StageKind, job_id: String },
    /// Start request failed; no job exists.
    StartFailed { stage: StageKind, error: String },
    /// A status poll answered.
    StatusReceived {
        stage: StageKind,
        job_id: String,
        status: JobStatus,
    },
    /// A status poll failed in transport.
    StatusFailed {
        stage: StageKind,
        job_id: String,
        error: String,
    },
    /// Host asked to stop a stage.
    StopRequested(StageKind),
    StopConfirmed { stage: StageKind, job_id: String },
    StopFailed {
        stage: StageKind,
        job_id: String,
        error: String,
    },
    /// Target lookup finished; `None` when the stats had no usable count.
    TargetResolved {
        stage: StageKind,
        job_id: String,
        total: Option<u64>,
    },
    RefreshStatsRequested,
    StatsRefreshed(PipelineStats),
    StatsFailed(String),
    DedupeRequested,
    DedupeFinished(Result<DedupeOutcome, String>),
}
