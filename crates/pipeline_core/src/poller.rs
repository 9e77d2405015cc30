use std::mem;
use std::time::Duration;

use crate::progress::RawCounts;
use crate::target::{self, JobTarget, Landing, TargetRequest, TotalSource};
use crate::{Effect, Event, JobHandle, JobStatus, ProgressSnapshot, StageKind, StartParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageRunState {
    #[default]
    Idle,
    Starting,
    Running,
    Succeeded,
    Failed,
    Stopped,
}

impl StageRunState {
    pub fn is_active(self) -> bool {
        matches!(self, StageRunState::Starting | StageRunState::Running)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StageRunState::Succeeded | StageRunState::Failed | StageRunState::Stopped
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
    Stopped,
}

impl Outcome {
    fn run_state(self) -> StageRunState {
        match self {
            Outcome::Succeeded => StageRunState::Succeeded,
            Outcome::Failed => StageRunState::Failed,
            Outcome::Stopped => StageRunState::Stopped,
        }
    }
}

/// Emitted once per job when it reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionNotice {
    pub stage: StageKind,
    pub job_id: String,
    pub outcome: Outcome,
    pub final_progress: ProgressSnapshot,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("{0} job is already running")]
    AlreadyRunning(StageKind),
    #[error("{0} has no running job")]
    NotRunning(StageKind),
}

/// Poll cadence and what to do when status requests keep failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Doubles the retry delay per consecutive failure, up to this cap.
    pub max_backoff: Option<Duration>,
    /// Fails the stage after this many consecutive failed polls.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_backoff: None,
            max_consecutive_failures: None,
        }
    }
}

impl PollPolicy {
    pub fn retry_delay(&self, consecutive_failures: u32) -> Duration {
        let Some(cap) = self.max_backoff else {
            return self.interval;
        };
        let shift = consecutive_failures.saturating_sub(1).min(16);
        self.interval
            .checked_mul(1 << shift)
            .unwrap_or(cap)
            .min(cap)
            .max(self.interval)
    }
}

/// Redeemable once; moves with the job so a finished job cannot notify again.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CompletionToken {
    handle: JobHandle,
}

impl CompletionToken {
    fn redeem(
        self,
        outcome: Outcome,
        final_progress: ProgressSnapshot,
        error: Option<String>,
    ) -> CompletionNotice {
        CompletionNotice {
            stage: self.handle.stage,
            job_id: self.handle.job_id,
            outcome,
            final_progress,
            error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Liveness {
    Starting,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveJob {
    handle: JobHandle,
    liveness: Liveness,
    target: JobTarget,
    token: CompletionToken,
    consecutive_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Start request issued, no job id yet. Reported as Idle.
    Launching { target: TargetRequest },
    Active(ActiveJob),
    Finished { outcome: Outcome },
}

/// State machine for one stage's job lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePoller {
    stage: StageKind,
    phase: Phase,
    progress: ProgressSnapshot,
    total_source: Option<TotalSource>,
    last_error: Option<String>,
    last_message: Option<String>,
}

impl StagePoller {
    pub fn new(stage: StageKind) -> Self {
        Self {
            stage,
            phase: Phase::Idle,
            progress: ProgressSnapshot::default(),
            total_source: None,
            last_error: None,
            last_message: None,
        }
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    pub fn run_state(&self) -> StageRunState {
        match &self.phase {
            Phase::Idle | Phase::Launching { .. } => StageRunState::Idle,
            Phase::Active(job) => match job.liveness {
                Liveness::Starting => StageRunState::Starting,
                Liveness::Running => StageRunState::Running,
            },
            Phase::Finished { outcome } => outcome.run_state(),
        }
    }

    pub fn job_handle(&self) -> Option<&JobHandle> {
        match &self.phase {
            Phase::Active(job) => Some(&job.handle),
            _ => None,
        }
    }

    /// True while a start request is in flight or a job is active.
    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Launching { .. } | Phase::Active(_))
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress
    }

    pub fn percent(&self) -> u8 {
        self.progress.percent(self.stage)
    }

    pub fn total_source(&self) -> Option<TotalSource> {
        self.total_source
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    pub fn begin_start(&mut self, params: &StartParams) -> Result<(), StageError> {
        if self.is_busy() {
            return Err(StageError::AlreadyRunning(self.stage));
        }
        self.phase = Phase::Launching {
            target: target::resolve(params.explicit_limit()),
        };
        self.last_error = None;
        Ok(())
    }

    pub fn start_failed(&mut self, error: &str) -> Vec<Effect> {
        if !matches!(self.phase, Phase::Launching { .. }) {
            return Vec::new();
        }
        self.phase = Phase::Idle;
        self.last_error = Some(error.to_string());
        vec![Effect::Emit(Event::StageError {
            stage: self.stage,
            message: error.to_string(),
        })]
    }

    pub fn job_started(&mut self, job_id: String) -> Vec<Effect> {
        let Phase::Launching { target } = self.phase else {
            return Vec::new();
        };
        let handle = JobHandle {
            stage: self.stage,
            job_id,
        };
        let job = ActiveJob {
            handle: handle.clone(),
            liveness: Liveness::Starting,
            target: JobTarget::new(target),
            token: CompletionToken {
                handle: handle.clone(),
            },
            consecutive_failures: 0,
        };
        let resolve_pending = job.target.is_pending();
        self.phase = Phase::Active(job);
        self.last_message = None;
        self.apply_counts(RawCounts::default(), false);

        let mut effects = vec![
            self.progress_event(),
            Effect::SchedulePoll {
                handle: handle.clone(),
                delay: Duration::ZERO,
            },
        ];
        if resolve_pending {
            effects.push(Effect::ResolveTarget { handle });
        }
        effects
    }

    pub fn status_received(
        &mut self,
        job_id: &str,
        status: &JobStatus,
        policy: &PollPolicy,
    ) -> Vec<Effect> {
        let Some(job) = self.active_job_mut(job_id) else {
            return Vec::new();
        };
        let raw = RawCounts::from_stats(job.handle.stage, &status.stats);
        job.consecutive_failures = 0;
        job.liveness = Liveness::Running;
        job.target.observe_poll(raw.reported_total);
        let handle = job.handle.clone();

        if let Some(message) = status.last_message.as_deref().filter(|m| !m.is_empty()) {
            self.last_message = Some(message.to_string());
        }

        if status.running {
            self.apply_counts(raw, false);
            return vec![
                self.progress_event(),
                Effect::SchedulePoll {
                    handle,
                    delay: policy.interval,
                },
            ];
        }

        match status.returncode {
            None | Some(0) => self.finish(Outcome::Succeeded, Some(raw), None),
            Some(code) => {
                let error = format!("{} failed (exit code: {code})", self.stage.label());
                self.finish(Outcome::Failed, Some(raw), Some(error))
            }
        }
    }

    pub fn status_failed(&mut self, job_id: &str, error: &str, policy: &PollPolicy) -> Vec<Effect> {
        let Some(job) = self.active_job_mut(job_id) else {
            return Vec::new();
        };
        job.consecutive_failures += 1;
        let failures = job.consecutive_failures;
        let handle = job.handle.clone();

        if let Some(max) = policy.max_consecutive_failures {
            if failures >= max {
                let error = format!(
                    "lost contact with the worker after {failures} failed status polls: {error}"
                );
                return self.finish(Outcome::Failed, None, Some(error));
            }
        }

        vec![Effect::SchedulePoll {
            handle,
            delay: policy.retry_delay(failures),
        }]
    }

    /// Returns the job to stop; the state changes only once the stop is confirmed.
    pub fn begin_stop(&self) -> Result<JobHandle, StageError> {
        self.job_handle()
            .cloned()
            .ok_or(StageError::NotRunning(self.stage))
    }

    pub fn stop_confirmed(&mut self, job_id: &str) -> Vec<Effect> {
        if self.active_job_mut(job_id).is_none() {
            return Vec::new();
        }
        let mut effects = vec![Effect::CancelPoll { stage: self.stage }];
        effects.extend(self.finish(Outcome::Stopped, None, None));
        effects
    }

    pub fn stop_failed(&mut self, job_id: &str, error: &str) -> Vec<Effect> {
        if self.active_job_mut(job_id).is_none() {
            return Vec::new();
        }
        self.last_error = Some(error.to_string());
        vec![Effect::Emit(Event::StageError {
            stage: self.stage,
            message: error.to_string(),
        })]
    }

    pub fn target_resolved(&mut self, job_id: &str, total: Option<u64>) -> Vec<Effect> {
        let Some(job) = self.active_job_mut(job_id) else {
            return Vec::new();
        };
        if job.target.land(total) != Landing::Applied {
            return Vec::new();
        }
        let raw = RawCounts {
            processed: self.progress.processed,
            reported_total: None,
            skipped: self.progress.skipped,
            errors: self.progress.errors,
        };
        self.apply_counts(raw, false);
        vec![self.progress_event()]
    }

    fn active_job_mut(&mut self, job_id: &str) -> Option<&mut ActiveJob> {
        match &mut self.phase {
            Phase::Active(job) if job.handle.job_id == job_id => Some(job),
            _ => None,
        }
    }

    fn apply_counts(&mut self, raw: RawCounts, finished: bool) {
        let Phase::Active(job) = &self.phase else {
            return;
        };
        let effective = job.target.effective(raw.processed, finished);
        self.progress = ProgressSnapshot {
            processed: raw.processed,
            total: effective.map(|(total, _)| total),
            skipped: raw.skipped,
            errors: raw.errors,
        };
        self.total_source = effective.map(|(_, source)| source);
    }

    fn finish(
        &mut self,
        outcome: Outcome,
        raw: Option<RawCounts>,
        error: Option<String>,
    ) -> Vec<Effect> {
        if !matches!(self.phase, Phase::Active(_)) {
            return Vec::new();
        }
        let raw = raw.unwrap_or(RawCounts {
            processed: self.progress.processed,
            reported_total: None,
            skipped: self.progress.skipped,
            errors: self.progress.errors,
        });
        self.apply_counts(raw, true);

        let Phase::Active(job) = mem::replace(&mut self.phase, Phase::Finished { outcome }) else {
            return Vec::new();
        };
        if error.is_some() {
            self.last_error = error.clone();
        }
        let notice = job.token.redeem(outcome, self.progress, error);
        vec![
            self.progress_event(),
            Effect::Emit(Event::StageFinished(notice)),
        ]
    }

    fn progress_event(&self) -> Effect {
        Effect::Emit(Event::Progress {
            stage: self.stage,
            snapshot: self.progress,
            percent: self.percent(),
        })
    }
}
