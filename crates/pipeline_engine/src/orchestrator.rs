use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use pipeline_core::{
    target, update, CompletionNotice, DedupeOutcome, Effect, Event, JobHandle, Msg, Outcome,
    PipelineState, PipelineStats, PipelineViewModel, PollPolicy, StageKind, StageRunState,
    StartParams,
};
use pipeline_logging::{pipeline_debug, pipeline_info, pipeline_warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::{ClientError, EventSink, JobClient, PipelineError};

const COMPLETION_CHANNEL_CAPACITY: usize = 16;

/// Owns the three stage pollers and runs their IO on the tokio runtime.
///
/// Every state change goes through [`pipeline_core::update`] while holding
/// one lock, so transitions of a stage never interleave. Network calls run
/// as tasks and report back as messages on a single queue.
pub struct Orchestrator<C: JobClient + 'static> {
    inner: Arc<Inner<C>>,
}

impl<C: JobClient + 'static> Clone for Orchestrator<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<C> {
    client: Arc<C>,
    state: Mutex<PipelineState>,
    polls: Mutex<HashMap<StageKind, CancellationToken>>,
    /// Latest completion per stage, for receivers that lagged behind.
    last_notices: Mutex<HashMap<StageKind, CompletionNotice>>,
    sink: Arc<dyn EventSink>,
    completions: broadcast::Sender<CompletionNotice>,
    msg_tx: mpsc::UnboundedSender<Msg>,
}

impl<C: JobClient + 'static> Orchestrator<C> {
    /// Must be called from within a tokio runtime.
    pub fn new(client: C, sink: Arc<dyn EventSink>, policy: PollPolicy) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (completions, _) = broadcast::channel(COMPLETION_CHANNEL_CAPACITY);
        let inner = Arc::new(Inner {
            client: Arc::new(client),
            state: Mutex::new(PipelineState::with_policy(policy)),
            polls: Mutex::new(HashMap::new()),
            last_notices: Mutex::new(HashMap::new()),
            sink,
            completions,
            msg_tx,
        });
        tokio::spawn(run_loop(Arc::downgrade(&inner), msg_rx));
        Self { inner }
    }

    /// Starts a job for the params' stage and begins polling it.
    ///
    /// Fails with `AlreadyRunning` while the stage has a job, and with the
    /// client error if the worker refused; in both cases no polling starts.
    pub async fn start(&self, params: StartParams) -> Result<JobHandle, PipelineError> {
        let stage = params.stage();
        self.inner.lock_state().request_start(&params)?;
        pipeline_info!("Starting {} job", stage);

        let result = self.inner.client.start(&params).await;
        self.inner.dispatch(report_start(stage, &result));
        let job_id = result?;
        Ok(JobHandle { stage, job_id })
    }

    /// Stops the stage's job. On success the stage is `Stopped` before this returns.
    pub async fn stop(&self, stage: StageKind) -> Result<(), PipelineError> {
        let handle = self.inner.lock_state().request_stop(stage)?;
        pipeline_info!("Stopping {} job {}", stage, handle.job_id);

        let result = self.inner.client.stop(&handle).await;
        self.inner.dispatch(report_stop(&handle, &result));
        result?;
        Ok(())
    }

    pub async fn refresh_stats(&self) -> Result<PipelineStats, PipelineError> {
        let result = self.inner.client.stats().await;
        self.inner.dispatch(report_stats(&result));
        Ok(result?)
    }

    pub async fn dedupe_attachments(&self) -> Result<DedupeOutcome, PipelineError> {
        self.inner.lock_state().request_dedupe()?;
        pipeline_info!("Running attachment dedupe");

        let result = self.inner.client.dedupe_attachments().await;
        self.inner.dispatch(report_dedupe(&result));
        Ok(result?)
    }

    /// Applies a host message, e.g. `Msg::StartRequested`, without waiting for IO.
    pub fn send(&self, msg: Msg) {
        self.inner.dispatch(msg);
    }

    pub fn view(&self) -> PipelineViewModel {
        self.inner.lock_state().view()
    }

    pub fn run_state(&self, stage: StageKind) -> StageRunState {
        self.inner.lock_state().poller(stage).run_state()
    }

    /// Every completion notice from now on, across all stages.
    pub fn completions(&self) -> broadcast::Receiver<CompletionNotice> {
        self.inner.completions.subscribe()
    }

    /// Resolves with the stage's next completion notice.
    ///
    /// Subscribes when called, not when first polled, so a job that ends
    /// before the future is awaited is still reported.
    pub fn wait_for_completion(
        &self,
        stage: StageKind,
    ) -> impl Future<Output = Result<CompletionNotice, PipelineError>> + Send + 'static {
        let mut completions = self.completions();
        let seen = self.inner.last_notice(stage);
        let inner = Arc::downgrade(&self.inner);
        async move {
            loop {
                match completions.recv().await {
                    Ok(notice) if notice.stage == stage => return Ok(notice),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        pipeline_debug!("Completion receiver skipped {} notices", skipped);
                        let latest = inner.upgrade().and_then(|live| live.last_notice(stage));
                        if let Some(latest) = latest {
                            if Some(&latest) != seen.as_ref() {
                                return Ok(latest);
                            }
                        }
                    }
                    Err(RecvError::Closed) => return Err(PipelineError::Shutdown),
                }
            }
        }
    }
}

/// An effect whose poll token was already armed under the state lock.
enum Step {
    Poll {
        handle: JobHandle,
        delay: Duration,
        token: CancellationToken,
    },
    Io(Effect),
}

async fn run_loop<C: JobClient + 'static>(
    inner: Weak<Inner<C>>,
    mut rx: mpsc::UnboundedReceiver<Msg>,
) {
    while let Some(msg) = rx.recv().await {
        let Some(live) = inner.upgrade() else {
            break;
        };
        live.dispatch(msg);
    }
    pipeline_debug!("Orchestrator message loop finished");
}

impl<C: JobClient + 'static> Inner<C> {
    fn lock_state(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_polls(&self) -> MutexGuard<'_, HashMap<StageKind, CancellationToken>> {
        self.polls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn last_notice(&self, stage: StageKind) -> Option<CompletionNotice> {
        self.last_notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&stage)
            .cloned()
    }

    fn dispatch(&self, msg: Msg) {
        let steps = {
            let mut guard = self.lock_state();
            let state = std::mem::take(&mut *guard);
            let (state, effects) = update(state, msg);
            *guard = state;
            // Poll tokens change in the same order as the transitions.
            effects
                .into_iter()
                .filter_map(|effect| self.claim_poll(effect))
                .collect::<Vec<_>>()
        };
        self.execute(steps);
    }

    /// Arms or cancels the stage's poll token. `CancelPoll` is fully handled here.
    fn claim_poll(&self, effect: Effect) -> Option<Step> {
        match effect {
            Effect::SchedulePoll { handle, delay } => {
                let token = self
                    .lock_polls()
                    .entry(handle.stage)
                    .or_insert_with(CancellationToken::new)
                    .clone();
                Some(Step::Poll {
                    handle,
                    delay,
                    token,
                })
            }
            Effect::CancelPoll { stage } => {
                if let Some(token) = self.lock_polls().remove(&stage) {
                    token.cancel();
                }
                None
            }
            effect => Some(Step::Io(effect)),
        }
    }

    fn execute(&self, steps: Vec<Step>) {
        for step in steps {
            let effect = match step {
                Step::Poll {
                    handle,
                    delay,
                    token,
                } => {
                    self.spawn_poll(handle, delay, token);
                    continue;
                }
                Step::Io(effect) => effect,
            };
            match effect {
                Effect::StartJob { params } => {
                    let client = self.client.clone();
                    self.spawn_io(async move {
                        let stage = params.stage();
                        pipeline_info!("Starting {} job", stage);
                        report_start(stage, &client.start(&params).await)
                    });
                }
                Effect::SchedulePoll { .. } | Effect::CancelPoll { .. } => {}
                Effect::StopJob { handle } => {
                    let client = self.client.clone();
                    self.spawn_io(async move {
                        pipeline_info!("Stopping {} job {}", handle.stage, handle.job_id);
                        report_stop(&handle, &client.stop(&handle).await)
                    });
                }
                Effect::ResolveTarget { handle } => {
                    let client = self.client.clone();
                    self.spawn_io(resolve_target(client, handle));
                }
                Effect::RefreshStats => {
                    let client = self.client.clone();
                    self.spawn_io(async move { report_stats(&client.stats().await) });
                }
                Effect::DedupeAttachments => {
                    let client = self.client.clone();
                    self.spawn_io(async move {
                        pipeline_info!("Running attachment dedupe");
                        report_dedupe(&client.dedupe_attachments().await)
                    });
                }
                Effect::Emit(event) => {
                    if let Event::StageFinished(notice) = &event {
                        log_completion(notice);
                        self.last_notices
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .insert(notice.stage, notice.clone());
                        // No subscribers is fine.
                        let _ = self.completions.send(notice.clone());
                    }
                    self.sink.emit(event);
                }
            }
        }
    }

    fn spawn_io<F>(&self, future: F)
    where
        F: Future<Output = Msg> + Send + 'static,
    {
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let msg = future.await;
            let _ = tx.send(msg);
        });
    }

    fn spawn_poll(&self, handle: JobHandle, delay: Duration, token: CancellationToken) {
        let client = self.client.clone();
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    pipeline_debug!("Poll for {} job {} cancelled", handle.stage, handle.job_id);
                }
                msg = poll_status(client, handle.clone(), delay) => {
                    let _ = tx.send(msg);
                }
            }
        });
    }
}

impl<C> Drop for Inner<C> {
    fn drop(&mut self) {
        let polls = self.polls.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, token) in polls.drain() {
            token.cancel();
        }
    }
}

async fn poll_status<C: JobClient>(client: Arc<C>, handle: JobHandle, delay: Duration) -> Msg {
    tokio::time::sleep(delay).await;
    pipeline_debug!("Polling {} job {}", handle.stage, handle.job_id);
    match client.status(&handle).await {
        Ok(status) => Msg::StatusReceived {
            stage: handle.stage,
            job_id: handle.job_id,
            status,
        },
        Err(err) => {
            pipeline_warn!(
                "Status poll for {} job {} failed, will retry: {}",
                handle.stage,
                handle.job_id,
                err
            );
            Msg::StatusFailed {
                stage: handle.stage,
                job_id: handle.job_id,
                error: err.to_string(),
            }
        }
    }
}

async fn resolve_target<C: JobClient>(client: Arc<C>, handle: JobHandle) -> Msg {
    let total = match client.stats().await {
        Ok(stats) => {
            let total = target::total_from_stats(handle.stage, &stats);
            pipeline_debug!("Target for {} job {} resolved to {:?}", handle.stage, handle.job_id, total);
            total
        }
        Err(err) => {
            pipeline_warn!(
                "Target lookup for {} job {} failed, total stays unknown: {}",
                handle.stage,
                handle.job_id,
                err
            );
            None
        }
    };
    Msg::TargetResolved {
        stage: handle.stage,
        job_id: handle.job_id,
        total,
    }
}

fn report_start(stage: StageKind, result: &Result<String, ClientError>) -> Msg {
    match result {
        Ok(job_id) => {
            pipeline_info!("{} job {} started", stage, job_id);
            Msg::JobStarted {
                stage,
                job_id: job_id.clone(),
            }
        }
        Err(err) => {
            pipeline_warn!("Failed to start {} job: {}", stage, err);
            Msg::StartFailed {
                stage,
                error: format!("Failed to start {}: {}", stage, err),
            }
        }
    }
}

fn report_stop(handle: &JobHandle, result: &Result<String, ClientError>) -> Msg {
    match result {
        Ok(status) => {
            pipeline_info!("{} job {} stop acknowledged ({})", handle.stage, handle.job_id, status);
            Msg::StopConfirmed {
                stage: handle.stage,
                job_id: handle.job_id.clone(),
            }
        }
        Err(err) => {
            pipeline_warn!("Failed to stop {} job {}: {}", handle.stage, handle.job_id, err);
            Msg::StopFailed {
                stage: handle.stage,
                job_id: handle.job_id.clone(),
                error: format!("Failed to stop {}: {}", handle.stage, err),
            }
        }
    }
}

fn report_stats(result: &Result<PipelineStats, ClientError>) -> Msg {
    match result {
        Ok(stats) => Msg::StatsRefreshed(stats.clone()),
        Err(err) => {
            pipeline_warn!("Failed to load pipeline stats: {}", err);
            Msg::StatsFailed(err.to_string())
        }
    }
}

fn report_dedupe(result: &Result<DedupeOutcome, ClientError>) -> Msg {
    match result {
        Ok(outcome) => {
            pipeline_info!("Attachment dedupe finished ({})", outcome.status);
            Msg::DedupeFinished(Ok(outcome.clone()))
        }
        Err(err) => {
            pipeline_warn!("Attachment dedupe failed: {}", err);
            Msg::DedupeFinished(Err(err.to_string()))
        }
    }
}

fn log_completion(notice: &CompletionNotice) {
    let progress = &notice.final_progress;
    match notice.outcome {
        Outcome::Succeeded => pipeline_info!(
            "{} job {} succeeded: {}/{:?} processed, {} skipped, {} errors",
            notice.stage,
            notice.job_id,
            progress.processed,
            progress.total,
            progress.skipped,
            progress.errors
        ),
        Outcome::Failed => pipeline_warn!(
            "{} job {} failed: {}",
            notice.stage,
            notice.job_id,
            notice.error.as_deref().unwrap_or("unknown error")
        ),
        Outcome::Stopped => pipeline_info!("{} job {} stopped", notice.stage, notice.job_id),
    }
}
