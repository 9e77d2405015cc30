use crate::{Effect, Event, Msg, PipelineState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: PipelineState, msg: Msg) -> (PipelineState, Vec<Effect>) {
    let policy = state.policy().clone();
    let effects = match msg {
        Msg::StartRequested(params) => match state.request_start(&params) {
            Ok(()) => vec![Effect::StartJob { params }],
            Err(err) => vec![Effect::Emit(Event::StageError {
                stage: params.stage(),
                message: err.to_string(),
            })],
        },
        Msg::JobStarted { stage, job_id } => state.poller_mut(stage).job_started(job_id),
        Msg::StartFailed { stage, error } => state.poller_mut(stage).start_failed(&error),
        Msg::StatusReceived {
            stage,
            job_id,
            status,
        } => state
            .poller_mut(stage)
            .status_received(&job_id, &status, &policy),
        Msg::StatusFailed {
            stage,
            job_id,
            error,
        } => state
            .poller_mut(stage)
            .status_failed(&job_id, &error, &policy),
        Msg::StopRequested(stage) => match state.request_stop(stage) {
            Ok(handle) => vec![Effect::StopJob { handle }],
            Err(err) => vec![Effect::Emit(Event::StageError {
                stage,
                message: err.to_string(),
            })],
        },
        Msg::StopConfirmed { stage, job_id } => state.poller_mut(stage).stop_confirmed(&job_id),
        Msg::StopFailed {
            stage,
            job_id,
            error,
        } => state.poller_mut(stage).stop_failed(&job_id, &error),
        Msg::TargetResolved {
            stage,
            job_id,
            total,
        } => state.poller_mut(stage).target_resolved(&job_id, total),
        Msg::RefreshStatsRequested => vec![Effect::RefreshStats],
        Msg::StatsRefreshed(stats) => {
            state.set_stats(stats.clone());
            vec![Effect::Emit(Event::StatsUpdated(stats))]
        }
        Msg::StatsFailed(error) => {
            state.set_stats_error(error);
            Vec::new()
        }
        Msg::DedupeRequested => match state.request_dedupe() {
            Ok(()) => vec![Effect::DedupeAttachments],
            Err(err) => vec![Effect::Emit(Event::DedupeRejected(err.to_string()))],
        },
        Msg::DedupeFinished(result) => {
            state.finish_dedupe(&result);
            vec![Effect::Emit(Event::DedupeFinished(result))]
        }
    };

    let effects = fan_out_completions(effects);
    if !effects.is_empty() {
        state.mark_dirty();
    }
    (state, effects)
}

/// Every stage completion refreshes the shared stats and pings the host once.
fn fan_out_completions(mut effects: Vec<Effect>) -> Vec<Effect> {
    let completions = effects
        .iter()
        .filter(|effect| matches!(effect, Effect::Emit(Event::StageFinished(_))))
        .count();
    for _ in 0..completions {
        effects.push(Effect::RefreshStats);
        effects.push(Effect::Emit(Event::ActivityChanged));
    }
    effects
}
