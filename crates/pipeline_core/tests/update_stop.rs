use pipeline_core::{
    update, CompletionNotice, DedupeOutcome, DedupeState, Effect, Event, JobStatus, Msg, Outcome,
    PipelineState, PipelineStats, StageKind, StageRunState, StartParams,
};
use serde_json::json;

fn running_embed_job() -> PipelineState {
    let (state, _) = update(
        PipelineState::new(),
        Msg::StartRequested(StartParams::default_for(StageKind::Embedding)),
    );
    let (state, _) = update(
        state,
        Msg::JobStarted {
            stage: StageKind::Embedding,
            job_id: "job-1".to_string(),
        },
    );
    let (state, _) = update(state, status_msg(true, json!({"embedded": 4, "total_chunks": 10})));
    state
}

fn status_msg(running: bool, stats: serde_json::Value) -> Msg {
    Msg::StatusReceived {
        stage: StageKind::Embedding,
        job_id: "job-1".to_string(),
        status: JobStatus {
            running,
            stats,
            ..JobStatus::default()
        },
    }
}

fn notices(effects: &[Effect]) -> Vec<CompletionNotice> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Emit(Event::StageFinished(notice)) => Some(notice.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn stop_request_emits_stop_effect_without_state_change() {
    let state = running_embed_job();
    let (state, effects) = update(state, Msg::StopRequested(StageKind::Embedding));

    assert!(matches!(
        effects.as_slice(),
        [Effect::StopJob { handle }] if handle.job_id == "job-1"
    ));
    assert_eq!(
        state.view().stage(StageKind::Embedding).unwrap().run_state,
        StageRunState::Running
    );
}

#[test]
fn confirmed_stop_is_immediate_and_later_polls_are_ignored() {
    let state = running_embed_job();
    let (state, effects) = update(
        state,
        Msg::StopConfirmed {
            stage: StageKind::Embedding,
            job_id: "job-1".to_string(),
        },
    );

    assert!(matches!(
        effects.first(),
        Some(Effect::CancelPoll {
            stage: StageKind::Embedding
        })
    ));
    let finished = notices(&effects);
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].outcome, Outcome::Stopped);
    assert_eq!(finished[0].final_progress.processed, 4);

    let (state, late) = update(state, status_msg(true, json!({"embedded": 9, "total_chunks": 10})));
    assert!(late.is_empty());
    let (state, late) = update(state, status_msg(false, json!({"embedded": 10, "total_chunks": 10})));
    assert!(late.is_empty());

    let view = state.view();
    let stage = view.stage(StageKind::Embedding).unwrap();
    assert_eq!(stage.run_state, StageRunState::Stopped);
    assert_eq!(stage.processed, 4);
}

#[test]
fn failed_stop_keeps_job_running() {
    let state = running_embed_job();
    let (state, effects) = update(
        state,
        Msg::StopFailed {
            stage: StageKind::Embedding,
            job_id: "job-1".to_string(),
            error: "http status 404".to_string(),
        },
    );

    assert!(matches!(
        effects.as_slice(),
        [Effect::Emit(Event::StageError { stage: StageKind::Embedding, .. })]
    ));
    let view = state.view();
    let stage = view.stage(StageKind::Embedding).unwrap();
    assert_eq!(stage.run_state, StageRunState::Running);
    assert_eq!(stage.last_error.as_deref(), Some("http status 404"));

    let (_state, effects) = update(state, status_msg(true, json!({"embedded": 5})));
    assert!(effects
        .iter()
        .any(|effect| matches!(effect, Effect::SchedulePoll { .. })));
}

#[test]
fn stop_without_job_is_rejected() {
    let state = PipelineState::new();
    assert!(state.request_stop(StageKind::PdfProcessing).is_err());

    let (_state, effects) = update(state, Msg::StopRequested(StageKind::PdfProcessing));
    assert!(matches!(
        effects.as_slice(),
        [Effect::Emit(Event::StageError { .. })]
    ));
}

#[test]
fn stats_refresh_replaces_cache() {
    let (state, effects) = update(PipelineState::new(), Msg::RefreshStatsRequested);
    assert_eq!(effects, vec![Effect::RefreshStats]);

    let first = PipelineStats {
        missing_summary: 3,
        ..PipelineStats::default()
    };
    let (state, _) = update(state, Msg::StatsRefreshed(first));
    let second = PipelineStats {
        pdf_count: 11,
        ..PipelineStats::default()
    };
    let (state, effects) = update(state, Msg::StatsRefreshed(second.clone()));

    assert_eq!(state.view().stats, Some(second.clone()));
    assert_eq!(effects, vec![Effect::Emit(Event::StatsUpdated(second))]);
}

#[test]
fn dedupe_runs_once_at_a_time() {
    let (state, effects) = update(PipelineState::new(), Msg::DedupeRequested);
    assert_eq!(effects, vec![Effect::DedupeAttachments]);

    let (state, effects) = update(state, Msg::DedupeRequested);
    assert_eq!(
        effects,
        vec![Effect::Emit(Event::DedupeRejected(
            "attachment dedupe is already running".to_string()
        ))]
    );
    assert_eq!(state.view().dedupe, DedupeState::Running);

    let outcome = DedupeOutcome {
        status: "ok".to_string(),
        result: json!({"removed": 2}),
    };
    let (state, _) = update(state, Msg::DedupeFinished(Ok(outcome.clone())));
    assert_eq!(state.view().dedupe, DedupeState::Done(outcome));

    let (_state, effects) = update(state, Msg::DedupeRequested);
    assert_eq!(effects, vec![Effect::DedupeAttachments]);
}
