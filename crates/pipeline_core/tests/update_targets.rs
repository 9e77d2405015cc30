use pipeline_core::{
    update, EmbedParams, Effect, JobStatus, Msg, PipelineState, StageKind, StageRunState,
    StartParams, SummarizeParams, TotalSource,
};
use serde_json::json;

fn start(state: PipelineState, params: StartParams, job_id: &str) -> (PipelineState, Vec<Effect>) {
    let stage = params.stage();
    let (state, _) = update(state, Msg::StartRequested(params));
    update(
        state,
        Msg::JobStarted {
            stage,
            job_id: job_id.to_string(),
        },
    )
}

fn poll(state: PipelineState, stage: StageKind, running: bool, stats: serde_json::Value) -> PipelineState {
    let (state, _) = update(
        state,
        Msg::StatusReceived {
            stage,
            job_id: "job-1".to_string(),
            status: JobStatus {
                running,
                returncode: if running { None } else { Some(0) },
                stats,
                ..JobStatus::default()
            },
        },
    );
    state
}

fn resolved(state: PipelineState, stage: StageKind, total: Option<u64>) -> (PipelineState, Vec<Effect>) {
    update(
        state,
        Msg::TargetResolved {
            stage,
            job_id: "job-1".to_string(),
            total,
        },
    )
}

fn summarize(limit: Option<u64>) -> StartParams {
    StartParams::Summarization(SummarizeParams {
        limit,
        ..SummarizeParams::default()
    })
}

#[test]
fn explicit_limit_is_the_total_without_lookup() {
    let (state, effects) = start(PipelineState::new(), summarize(Some(5)), "job-1");

    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::ResolveTarget { .. })));
    let view = state.view();
    let stage = view.stage(StageKind::Summarization).unwrap();
    assert_eq!(stage.total, Some(5));
    assert_eq!(stage.total_source, Some(TotalSource::Resolver));
}

#[test]
fn resolver_total_shows_until_poll_reports_one() {
    let (state, _) = start(PipelineState::new(), summarize(None), "job-1");
    let state = poll(state, StageKind::Summarization, true, json!({"processed_papers": 1}));
    assert_eq!(state.view().stage(StageKind::Summarization).unwrap().total, None);

    let (state, _) = resolved(state, StageKind::Summarization, Some(42));
    let view = state.view();
    let stage = view.stage(StageKind::Summarization).unwrap();
    assert_eq!(stage.total, Some(42));
    assert_eq!(stage.percent, 2);

    let state = poll(
        state,
        StageKind::Summarization,
        true,
        json!({"processed_papers": 5, "total_papers": 50}),
    );
    let view = state.view();
    let stage = view.stage(StageKind::Summarization).unwrap();
    assert_eq!(stage.total, Some(50));
    assert_eq!(stage.total_source, Some(TotalSource::Poll));
    assert_eq!(stage.percent, 10);
}

#[test]
fn resolution_after_poll_total_is_discarded() {
    let (state, _) = start(PipelineState::new(), summarize(None), "job-1");
    let state = poll(
        state,
        StageKind::Summarization,
        true,
        json!({"processed_papers": 1, "total_papers": 8}),
    );
    let (state, effects) = resolved(state, StageKind::Summarization, Some(42));

    assert!(effects.is_empty());
    assert_eq!(state.view().stage(StageKind::Summarization).unwrap().total, Some(8));
}

#[test]
fn finished_without_total_uses_processed_count() {
    let (state, _) = start(PipelineState::new(), summarize(None), "job-1");
    let state = poll(state, StageKind::Summarization, true, json!({"processed_papers": 3}));
    let state = poll(state, StageKind::Summarization, false, json!({"processed_papers": 7}));

    let view = state.view();
    let stage = view.stage(StageKind::Summarization).unwrap();
    assert_eq!(stage.run_state, StageRunState::Succeeded);
    assert_eq!(stage.total, Some(7));
    assert_eq!(stage.total_source, Some(TotalSource::ProcessedFallback));
    assert_eq!(stage.percent, 100);

    // The target died with the job; a late lookup cannot rewrite it.
    let (state, effects) = resolved(state, StageKind::Summarization, Some(42));
    assert!(effects.is_empty());
    assert_eq!(state.view().stage(StageKind::Summarization).unwrap().total, Some(7));
}

#[test]
fn failed_lookup_leaves_total_unknown() {
    let (state, _) = start(PipelineState::new(), summarize(None), "job-1");
    let (state, _) = resolved(state, StageKind::Summarization, None);
    let state = poll(state, StageKind::Summarization, true, json!({"processed_papers": 4}));

    let view = state.view();
    let stage = view.stage(StageKind::Summarization).unwrap();
    assert_eq!(stage.total, None);
    assert_eq!(stage.percent, 0);
    assert_eq!(stage.run_state, StageRunState::Running);
}

#[test]
fn embedding_progress_counts_skipped_chunks() {
    let params = StartParams::Embedding(EmbedParams {
        limit_chunks: Some(200),
        ..EmbedParams::default()
    });
    let (state, _) = start(PipelineState::new(), params, "job-1");
    let state = poll(
        state,
        StageKind::Embedding,
        true,
        json!({"embedded": 30, "embedded_skipped": 20, "total_chunks": 100}),
    );

    let view = state.view();
    let stage = view.stage(StageKind::Embedding).unwrap();
    assert_eq!(stage.total, Some(100));
    assert_eq!(stage.processed, 30);
    assert_eq!(stage.skipped, 20);
    assert_eq!(stage.percent, 50);
}

#[test]
fn pdf_progress_reads_pdf_counters() {
    let (state, _) = start(
        PipelineState::new(),
        StartParams::default_for(StageKind::PdfProcessing),
        "job-1",
    );
    let (state, _) = resolved(state, StageKind::PdfProcessing, Some(12));
    let state = poll(state, StageKind::PdfProcessing, true, json!({"processed_pdfs": 3, "total_pdfs": 0}));

    let view = state.view();
    let stage = view.stage(StageKind::PdfProcessing).unwrap();
    assert_eq!(stage.processed, 3);
    assert_eq!(stage.total, Some(12));
    assert_eq!(stage.percent, 25);
}
