use pipeline_core::{update, JobStatus, Msg, PipelineState, StageKind};

#[test]
fn stop_confirmed_for_idle_stage_is_ignored() {
    let state = PipelineState::new();
    let (mut next, effects) = update(
        state.clone(),
        Msg::StopConfirmed {
            stage: StageKind::Embedding,
            job_id: "nope".to_string(),
        },
    );

    assert!(effects.is_empty());
    assert!(!next.consume_dirty());
    assert_eq!(next.view(), state.view());
}

#[test]
fn status_for_idle_stage_does_not_complete_anything() {
    let state = PipelineState::new();
    let (mut next, effects) = update(
        state.clone(),
        Msg::StatusReceived {
            stage: StageKind::PdfProcessing,
            job_id: "gone".to_string(),
            status: JobStatus {
                running: false,
                returncode: Some(0),
                log: String::new(),
                stats: serde_json::Value::Null,
                last_message: None,
            },
        },
    );

    assert!(effects.is_empty());
    assert!(!next.consume_dirty());
    assert_eq!(next.view(), state.view());
}
