use std::process::ExitCode;
use std::sync::Arc;

use pipeline_core::{Event, Outcome, StartParams};
use pipeline_engine::ChannelEventSink;
use pipeline_logging::{pipeline_info, pipeline_warn};
use tokio::sync::mpsc;

use crate::config::CliConfig;
use crate::render;

/// Starts the job, prints progress until it ends, and stops it on Ctrl-C.
pub async fn run(config: &CliConfig, params: StartParams) -> anyhow::Result<ExitCode> {
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let orchestrator = super::connect(config, Arc::new(ChannelEventSink::new(event_tx)))?;
    let stage = params.stage();
    let completion = orchestrator.wait_for_completion(stage);
    tokio::pin!(completion);

    let handle = orchestrator.start(params).await?;
    println!("{}", render::started_line(&handle));

    let mut last_line = String::new();
    let mut stop_requested = false;
    loop {
        tokio::select! {
            notice = &mut completion => {
                let notice = notice?;
                println!("{}", render::completion_line(&notice));
                return Ok(match notice.outcome {
                    Outcome::Succeeded => ExitCode::SUCCESS,
                    Outcome::Failed | Outcome::Stopped => ExitCode::FAILURE,
                });
            }
            Some(event) = events.recv() => match event {
                Event::Progress { stage: event_stage, snapshot, percent } if event_stage == stage => {
                    let line = render::progress_line(stage, &snapshot, percent);
                    if line != last_line {
                        println!("{line}");
                        last_line = line;
                    }
                }
                Event::StageError { stage: event_stage, message } if event_stage == stage => {
                    eprintln!("{message}");
                }
                _ => {}
            },
            signal = tokio::signal::ctrl_c(), if !stop_requested => {
                signal?;
                stop_requested = true;
                pipeline_info!("Interrupted, stopping {} job {}", stage, handle.job_id);
                if let Err(err) = orchestrator.stop(stage).await {
                    pipeline_warn!("Stop request failed: {}", err);
                    eprintln!("could not stop {stage}: {err}");
                    stop_requested = false;
                }
            }
        }
    }
}
