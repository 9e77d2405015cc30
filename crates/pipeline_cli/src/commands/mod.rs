mod dedupe;
mod run;
mod stats;

use std::process::ExitCode;
use std::sync::Arc;

use pipeline_engine::{EventSink, NullSink, Orchestrator, ReqwestJobClient};

use crate::cli::Command;
use crate::config::CliConfig;

pub async fn execute(command: Command, config: &CliConfig) -> anyhow::Result<ExitCode> {
    match command {
        Command::Run { stage } => run::run(config, stage.into_params()).await,
        Command::Stats => stats::run(config).await,
        Command::Dedupe => dedupe::run(config).await,
    }
}

fn connect(
    config: &CliConfig,
    sink: Arc<dyn EventSink>,
) -> anyhow::Result<Orchestrator<ReqwestJobClient>> {
    let client = ReqwestJobClient::new(&config.client_settings())?;
    Ok(Orchestrator::new(client, sink, config.poll_policy()))
}

fn connect_quiet(config: &CliConfig) -> anyhow::Result<Orchestrator<ReqwestJobClient>> {
    connect(config, Arc::new(NullSink))
}
