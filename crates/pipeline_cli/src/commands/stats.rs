use std::process::ExitCode;

use crate::config::CliConfig;
use crate::render;

pub async fn run(config: &CliConfig) -> anyhow::Result<ExitCode> {
    let orchestrator = super::connect_quiet(config)?;
    let stats = orchestrator.refresh_stats().await?;
    for line in render::stats_lines(&stats) {
        println!("{line}");
    }
    Ok(ExitCode::SUCCESS)
}
