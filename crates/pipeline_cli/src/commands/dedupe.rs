use std::process::ExitCode;

use crate::config::CliConfig;
use crate::render;

pub async fn run(config: &CliConfig) -> anyhow::Result<ExitCode> {
    let orchestrator = super::connect_quiet(config)?;
    let outcome = orchestrator.dedupe_attachments().await?;
    println!("{}", render::dedupe_line(&outcome));
    Ok(ExitCode::SUCCESS)
}
