use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use pipeline_cli::cli::Cli;
use pipeline_cli::commands;
use pipeline_cli::config::CliConfig;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = CliConfig::load(cli.config.as_deref())?;
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    if !pipeline_logging::initialize(&config.log_destination(), level) {
        eprintln!("Warning: logging is disabled for this run");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(commands::execute(cli.command, &config))
}
