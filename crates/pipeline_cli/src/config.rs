//! Optional RON settings file for the command-line host.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use pipeline_core::PollPolicy;
use pipeline_engine::ClientSettings;
use pipeline_logging::LogDestination;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogTarget {
    #[default]
    Terminal,
    File,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub api_base: String,
    pub poll_interval_ms: u64,
    pub connect_timeout_ms: u64,
    /// No whole-request timeout unless set.
    pub request_timeout_ms: Option<u64>,
    /// Poll failures are retried forever unless set.
    pub max_consecutive_poll_failures: Option<u32>,
    pub max_backoff_ms: Option<u64>,
    pub log_destination: LogTarget,
    pub log_file: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            api_base: client.base_url,
            poll_interval_ms: 2000,
            connect_timeout_ms: 10_000,
            request_timeout_ms: None,
            max_consecutive_poll_failures: None,
            max_backoff_ms: None,
            log_destination: LogTarget::Terminal,
            log_file: PathBuf::from("pipeline.log"),
        }
    }
}

impl CliConfig {
    /// Reads `path` if given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = ron::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.api_base.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            max_backoff: self.max_backoff_ms.map(Duration::from_millis),
            max_consecutive_failures: self.max_consecutive_poll_failures.filter(|max| *max > 0),
        }
    }

    pub fn log_destination(&self) -> LogDestination {
        match self.log_destination {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File(self.log_file.clone()),
            LogTarget::Both => LogDestination::Both(self.log_file.clone()),
        }
    }
}
