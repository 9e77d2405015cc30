//! Pipeline engine: worker HTTP client and effect execution on tokio.
mod client;
mod orchestrator;
mod sink;
mod types;

pub use client::{ClientSettings, JobClient, ReqwestJobClient};
pub use orchestrator::Orchestrator;
pub use sink::{ChannelEventSink, EventSink, NullSink};
pub use types::{ClientError, FailureKind, PipelineError};
