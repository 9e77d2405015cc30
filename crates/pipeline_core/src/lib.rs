//! Pipeline core: pure stage state machines, progress and target rules.
mod effect;
mod msg;
mod payload;
mod poller;
mod progress;
mod stage;
mod state;
pub mod target;
mod update;
mod view_model;

pub use effect::{Effect, Event};
pub use msg::Msg;
pub use payload::{DedupeOutcome, EmbedEstimate, JobStatus, MissingPdf, PipelineStats};
pub use poller::{
    CompletionNotice, Outcome, PollPolicy, StageError, StagePoller, StageRunState,
};
pub use progress::{ProgressSnapshot, RawCounts};
pub use stage::{
    EmbedParams, JobHandle, ProcessPdfsParams, StageKind, StartParams, SummarizeParams,
};
pub use state::{DedupeInFlight, DedupeState, PipelineState};
pub use target::{TargetRequest, TotalSource};
pub use update::update;
pub use view_model::{PipelineViewModel, StageView};
