pub mod cancellation;
pub mod content;
pub mod context;
pub mod error;
pub mod events;
pub mod outlet;
pub mod outline;
pub mod query_planner;
pub mod research;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use cancellation::CancellationToken;
pub use context::GeneratorContext;
pub use error::{ContentError, PipelineError};
pub use events::{EventKind, ProgressEvent};
pub use outlet::{ArtifactRef, Assembler, DiskOutlet};
pub use workflow::{PipelineOrchestrator, PipelineStage, RunOutcome, launch};
