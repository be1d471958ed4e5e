pub mod cli;
pub mod config;
pub mod generator;
pub mod llm;
pub mod logging;
pub mod search;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use generator::workflow::launch;
pub use generator::{
    CancellationToken, PipelineError, PipelineOrchestrator, PipelineStage, ProgressEvent,
};
pub use types::{GenerationRequest, PresentationContent, Theme};
