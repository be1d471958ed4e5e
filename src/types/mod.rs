pub mod research;
pub mod slide;
pub mod topic;

pub use research::{ResearchContext, SearchQuery, Snippet};
pub use slide::{OUTLINE_SHAPE, PresentationContent, SlideContent, SlideKind, SlideSpec};
pub use topic::{GenerationRequest, Theme, Topic};
