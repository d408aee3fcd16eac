//! OSCE station scoring: turns a student/patient transcript into a
//! fixed-shape result against the 35-item marking sheet, degrading through
//! simpler stages when the remote model misbehaves.

pub mod checklist;
pub mod diagnosis;
pub mod json_relaxed;
pub mod normalize;
pub mod outcome;
pub mod pipeline;
pub mod prompts;
pub mod schema;
pub mod summary;
pub mod transcript;

pub use checklist::Checklist;
pub use pipeline::ScoringPipeline;
