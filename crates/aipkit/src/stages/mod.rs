//! The individual steps of the per-AIP pipeline. Each one returns a
//! [`StepResult`](crate::pipeline::error::StepResult) and records its own
//! outcome; the driver handles halts.

pub mod bagging;
pub mod extract;
pub mod manifest;
pub mod merge;
pub mod package;
pub mod preservation;
pub mod rename;
pub mod scrub;
pub mod structure;

pub use structure::{metadata_rules, MetadataRule};
