pub mod command;
pub mod diagnostics;
pub mod runner;

pub use command::{ToolCommand, ToolOutput};
pub use diagnostics::{classify_validation, transform_failure, ValidationVerdict};
pub use runner::{ProcessRunner, ToolRunner};
