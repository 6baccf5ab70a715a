pub mod config;
pub mod context;
pub mod error;
pub mod log;
pub mod progress;
pub mod runner;
pub mod stage;

pub use config::PipelineConfig;
pub use context::Aip;
pub use error::{Diagnostic, ErrorCategory, Halt, Quarantine, StepResult};
pub use log::{LogField, LogRecord};
pub use progress::{ConsoleProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{AipOutcome, Pipeline};
pub use stage::Stage;
