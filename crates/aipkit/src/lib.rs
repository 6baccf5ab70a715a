pub mod bag;
pub mod batch;
pub mod config;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod stages;
pub mod storage;
pub mod tools;

#[cfg(test)]
mod test_support;

pub use batch::{load_sheet, validate_sheet, BatchRunner, BatchSummary, SheetRow};
pub use config::{load_config, resolve_config_path, Config};
pub use error::{
    AipkitError, BagError, ConfigError, LedgerError, Result, SheetError, StorageError, ToolError,
    WorkerError,
};
pub use pipeline::{
    Aip, AipOutcome, ConsoleProgress, ErrorCategory, NoopProgress, Pipeline, PipelineConfig,
    ProgressReporter,
};
pub use tools::{ProcessRunner, ToolRunner};
