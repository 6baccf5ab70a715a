pub mod manifest;
pub mod run_log;
pub mod writer;

pub use run_log::{RunLog, RUN_LOG_NAME};
pub use writer::{LedgerCommand, LedgerHandle, LedgerWriter};
