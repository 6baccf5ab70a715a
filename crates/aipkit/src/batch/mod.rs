//! Running every AIP listed in a batch sheet.

pub mod pool;
pub mod sheet;

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::ledger::{LedgerWriter, RunLog};
use crate::pipeline::{
    Aip, AipOutcome, ErrorCategory, NoopProgress, Pipeline, PipelineConfig, ProgressReporter,
};
use crate::tools::ToolRunner;

pub use pool::{AipJob, JobResult, WorkerContext, WorkerPool};
pub use sheet::{load_sheet, validate_sheet, SheetRow, SHEET_NAME};

/// AIP ids grouped by how they finished, in sheet order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: Vec<String>,
    pub quarantined: Vec<(String, ErrorCategory)>,
    pub halted: Vec<String>,
}

impl BatchSummary {
    fn push(&mut self, aip_id: String, outcome: &AipOutcome) {
        match outcome {
            AipOutcome::Complete => self.completed.push(aip_id),
            AipOutcome::Quarantined { category, .. } => self.quarantined.push((aip_id, *category)),
            AipOutcome::Halted { .. } => self.halted.push(aip_id),
        }
    }

    pub fn total(&self) -> usize {
        self.completed.len() + self.quarantined.len() + self.halted.len()
    }
}

pub struct BatchRunner {
    config: Arc<PipelineConfig>,
    runner: Arc<dyn ToolRunner>,
    progress: Arc<dyn ProgressReporter>,
}

impl BatchRunner {
    pub fn new(config: Arc<PipelineConfig>, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            config,
            runner,
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Processes every row and waits for the run log and manifests to be
    /// flushed. Failures of individual AIPs are reported in the summary,
    /// not as errors.
    pub fn run(&self, rows: &[SheetRow]) -> Result<BatchSummary> {
        self.config.create_output_dirs()?;

        let writer = LedgerWriter::start(
            RunLog::new(&self.config.run_log_path),
            self.config.ingest_dir.clone(),
        );

        let aips: Vec<Aip> = rows
            .iter()
            .map(|row| Aip::from_row(row, &self.config.batch_dir, self.config.zip))
            .collect();

        info!(
            "Processing {} AIPs from {} with {} worker(s)",
            aips.len(),
            self.config.batch_dir.display(),
            self.config.workers
        );

        let results = if self.config.workers > 1 && aips.len() > 1 {
            self.run_pool(aips, &writer)
        } else {
            Ok(self.run_sequential(aips, &writer))
        };

        // Joined even when a worker failed, so pending rows reach disk.
        let flushed = writer.finish();
        let mut results = results?;
        flushed?;
        results.sort_by_key(|r| r.index);

        let mut summary = BatchSummary::default();
        for result in results {
            summary.push(result.aip_id, &result.outcome);
        }
        info!(
            "Batch finished: {} complete, {} quarantined, {} stopped",
            summary.completed.len(),
            summary.quarantined.len(),
            summary.halted.len()
        );
        Ok(summary)
    }

    fn run_sequential(&self, aips: Vec<Aip>, writer: &LedgerWriter) -> Vec<JobResult> {
        let pipeline = Pipeline::new(
            Arc::clone(&self.config),
            Arc::clone(&self.runner),
            writer.handle(),
        );
        aips.into_iter()
            .enumerate()
            .map(|(index, aip)| {
                let aip_id = aip.id.clone();
                let outcome = pipeline.run(aip, self.progress.as_ref());
                JobResult {
                    index,
                    aip_id,
                    outcome,
                }
            })
            .collect()
    }

    fn run_pool(
        &self,
        aips: Vec<Aip>,
        writer: &LedgerWriter,
    ) -> std::result::Result<Vec<JobResult>, crate::error::WorkerError> {
        let total = aips.len();
        let pool = WorkerPool::new(
            WorkerContext {
                config: Arc::clone(&self.config),
                runner: Arc::clone(&self.runner),
                ledger: writer.handle(),
                progress: Arc::clone(&self.progress),
            },
            self.config.workers.min(total),
        );

        for (index, aip) in aips.into_iter().enumerate() {
            if let Err(e) = pool.submit(AipJob { index, aip }) {
                pool.shutdown();
                pool.wait()?;
                return Err(e);
            }
        }

        // Queued jobs are still delivered after the queue closes, so waiting
        // drains the whole batch.
        pool.wait()
    }
}
