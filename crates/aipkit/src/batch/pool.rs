use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::ledger::LedgerHandle;
use crate::pipeline::{Aip, AipOutcome, Pipeline, PipelineConfig, ProgressReporter};
use crate::tools::ToolRunner;

/// One AIP queued for a worker. `index` is its position in the sheet.
#[derive(Debug)]
pub struct AipJob {
    pub index: usize,
    pub aip: Aip,
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub index: usize,
    pub aip_id: String,
    pub outcome: AipOutcome,
}

/// Everything a worker thread needs to build its own pipeline.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<PipelineConfig>,
    pub runner: Arc<dyn ToolRunner>,
    pub ledger: LedgerHandle,
    pub progress: Arc<dyn ProgressReporter>,
}

pub struct WorkerPool {
    job_sender: Sender<AipJob>,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts up to `worker_count` threads, never more than the machine has
    /// CPUs.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(context: WorkerContext, worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let cpus = num_cpus::get().max(1);
        let worker_count = if worker_count > cpus {
            warn!(
                "Requested {} workers but only {} CPUs are available",
                worker_count, cpus
            );
            cpus
        } else {
            worker_count
        };

        let (job_sender, job_receiver) = bounded::<AipJob>(worker_count * 2);
        // Unbounded so a worker never blocks on results while the submitter
        // is still blocked on a full job queue.
        let (result_sender, result_receiver) = unbounded::<JobResult>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_context = context.clone();

            workers.push(thread::spawn(move || {
                run_worker(worker_id, job_rx, result_tx, shutdown_flag, worker_context);
            }));
        }

        info!("Started {} workers", worker_count);

        Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn submit(&self, job: AipJob) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn recv_result(&self) -> Option<JobResult> {
        self.result_receiver.recv().ok()
    }

    /// Stops workers after their current AIP. Queued jobs are left unrun.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Closes the job queue, joins every worker, and returns the results
    /// that were not yet received.
    pub fn wait(self) -> Result<Vec<JobResult>, WorkerError> {
        drop(self.job_sender);

        let mut panicked = None;
        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
                panicked.get_or_insert(i);
            } else {
                debug!("Worker {} finished", i);
            }
        }
        info!("All workers have stopped");

        let remaining = self.result_receiver.try_iter().collect();
        match panicked {
            Some(i) => Err(WorkerError::Panicked(i)),
            None => Ok(remaining),
        }
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<AipJob>,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    context: WorkerContext,
) {
    debug!("Worker {} started", worker_id);

    let pipeline = Pipeline::new(context.config, context.runner, context.ledger);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(job) => {
                debug!("Worker {} processing {}", worker_id, job.aip.id);
                let aip_id = job.aip.id.clone();
                let outcome = pipeline.run(job.aip, context.progress.as_ref());
                let result = JobResult {
                    index: job.index,
                    aip_id,
                    outcome,
                };
                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
