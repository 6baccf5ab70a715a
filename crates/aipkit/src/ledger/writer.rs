//! Single writer thread for the batch's shared files.
//!
//! Workers never open the run log or a manifest themselves. They send a
//! [`LedgerCommand`] and block until the writer acknowledges it, so every
//! line lands whole and in the order the writer received it.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error};

use crate::error::{LedgerError, WorkerError};
use crate::ledger::manifest::append_entry;
use crate::ledger::run_log::RunLog;
use crate::pipeline::log::LogRecord;

type Ack = Sender<Result<(), LedgerError>>;

pub enum LedgerCommand {
    AppendLog {
        record: Box<LogRecord>,
        ack: Ack,
    },
    AppendManifest {
        department: String,
        digest: String,
        file_name: String,
        ack: Ack,
    },
}

/// Cloneable sending side, one per pipeline.
#[derive(Clone)]
pub struct LedgerHandle {
    sender: Sender<LedgerCommand>,
}

impl LedgerHandle {
    pub fn append_log(&self, record: &LogRecord) -> Result<(), LedgerError> {
        self.request(|ack| LedgerCommand::AppendLog {
            record: Box::new(record.clone()),
            ack,
        })
    }

    pub fn append_manifest(
        &self,
        department: &str,
        digest: &str,
        file_name: &str,
    ) -> Result<(), LedgerError> {
        self.request(|ack| LedgerCommand::AppendManifest {
            department: department.to_string(),
            digest: digest.to_string(),
            file_name: file_name.to_string(),
            ack,
        })
    }

    fn request(&self, build: impl FnOnce(Ack) -> LedgerCommand) -> Result<(), LedgerError> {
        let (ack, done) = bounded(1);
        self.sender
            .send(build(ack))
            .map_err(|_| LedgerError::WriterGone)?;
        done.recv().map_err(|_| LedgerError::WriterGone)?
    }
}

pub struct LedgerWriter {
    handle: LedgerHandle,
    thread: JoinHandle<()>,
}

impl LedgerWriter {
    pub fn start(run_log: RunLog, ingest_dir: PathBuf) -> Self {
        let (sender, receiver) = unbounded::<LedgerCommand>();
        let thread = thread::spawn(move || run_writer(receiver, run_log, ingest_dir));
        Self {
            handle: LedgerHandle { sender },
            thread,
        }
    }

    pub fn handle(&self) -> LedgerHandle {
        self.handle.clone()
    }

    /// Waits for the writer to drain. Every handle obtained from
    /// [`handle`](Self::handle) must have been dropped first.
    pub fn finish(self) -> Result<(), WorkerError> {
        drop(self.handle);
        self.thread.join().map_err(|e| {
            error!("Ledger writer panicked: {:?}", e);
            WorkerError::Panicked(0)
        })
    }
}

fn run_writer(receiver: Receiver<LedgerCommand>, run_log: RunLog, ingest_dir: PathBuf) {
    debug!("Ledger writer started for {}", run_log.path().display());

    for command in receiver {
        match command {
            LedgerCommand::AppendLog { record, ack } => {
                let result = run_log.append(&record);
                if let Err(e) = &result {
                    error!("Failed to append run log row: {}", e);
                }
                let _ = ack.send(result);
            }
            LedgerCommand::AppendManifest {
                department,
                digest,
                file_name,
                ack,
            } => {
                let result = append_entry(&ingest_dir, &department, &digest, &file_name);
                if let Err(e) = &result {
                    error!("Failed to append manifest entry: {}", e);
                }
                let _ = ack.send(result);
            }
        }
    }

    debug!("Ledger writer stopped");
}
