use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, info_span, warn};

use crate::ledger::LedgerHandle;
use crate::stages::{self, MetadataRule};
use crate::storage::ErrorRouter;
use crate::tools::ToolRunner;

use super::config::PipelineConfig;
use super::context::Aip;
use super::error::{ErrorCategory, Halt, StepResult};
use super::progress::{ProgressEvent, ProgressReporter};
use super::stage::Stage;

/// How one AIP left the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AipOutcome {
    Complete,
    Quarantined {
        category: ErrorCategory,
        path: PathBuf,
    },
    /// Stopped without being moved; the run log row is the only record.
    Halted { stage: Stage },
}

impl fmt::Display for AipOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => f.write_str("complete"),
            Self::Quarantined { category, .. } => write!(f, "quarantined in {}", category),
            Self::Halted { stage } => write!(f, "stopped at {}", stage),
        }
    }
}

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    runner: Arc<dyn ToolRunner>,
    ledger: LedgerHandle,
    router: ErrorRouter,
    metadata_rules: Vec<MetadataRule>,
}

impl Pipeline {
    pub fn new(
        config: Arc<PipelineConfig>,
        runner: Arc<dyn ToolRunner>,
        ledger: LedgerHandle,
    ) -> Self {
        let router = ErrorRouter::new(&config.errors_dir);
        let metadata_rules = stages::metadata_rules(&config.metadata_rules);
        Self {
            config,
            runner,
            ledger,
            router,
            metadata_rules,
        }
    }

    /// Runs every stage for one AIP, routes a halt, and appends its run log
    /// row. Nothing that goes wrong inside escapes as an error.
    pub fn run(&self, mut aip: Aip, progress: &dyn ProgressReporter) -> AipOutcome {
        let _aip_span = info_span!("aip", id = %aip.id, department = %aip.department).entered();
        progress.report(ProgressEvent::Started {
            aip_id: aip.id.clone(),
        });

        let outcome = match self.run_stages(&mut aip) {
            Ok(()) => {
                aip.log.complete();
                info!("Finished processing {}", aip.id);
                AipOutcome::Complete
            }
            Err((stage, halt)) => self.route_halt(&mut aip, stage, halt),
        };

        if let Err(e) = self.ledger.append_log(&aip.log) {
            error!("Could not record {} in the run log: {}", aip.id, e);
        }

        progress.report(ProgressEvent::Finished {
            aip_id: aip.id.clone(),
            outcome: outcome.clone(),
        });
        outcome
    }

    fn run_stages(&self, aip: &mut Aip) -> Result<(), (Stage, Halt)> {
        for stage in Stage::ALL {
            let _step = info_span!("stage", name = stage.name()).entered();
            self.run_stage(stage, aip).map_err(|halt| (stage, halt))?;
        }
        Ok(())
    }

    fn run_stage(&self, stage: Stage, aip: &mut Aip) -> StepResult {
        let config = self.config.as_ref();
        let runner = self.runner.as_ref();
        match stage {
            Stage::RenameFolder => stages::rename::rename_folder(aip),
            Stage::Scrub => stages::scrub::delete_temp_files(aip),
            Stage::Structure => stages::structure::structure_directory(aip, &self.metadata_rules),
            Stage::Extract => stages::extract::characterize(aip, config, runner),
            Stage::Merge => stages::merge::combine_fits(aip),
            Stage::BuildRecord => stages::preservation::build_record(aip, config, runner),
            Stage::OrganizeXml => stages::preservation::organize_xml(aip, config),
            Stage::ValidateRecord => stages::preservation::validate_record(aip, config, runner),
            Stage::Bag => stages::bagging::make_bag(aip),
            Stage::ValidateBag => stages::bagging::validate_bag(aip),
            Stage::Package => stages::package::make_package(aip, config, runner),
            Stage::Manifest => stages::manifest::add_to_manifest(aip, config, &self.ledger),
        }
    }

    fn route_halt(&self, aip: &mut Aip, stage: Stage, halt: Halt) -> AipOutcome {
        aip.log
            .halt(halt.field().unwrap_or(stage.log_field()), halt.message());

        let quarantine = match halt {
            Halt::Quarantine(q) => q,
            Halt::Stop { message } => {
                warn!("Stopped {} at {}: {}", aip.id, stage, message);
                return AipOutcome::Halted { stage };
            }
        };

        match self.router.quarantine(
            &aip.directory,
            &aip.id,
            quarantine.category,
            quarantine.diagnostic.as_ref(),
        ) {
            Ok(path) => {
                warn!(
                    "Quarantined {} in {} at {}: {}",
                    aip.id, quarantine.category, stage, quarantine.message
                );
                aip.directory = path.clone();
                AipOutcome::Quarantined {
                    category: quarantine.category,
                    path,
                }
            }
            Err(e) => {
                error!("Could not quarantine {}: {}", aip.id, e);
                AipOutcome::Halted { stage }
            }
        }
    }
}
