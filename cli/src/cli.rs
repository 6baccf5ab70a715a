use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aipkit")]
#[command(author, version, about = "Builds Archival Information Packages from a batch of folders")]
pub struct Cli {
    /// Batch directory containing metadata.csv and one folder per AIP
    #[arg(required = true)]
    pub batch_dir: PathBuf,

    /// Path to config file
    #[arg(short, long, env = "AIPKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of AIPs to process at once (overrides the config file)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Leave packages as plain tar files unless the sheet says otherwise
    #[arg(long)]
    pub no_zip: bool,

    /// Check the config, tools and batch sheet without processing anything
    #[arg(long)]
    pub check: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
