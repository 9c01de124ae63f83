//! Command line interface

use clap::Parser;
use dropload_common::logging::LogLevel;
use std::path::PathBuf;

use crate::config::Config;
use crate::journal::JournalPolicy;

/// Load fixed-width data files into PostgreSQL
///
/// Persists every spec source in the spec directory, then ingests every data
/// file in the data directory. Files already loaded are skipped; interrupted
/// files resume where they stopped.
#[derive(Parser, Debug)]
#[command(name = "dropload")]
pub struct Cli {
    /// Directory of `<spec>.csv` spec sources
    #[arg(long, env = "DROPLOAD_SPEC_DIR")]
    pub spec_dir: Option<PathBuf>,

    /// Directory of `<spec>_<timestamp><label>.txt` data files
    #[arg(long, env = "DROPLOAD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Record progress after every row instead of once per file
    #[arg(short = 'c', long)]
    pub checkpoint_each_row: bool,

    /// Log at info level
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Log at debug level
    #[arg(short = 'V', long)]
    pub debug: bool,

    /// Skip applying database migrations
    #[arg(long)]
    pub no_migrate: bool,
}

impl Cli {
    /// Base log level from the verbosity flags (default warn)
    pub fn log_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::Debug
        } else if self.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }

    /// Overlay command line flags onto loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.spec_dir {
            config.ingest.spec_dir = dir.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.ingest.data_dir = dir.clone();
        }
        if self.checkpoint_each_row {
            config.ingest.journal_policy = JournalPolicy::PerRow;
        }
        if self.no_migrate {
            config.ingest.run_migrations = false;
        }
    }
}
