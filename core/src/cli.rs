use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::config::BuildConfig;
use crate::error::{BuildError, Result};

#[derive(Parser, Debug, Clone)]
#[command(name = "bygg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(value_name = "TARGET", default_value = "all", help = "Target to build")]
    pub target: String,

    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        default_value = "byggfil",
        help = "Bygg file"
    )]
    pub file: PathBuf,

    #[arg(
        short = 'C',
        long = "directory",
        value_name = "DIR",
        default_value = ".",
        help = "Base directory"
    )]
    pub base_dir: PathBuf,

    #[arg(short = 'n', long = "dry-run", help = "Performs a dry run")]
    pub dry_run: bool,

    #[arg(
        short = 'v',
        action = ArgAction::Count,
        help = "Verbose output, repeat (-vv) for very verbose"
    )]
    pub verbose: u8,

    #[arg(short = 'w', long, help = "Rebuild whenever a dependency changes")]
    pub watch: bool,

    #[arg(long, value_name = "PATH", help = "Settings file path")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parses the arguments of a nested `bygg` build command.
    pub fn from_command_args(args: &[String]) -> Result<Self> {
        let argv = std::iter::once("bygg".to_string()).chain(args.iter().cloned());
        Cli::try_parse_from(argv).map_err(|e| {
            BuildError::command(format!("invalid bygg arguments {:?}: {}", args, e))
        })
    }

    pub fn build_config(&self) -> BuildConfig {
        BuildConfig {
            file: self.file.clone(),
            base_dir: self.base_dir.clone(),
            target: self.target.clone(),
            dry_run: self.dry_run,
            verbose: self.verbose > 0,
            very_verbose: self.verbose > 1,
            watch: self.watch,
        }
    }
}
