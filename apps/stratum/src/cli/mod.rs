//! # Stratum CLI Module
//!
//! This module implements the CLI interface for Stratum.
//!
//! ## Available Commands
//!
//! - `analyze` - Run the batch over a project descriptor and a scan report
//! - `show` - Show what the store holds for one resource
//! - `status` - Show store statistics
//! - `init` - Initialize a new store

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stratum_core::StratumError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Stratum - batch code analysis engine
///
/// Indexes analyzed resources module by module and aggregates their
/// measures bottom-up.
#[derive(Parser, Debug)]
#[command(name = "stratum")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the analysis store
    #[arg(short = 'D', long, global = true, default_value = "stratum.redb")]
    pub database: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the batch: scan, lock, decorate and clear every module
    Analyze {
        /// Project descriptor (TOML)
        #[arg(short, long, default_value = "stratum.toml")]
        config: PathBuf,

        /// Scan report produced by the analyzers (JSON)
        #[arg(short, long)]
        report: PathBuf,

        /// Keep results in memory instead of writing the store
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the stored component, snapshot and measures of a resource
    Show {
        /// Effective key, e.g. `shop-core:src/Main.java`
        key: String,
    },

    /// Show store statistics
    Status,

    /// Initialize a new empty store
    Init {
        /// Force initialization even if the store exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), StratumError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Analyze {
            config,
            report,
            dry_run,
        }) => cmd_analyze(
            &cli.database,
            json_mode,
            cli.verbose,
            &config,
            &report,
            dry_run,
        ),
        Some(Commands::Show { key }) => cmd_show(&cli.database, json_mode, &key),
        Some(Commands::Init { force }) => cmd_init(&cli.database, force),
        Some(Commands::Status) | None => cmd_status(&cli.database, json_mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_analyze_with_globals() {
        let cli = Cli::try_parse_from([
            "stratum",
            "--json-mode",
            "-D",
            "out.redb",
            "analyze",
            "--report",
            "scan.json",
            "--dry-run",
        ])
        .expect("parse");
        assert!(cli.json_mode);
        assert_eq!(cli.database, PathBuf::from("out.redb"));
        match cli.command {
            Some(Commands::Analyze {
                config,
                report,
                dry_run,
            }) => {
                assert_eq!(config, PathBuf::from("stratum.toml"));
                assert_eq!(report, PathBuf::from("scan.json"));
                assert!(dry_run);
            }
            other => unreachable!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_means_status() {
        let cli = Cli::try_parse_from(["stratum", "-q"]).expect("parse");
        assert!(cli.quiet);
        assert!(cli.command.is_none());
    }
}
