//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Research Pipeline Core - checkpoint-driven research job runner
#[derive(Parser)]
#[command(
    name = "research-pipeline",
    about = "Runs and resumes checkpoint-driven research jobs",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Submit (or resume) a research job and run it to completion or pause
    Run {
        /// Unique job identifier. Re-running with the same id resumes from
        /// its last checkpoint instead of starting over.
        #[arg(long)]
        job_id: String,

        /// Name of the entity to research
        #[arg(long)]
        target: String,

        /// Traversal depth for discovered connected zones (0 disables
        /// discovery entirely)
        #[arg(long)]
        depth: Option<u32>,

        /// Token budget for this job; falls back to the configured default
        #[arg(long)]
        budget: Option<u64>,

        /// Output format for the resulting package
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a job's persisted checkpoint status without running it
    Status {
        /// Job identifier to inspect
        job_id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for status/run commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Table,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "table" => Ok(Self::Table),
            _ => Err(format!("Unknown format: {}. Use: text, json, or table", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Table => write!(f, "table"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["research-pipeline"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["research-pipeline", "run", "--job-id", "job-1", "--target", "Waterdeep"]);
        if let Some(Command::Run { job_id, target, depth, budget, .. }) = cli.command {
            assert_eq!(job_id, "job-1");
            assert_eq!(target, "Waterdeep");
            assert!(depth.is_none());
            assert!(budget.is_none());
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_run_with_depth_and_budget() {
        let cli = Cli::parse_from([
            "research-pipeline",
            "run",
            "--job-id",
            "job-1",
            "--target",
            "Waterdeep",
            "--depth",
            "2",
            "--budget",
            "250000",
        ]);
        if let Some(Command::Run { depth, budget, .. }) = cli.command {
            assert_eq!(depth, Some(2));
            assert_eq!(budget, Some(250_000));
        } else {
            panic!("Expected Run command");
        }
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["research-pipeline", "status", "job-1"]);
        if let Some(Command::Status { job_id, .. }) = cli.command {
            assert_eq!(job_id, "job-1");
        } else {
            panic!("Expected Status command");
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!(matches!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table)));
        assert!("invalid".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["research-pipeline", "-c", "/path/to/config.yml", "status", "job-1"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
    }
}
