//! CLI command definitions and subcommands for the `texloomd` admin binary
//! (SPEC_FULL.md §3: a thin operator surface over the driver/reconciler,
//! useful even though the HTTP gateway itself is out of scope).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// texloomd - document-generation workflow orchestrator
#[derive(Parser)]
#[command(
    name = "texloomd",
    about = "Workflow orchestrator for the document-generation pipeline",
    version,
    after_help = "State is persisted under the configured store.path (default: .texloom/store)."
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
    /// Run the dispatcher and reconciler loop in the foreground
    Serve,

    /// Submit a user signal against a project (spec.md §6.1)
    Signal {
        /// Client id for idempotency dedup
        #[arg(long)]
        client_id: String,

        /// Project id the signal applies to
        #[arg(long)]
        project_id: String,

        /// Signal to apply
        #[arg(value_enum)]
        signal: SignalArg,

        /// Version id, required for `all_approved`
        #[arg(long)]
        version_id: Option<String>,

        /// Block id, required for block-scoped signals
        #[arg(long)]
        block_id: Option<String>,
    },

    /// Show a project's current state and block tree
    Status {
        /// Project id to inspect
        project_id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show dispatcher submission/retry counters for this process
    Metrics {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Signal vocabulary accepted on the CLI (spec.md §6.1's `UserSignal`).
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum SignalArg {
    Validated,
    Redo,
    QcOk,
    ProblemDetected,
    AllApproved,
    CancelProject,
}

/// Output format for status/metrics commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["texloomd"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_serve() {
        let cli = Cli::parse_from(["texloomd", "serve"]);
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn test_cli_parse_signal() {
        let cli = Cli::parse_from([
            "texloomd",
            "signal",
            "--client-id",
            "cli",
            "--project-id",
            "p1",
            "--block-id",
            "b1",
            "validated",
        ]);
        match cli.command {
            Some(Command::Signal {
                client_id,
                project_id,
                block_id,
                ..
            }) => {
                assert_eq!(client_id, "cli");
                assert_eq!(project_id, "p1");
                assert_eq!(block_id.as_deref(), Some("b1"));
            }
            _ => panic!("expected Signal command"),
        }
    }

    #[test]
    fn test_cli_parse_status() {
        let cli = Cli::parse_from(["texloomd", "status", "p1"]);
        assert!(matches!(cli.command, Some(Command::Status { .. })));
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("invalid".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["texloomd", "-c", "/path/to/config.yml", "status", "p1"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
    }
}
