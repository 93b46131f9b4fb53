//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Infusethink - Azure infrastructure for the Infusethink platform.
#[derive(Parser, Debug)]
#[command(name = "infusethink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Stack to operate on (dev, prod or the shared stack).
    #[arg(short, long, global = true, env = "INFUSETHINK_STACK", default_value = "dev")]
    pub stack: String,

    /// Directory holding stack state.
    #[arg(long, global = true, env = "INFUSETHINK_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Directory holding the `Infusethink.<stack>.yaml` settings files.
    #[arg(long, global = true)]
    pub settings_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the resolved configuration record.
    Config,

    /// Validate the configuration record and stack settings.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Build the resource graph and display the deployment plan.
    Preview,

    /// Deploy the stack to Azure.
    Up {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the stack's stored outputs.
    Outputs {
        /// Print secret outputs in plaintext.
        #[arg(long)]
        show_secrets: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_up_with_stack() {
        let cli = Cli::try_parse_from(["infusethink", "--stack", "prod", "up", "--yes"]).unwrap();
        assert_eq!(cli.stack, "prod");
        assert!(matches!(cli.command, Commands::Up { yes: true }));
        assert_eq!(cli.output, OutputFormat::Text);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "infusethink",
            "outputs",
            "--show-secrets",
            "--output",
            "json",
            "--state-dir",
            "/tmp/state",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/state")));
        assert!(matches!(cli.command, Commands::Outputs { show_secrets: true }));
    }
}
