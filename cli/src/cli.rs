//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{self, Globals};

/// Fleet disk audit and in-place volume expansion through a bastion
#[derive(Parser)]
#[command(
    name = "swell",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Cloud region override
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Credential profile override
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Remote login user on fleet instances
    #[arg(long, global = true, env = "SWELL_SSH_USER", default_value = crate::infra::ssh::DEFAULT_SSH_USER)]
    pub ssh_user: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Audit fleet disk usage and list instances over the threshold
    Check(commands::check::CheckArgs),

    /// Audit, then expand volumes and grow filesystems on flagged instances
    Expand(commands::expand::ExpandArgs),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error when the selected command fails at the batch level.
    pub async fn run(self) -> Result<()> {
        let Cli { json, quiet, no_color, region, profile, ssh_user, command } = self;
        let globals = Globals { json, region, profile, ssh_user };
        match command {
            Command::Version => commands::version::run(json),
            Command::Check(args) => {
                let ctx = crate::output::OutputContext::new(no_color, quiet);
                commands::check::run(&ctx, &globals, &args).await
            }
            Command::Expand(args) => {
                let ctx = crate::output::OutputContext::new(no_color, quiet);
                commands::expand::run(&ctx, &globals, &args).await
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_defaults() {
        let cli = Cli::try_parse_from(["swell", "check"]).expect("parse");
        match cli.command {
            Command::Check(args) => assert_eq!(args.threshold, 80),
            _ => panic!("expected check command"),
        }
        assert_eq!(cli.ssh_user, "ec2-user");
        assert!(!cli.json);
    }

    #[test]
    fn test_expand_defaults() {
        let cli = Cli::try_parse_from(["swell", "expand"]).expect("parse");
        match cli.command {
            Command::Expand(args) => {
                assert_eq!(args.threshold, 80);
                assert_eq!(args.increment, 30);
                assert!(!args.yes);
            }
            _ => panic!("expected expand command"),
        }
    }

    #[test]
    fn test_threshold_over_100_is_rejected() {
        assert!(Cli::try_parse_from(["swell", "check", "--threshold", "150"]).is_err());
    }

    #[test]
    fn test_global_flags_reach_any_subcommand() {
        let cli = Cli::try_parse_from([
            "swell",
            "expand",
            "--region",
            "ap-northeast-2",
            "--profile",
            "ops",
            "--yes",
        ])
        .expect("parse");
        assert_eq!(cli.region.as_deref(), Some("ap-northeast-2"));
        assert_eq!(cli.profile.as_deref(), Some("ops"));
    }
}
