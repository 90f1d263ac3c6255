//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::application::services::orchestrate::DeployAction;
use crate::commands;
use crate::output::OutputContext;

/// Deploy packaged apps to the Strato apps platform
#[derive(Debug, Parser)]
#[command(
    name = "strato",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output the final report in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the app and its backing resources
    Create(commands::DeployArgs),

    /// Deploy a new version of an existing app
    Update(commands::DeployArgs),

    /// Remove the app (and optionally its database)
    Delete(commands::DeleteArgs),
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails; `main` maps it to a
    /// non-zero exit status.
    pub async fn run(self) -> Result<()> {
        let Cli {
            json,
            quiet,
            no_color,
            command,
        } = self;
        // JSON mode implies quiet progress: the report is the only stdout.
        let ctx = OutputContext::new(no_color, quiet || json);
        match command {
            Command::Create(args) => {
                commands::deploy::run(&args, DeployAction::Create, &ctx, json).await
            }
            Command::Update(args) => {
                commands::deploy::run(&args, DeployAction::Update, &ctx, json).await
            }
            Command::Delete(args) => commands::delete::run(&args, &ctx, json).await,
        }
    }
}
