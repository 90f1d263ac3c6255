//! Command handlers — thin wiring between the CLI surface and the
//! application services.

pub mod delete;
pub mod deploy;

use std::path::PathBuf;

use clap::Args;

/// Shared arguments for every deployment action.
#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Environment to deploy (as named under `environments:` in the config)
    #[arg(long)]
    pub env: String,

    /// Credential profile from ~/.strato/credentials.yaml
    #[arg(long)]
    pub profile: String,

    /// Path to the deployment configuration file
    #[arg(long, default_value = "config/deployment.yaml")]
    pub config: PathBuf,

    /// Plan every phase without mutating remote state
    #[arg(long)]
    pub dry_run: bool,

    /// Delete remote files absent from the staging manifest
    #[arg(long)]
    pub prune: bool,
}

/// Arguments for `strato delete`.
#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub deploy: DeployArgs,

    /// Also delete the backing database instance
    #[arg(long)]
    pub drop_database: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}
