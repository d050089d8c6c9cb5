//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    DeployCommand, HistoryCommand, ProvisionCommand, QueryCommand, RunCommand, ValidateCommand,
};

/// Orchestration CLI for a managed ML platform
#[derive(Debug, Parser, Clone)]
#[command(name = "mlpipe")]
#[command(author = "mlpipe Contributors")]
#[command(version = "0.1.0")]
#[command(
    about = "Feature store provisioning, pipeline submission, and model deployment",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Platform endpoint (overrides MLPIPE_ENDPOINT)
    #[arg(short, long, global = true)]
    pub endpoint: Option<String>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Provision a feature group and ingest records
    Provision(ProvisionCommand),

    /// Submit a pipeline and start a run
    Run(RunCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// Package and deploy a model behind an endpoint
    Deploy(DeployCommand),

    /// Assemble an offline-store join query
    Query(QueryCommand),

    /// Show flow history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

use std::ffi::OsString;
