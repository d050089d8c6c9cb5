//! CLI command definitions

use clap::Args;

/// Provision a feature group and ingest records
#[derive(Debug, Args, Clone)]
pub struct ProvisionCommand {
    /// Path to feature group schema YAML
    #[arg(short, long)]
    pub schema: String,

    /// JSON-lines file of records to ingest
    #[arg(long)]
    pub records: Option<String>,

    /// Record id to poll in the online store until it becomes readable
    #[arg(long)]
    pub probe: Option<String>,

    /// Don't save the flow to history
    #[arg(long)]
    pub no_history: bool,

    /// Seconds between readiness polls
    #[arg(long, default_value_t = 15)]
    pub poll_interval: u64,

    /// Maximum number of readiness polls
    #[arg(long, default_value_t = 120)]
    pub max_polls: usize,
}

/// Submit a pipeline and start a run
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Parameter overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub parameter: Vec<(String, String)>,

    /// Block until the run reaches a terminal state
    #[arg(long)]
    pub wait: bool,

    /// Don't save the flow to history
    #[arg(long)]
    pub no_history: bool,

    /// Seconds between run status polls
    #[arg(long, default_value_t = 15)]
    pub poll_interval: u64,

    /// Maximum number of run status polls
    #[arg(long, default_value_t = 240)]
    pub max_polls: usize,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Package and deploy a model behind an endpoint
#[derive(Debug, Args, Clone)]
pub struct DeployCommand {
    /// Path to deployment YAML file
    #[arg(short, long)]
    pub file: String,

    /// Staging directory for the packaged artifact
    #[arg(long)]
    pub staging: Option<String>,

    /// JSON payload for a smoke invocation once the endpoint is up
    #[arg(long)]
    pub invoke: Option<String>,

    /// Don't save the flow to history
    #[arg(long)]
    pub no_history: bool,

    /// Seconds between endpoint status polls
    #[arg(long, default_value_t = 30)]
    pub poll_interval: u64,
}

/// Assemble (and optionally run) an offline-store join query
#[derive(Debug, Args, Clone)]
pub struct QueryCommand {
    /// Path to the left feature group schema YAML
    #[arg(long)]
    pub left: String,

    /// Path to the right feature group schema YAML
    #[arg(long)]
    pub right: String,

    /// Feature name shared by both groups to join on
    #[arg(long)]
    pub join_key: String,

    /// Submit the query to the managed query engine and wait for it
    #[arg(long)]
    pub execute: bool,

    /// Object-store location for query results (required with --execute)
    #[arg(long)]
    pub output_location: Option<String>,

    /// Seconds between query status polls
    #[arg(long, default_value_t = 5)]
    pub poll_interval: u64,

    /// Maximum number of query status polls
    #[arg(long, default_value_t = 120)]
    pub max_polls: usize,
}

/// Show flow history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Number of recent flows to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
