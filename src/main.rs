use anyhow::{Context, Result};
use mlpipe::cli::commands::{
    DeployCommand, HistoryCommand, ProvisionCommand, QueryCommand, RunCommand, ValidateCommand,
};
use mlpipe::cli::output::*;
use mlpipe::cli::{Cli, Command};
use mlpipe::client::{HttpPlatformClient, PlatformConfig};
use mlpipe::core::artifact::DeploymentConfig;
use mlpipe::core::config::PipelineConfig;
use mlpipe::core::query::JoinQuery;
use mlpipe::core::record::FeatureGroupConfig;
use mlpipe::flows::{Deployer, EventHandler, PipelineRunner, Poller, Provisioner};
use mlpipe::persistence::{FlowKind, HistoryBackend, RunRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Provision(cmd) => provision(cmd, &cli).await?,
        Command::Run(cmd) => run(cmd, &cli).await?,
        Command::Validate(cmd) => validate(cmd)?,
        Command::Deploy(cmd) => deploy(cmd, &cli).await?,
        Command::Query(cmd) => query(cmd, &cli).await?,
        Command::History(cmd) => history(cmd).await?,
    }

    Ok(())
}

fn platform_client(cli: &Cli) -> Result<HttpPlatformClient> {
    let mut config = PlatformConfig::from_env();
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    Ok(HttpPlatformClient::new(config)?)
}

fn event_printer() -> EventHandler {
    Arc::new(|event| println!("{}", format_flow_event(&event)))
}

async fn history_store() -> Result<Box<dyn HistoryBackend>> {
    #[cfg(feature = "sqlite")]
    {
        Ok(Box::new(
            mlpipe::persistence::SqliteHistory::with_default_path().await?,
        ))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        Ok(Box::new(mlpipe::persistence::InMemoryHistory::new()))
    }
}

async fn save_history(no_history: bool, record: &RunRecord) -> Result<()> {
    if no_history {
        return Ok(());
    }
    let store = history_store().await?;
    store.save(record).await?;
    println!(
        "{} Saved to history (ID: {})",
        INFO,
        style(&record.id.to_string()[..8]).dim()
    );
    Ok(())
}

async fn provision(cmd: &ProvisionCommand, cli: &Cli) -> Result<()> {
    let group = FeatureGroupConfig::from_file(&cmd.schema)
        .context("Failed to load feature group schema")?;
    println!(
        "{} Loaded feature group schema: {}",
        INFO,
        style(&group.name).bold()
    );

    let client = platform_client(cli)?;
    let poller = Poller::new(Duration::from_secs(cmd.poll_interval), cmd.max_polls);
    let provisioner = Provisioner::new(client)
        .with_poller(poller)
        .with_events(event_printer());

    let mut record = RunRecord::started(FlowKind::Provision, group.name.as_str());

    let flow = async {
        provisioner.ensure_group(&group).await?;
        if let Some(records) = &cmd.records {
            provisioner.ingest_file(&group, Path::new(records)).await?;
        }
        if let Some(probe) = &cmd.probe {
            provisioner.wait_for_record(&group.name, probe).await?;
        }
        Ok::<(), anyhow::Error>(())
    };

    match flow.await {
        Ok(()) => {
            record.finish("succeeded", None);
            save_history(cmd.no_history, &record).await?;
            println!(
                "\n{} Feature group {} provisioned {}",
                CHECK,
                style(&group.name).bold(),
                style("successfully").green()
            );
            Ok(())
        }
        Err(e) => {
            record.finish(format!("failed: {}", e), None);
            save_history(cmd.no_history, &record).await?;
            println!(
                "\n{} Provisioning {} {}",
                CROSS,
                style(&group.name).bold(),
                style("failed").red()
            );
            Err(e)
        }
    }
}

async fn run(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    let config =
        PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let graph = config.to_graph();

    // Apply parameter overrides
    let mut parameters = graph.parameters.clone();
    for (key, value) in &cmd.parameter {
        parameters.insert(key.clone(), value.clone());
        println!(
            "{} Parameter override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    let client = platform_client(cli)?;
    let poller = Poller::new(Duration::from_secs(cmd.poll_interval), cmd.max_polls);
    let runner = PipelineRunner::new(client)
        .with_poller(poller)
        .with_events(event_printer());

    let mut record = RunRecord::started(FlowKind::Pipeline, config.name.as_str());

    let flow = async {
        runner.submit(&graph).await?;
        let run_id = runner.start(&graph.name, &parameters).await?;
        if cmd.wait {
            runner.wait(&run_id).await?;
        }
        Ok::<String, anyhow::Error>(run_id)
    };

    match flow.await {
        Ok(run_id) => {
            record.finish("succeeded", Some(run_id));
            save_history(cmd.no_history, &record).await?;
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&config.name).bold(),
                style("successfully").green()
            );
            Ok(())
        }
        Err(e) => {
            record.finish(format!("failed: {}", e), None);
            save_history(cmd.no_history, &record).await?;
            println!(
                "\n{} {} {}",
                CROSS,
                style(&config.name).bold(),
                style("failed").red()
            );
            Err(e)
        }
    }
}

fn validate(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Steps: {}", style(config.steps.len()).cyan());
            println!("  Parameters: {}", style(config.parameters.len()).cyan());

            let graph = config.to_graph();
            println!(
                "  Order: {}",
                style(graph.execution_order().join(" → ")).dim()
            );

            if cmd.json {
                let json = serde_json::to_string_pretty(&graph.to_definition())?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

async fn deploy(cmd: &DeployCommand, cli: &Cli) -> Result<()> {
    let config =
        DeploymentConfig::from_file(&cmd.file).context("Failed to load deployment config")?;
    println!(
        "{} Loaded deployment: {} on {} x{}",
        INFO,
        style(&config.model_name).bold(),
        style(&config.resources.instance_type).cyan(),
        config.resources.instance_count
    );

    let staging = cmd
        .staging
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("mlpipe-staging"));

    let client = platform_client(cli)?;
    let poller = Poller::new(Duration::from_secs(cmd.poll_interval), 1);
    let deployer = Deployer::new(client)
        .with_poller(poller)
        .with_events(event_printer());

    let mut record = RunRecord::started(FlowKind::Deploy, config.model_name.as_str());

    match deployer.deploy(&config, &staging).await {
        Ok(endpoint) => {
            record.finish("succeeded", Some(endpoint.clone()));
            save_history(cmd.no_history, &record).await?;

            if let Some(payload) = &cmd.invoke {
                let payload: serde_json::Value =
                    serde_json::from_str(payload).context("Invalid invocation payload")?;
                let response = deployer.invoke(&endpoint, &payload).await?;
                println!("{} Invocation response:", INFO);
                println!(
                    "{}",
                    format_output(&serde_json::to_string_pretty(&response)?, 20)
                );
            }

            println!(
                "\n{} {} deployed {}",
                CHECK,
                style(&config.model_name).bold(),
                style("successfully").green()
            );
            Ok(())
        }
        Err(e) => {
            record.finish(format!("failed: {}", e), None);
            save_history(cmd.no_history, &record).await?;
            println!(
                "\n{} Deployment of {} {}",
                CROSS,
                style(&config.model_name).bold(),
                style("failed").red()
            );
            Err(e)
        }
    }
}

async fn query(cmd: &QueryCommand, cli: &Cli) -> Result<()> {
    let left = FeatureGroupConfig::from_file(&cmd.left)
        .context("Failed to load left feature group schema")?;
    let right = FeatureGroupConfig::from_file(&cmd.right)
        .context("Failed to load right feature group schema")?;

    let join = JoinQuery::for_groups(&left, &right, cmd.join_key.as_str())?;
    let sql = join.build();
    println!("{} Join query:", INFO);
    println!("{}", format_output(&sql, 20));

    if cmd.execute {
        let output_location = cmd.output_location.as_deref().ok_or_else(|| {
            anyhow::anyhow!("--output-location is required with --execute")
        })?;

        let client = platform_client(cli)?;
        let poller = Poller::new(Duration::from_secs(cmd.poll_interval), cmd.max_polls);
        let provisioner = Provisioner::new(client).with_poller(poller);

        let spinner = polling_spinner("Waiting for query results");
        let result = provisioner.run_query(&join, output_location).await;
        spinner.finish_and_clear();

        match result? {
            Some(location) => println!(
                "{} Query finished, results at {}",
                CHECK,
                style(location).cyan()
            ),
            None => println!("{} Query finished", CHECK),
        }
    }

    Ok(())
}

async fn history(cmd: &HistoryCommand) -> Result<()> {
    let store = history_store().await?;
    let records = store.list(cmd.limit).await?;

    if records.is_empty() {
        println!("{} No flows in history", INFO);
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "flows": records });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Flow history (showing latest {}):", INFO, cmd.limit);
        for record in &records {
            println!("  {}", format_run_record(record));
        }
    }

    Ok(())
}
