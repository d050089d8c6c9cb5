//! CLI output formatting

use crate::core::state::RunStatus;
use crate::flows::FlowEvent;
use crate::persistence::RunRecord;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Spinner shown while a flow polls a remote resource
pub fn polling_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a flow event for display
pub fn format_flow_event(event: &FlowEvent) -> String {
    match event {
        FlowEvent::FeatureGroupCreating { name } => {
            format!("{} Creating feature group {}", SPINNER, style(name).cyan())
        }
        FlowEvent::FeatureGroupExists { name } => format!(
            "{} Feature group {} already exists, reusing it",
            INFO,
            style(name).cyan()
        ),
        FlowEvent::FeatureGroupReady { name } => {
            format!("{} Feature group {} is active", CHECK, style(name).bold())
        }
        FlowEvent::RecordsIngested { group, count } => format!(
            "{} Ingested {} record(s) into {}",
            CHECK,
            style(count).cyan(),
            style(group).bold()
        ),
        FlowEvent::RecordVisible { group, record_id } => format!(
            "{} Record {} is readable from {}",
            CHECK,
            style(record_id).cyan(),
            style(group).bold()
        ),
        FlowEvent::QueryStarted { query_id } => {
            format!("{} Started offline query {}", SPINNER, style(query_id).dim())
        }
        FlowEvent::QueryCompleted {
            query_id,
            result_location,
        } => match result_location {
            Some(location) => format!(
                "{} Query {} finished, results at {}",
                CHECK,
                style(query_id).dim(),
                style(location).cyan()
            ),
            None => format!("{} Query {} finished", CHECK, style(query_id).dim()),
        },
        FlowEvent::PipelineUpserted { name } => {
            format!("{} Upserted pipeline {}", CHECK, style(name).bold())
        }
        FlowEvent::RunStarted { pipeline, run_id } => format!(
            "{} Started run {} of {}",
            ROCKET,
            style(run_id).dim(),
            style(pipeline).bold()
        ),
        FlowEvent::RunCompleted { run_id, status } => format!(
            "{} Run {} finished: {}",
            status_icon(*status),
            style(run_id).dim(),
            format_run_status(*status)
        ),
        FlowEvent::ArtifactPackaged { path } => format!(
            "{} Packaged artifact at {}",
            CHECK,
            style(path.display()).dim()
        ),
        FlowEvent::ArtifactUploaded { uri } => {
            format!("{} Uploaded artifact to {}", CHECK, style(uri).cyan())
        }
        FlowEvent::ModelCreated { name } => {
            format!("{} Model {} is registered", CHECK, style(name).bold())
        }
        FlowEvent::EndpointCreating { name } => format!(
            "{} Provisioning endpoint {} (large models can take a while)",
            SPINNER,
            style(name).cyan()
        ),
        FlowEvent::EndpointInService { name } => {
            format!("{} Endpoint {} is in service", CHECK, style(name).bold())
        }
    }
}

fn status_icon(status: RunStatus) -> Emoji<'static, 'static> {
    match status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed | RunStatus::Stopped => CROSS,
        _ => SPINNER,
    }
}

/// Format a run status for display
pub fn format_run_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Executing => style("EXECUTING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Stopped => style("STOPPED").yellow().to_string(),
    }
}

/// Format a history record for display
pub fn format_run_record(record: &RunRecord) -> String {
    let icon = match record.status.as_str() {
        "succeeded" => CHECK,
        "running" => SPINNER,
        _ => CROSS,
    };

    let remote = record
        .remote_id
        .as_deref()
        .map(|id| format!(" [{}]", id))
        .unwrap_or_default();

    format!(
        "{} {} - {} {}{} - {}",
        icon,
        style(&record.id.to_string()[..8]).dim(),
        style(record.kind.as_str()).cyan(),
        style(&record.target).bold(),
        style(remote).dim(),
        record.status
    )
}

/// Truncate long output lines (SQL, invocation responses) to the terminal
pub fn format_output(output: &str, max_lines: usize) -> String {
    let width = term_size::dimensions().map(|(w, _)| w).unwrap_or(100);

    let mut lines: Vec<String> = output
        .lines()
        .take(max_lines)
        .map(|line| {
            if line.chars().count() > width {
                let truncated: String = line.chars().take(width.saturating_sub(1)).collect();
                format!("{}…", truncated)
            } else {
                line.to_string()
            }
        })
        .collect();

    if output.lines().count() > max_lines {
        lines.push(style("…").dim().to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_flow_event_mentions_resource() {
        let event = FlowEvent::FeatureGroupReady {
            name: "customers".to_string(),
        };
        assert!(format_flow_event(&event).contains("customers"));

        let event = FlowEvent::RunCompleted {
            run_id: "r-1".to_string(),
            status: RunStatus::Succeeded,
        };
        assert!(format_flow_event(&event).contains("r-1"));
    }

    #[test]
    fn test_format_output_limits_lines() {
        let output = "a\nb\nc\nd\ne";
        let formatted = format_output(output, 3);
        assert!(formatted.contains('a'));
        assert!(formatted.contains('c'));
        assert!(!formatted.contains('e'));
    }
}
