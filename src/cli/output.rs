//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{ConfigHasher, ValidationResult};
use crate::engine::{ActionType, DeploymentPlan, DeploymentReport};
use crate::state::{StackState, StoredOutput};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan action row for table display.
#[derive(Tabled)]
struct PlanActionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Resource")]
    resource: String,
}

/// Output row for table display.
#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a configuration record for display.
    #[must_use]
    pub fn format_config<T: Serialize>(&self, config: &T) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(config).unwrap_or_default(),
            OutputFormat::Text => serde_yaml::to_string(config).unwrap_or_default(),
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid\n", "✓".green())
                } else {
                    let mut output =
                        format!("{} {} validation error(s):\n", "✗".red(), result.error_count());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                    output
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    /// Formats a deployment plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &DeploymentPlan) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &DeploymentPlan) -> String {
        if plan.is_empty() {
            return format!("{} No resources declared for {}.\n", "✓".green(), plan.stack);
        }

        let hasher = ConfigHasher::new();
        let mut output = String::new();

        let _ = write!(output, "\nDeployment Plan: {}\n", plan.stack);
        let _ = write!(output, "   Config hash: {}", hasher.short_hash(&plan.config_hash));
        match &plan.previous_hash {
            Some(previous) if plan.config_changed() => {
                let _ = write!(output, " (was {})", hasher.short_hash(previous));
            }
            Some(_) => output.push_str(" (unchanged)"),
            None => output.push_str(" (first deployment)"),
        }
        output.push_str("\n\n");

        let rows: Vec<PlanActionRow> = plan
            .actions
            .iter()
            .enumerate()
            .map(|(i, a)| PlanActionRow {
                index: i + 1,
                action: Self::format_action_type(a.action_type),
                kind: a.kind.to_string(),
                resource: Self::truncate(&a.logical_name, 48),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let _ = write!(
            output,
            "\nPlan: {} to create, {} to update, {} to untrack\n",
            plan.count(ActionType::Create).to_string().green(),
            plan.count(ActionType::Update).to_string().yellow(),
            plan.count(ActionType::Untrack).to_string().red()
        );

        if !plan.exports.is_empty() {
            output.push_str("\nOutputs:\n");
            for export in &plan.exports {
                let _ = writeln!(output, "   {}: {}", export.name, Self::format_value(&export.value));
            }
        }

        output
    }

    /// Formats stored stack outputs.
    #[must_use]
    pub fn format_outputs(&self, state: &StackState, show_secrets: bool) -> String {
        let values = Self::output_values(&state.outputs, show_secrets);
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&values).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("\nOutputs: {}\n", state.key);
                let _ = writeln!(
                    output,
                    "   Last updated: {}\n",
                    state.last_updated.format("%Y-%m-%d %H:%M")
                );

                if values.is_empty() {
                    output.push_str("   No outputs recorded.\n");
                    return output;
                }

                let rows: Vec<OutputRow> = values
                    .iter()
                    .map(|(name, value)| OutputRow {
                        name: name.clone(),
                        value: Self::format_value(value),
                    })
                    .collect();
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');

                if let Some(entry) = state.history.last() {
                    let status = if entry.success { "✓".green() } else { "✗".red() };
                    let _ = write!(
                        output,
                        "\n{status} Last run {} at {}\n",
                        entry.run_id,
                        entry.timestamp.format("%Y-%m-%d %H:%M")
                    );
                }

                output
            }
        }
    }

    /// Formats the result of a deployment.
    #[must_use]
    pub fn format_report(&self, report: &DeploymentReport) -> String {
        let outputs = Self::output_values(&report.outputs, false);
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "run_id": report.run_id,
                    "applied": report.applied,
                    "outputs": outputs,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!(
                    "{} Deployment complete: {} resource(s) applied\n",
                    "✓".green(),
                    report.applied.len()
                );
                if !outputs.is_empty() {
                    output.push_str("\nOutputs:\n");
                    for (name, value) in &outputs {
                        let _ = writeln!(output, "   {name}: {}", Self::format_value(value));
                    }
                }
                output
            }
        }
    }

    fn output_values(
        outputs: &BTreeMap<String, StoredOutput>,
        show_secrets: bool,
    ) -> BTreeMap<String, Value> {
        outputs
            .iter()
            .map(|(name, output)| {
                let value = if show_secrets {
                    output.value.clone()
                } else {
                    output.display_value()
                };
                (name.clone(), value)
            })
            .collect()
    }

    /// Renders a value without JSON quotes around plain strings.
    fn format_value(value: &Value) -> String {
        value
            .as_str()
            .map_or_else(|| value.to_string(), ToString::to_string)
    }

    /// Formats an action type with color.
    fn format_action_type(action_type: ActionType) -> String {
        match action_type {
            ActionType::Create => "+create".green().to_string(),
            ActionType::Update => "~update".yellow().to_string(),
            ActionType::Untrack => "-untrack".red().to_string(),
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.status_line("success", "✓".green().to_string(), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.status_line("error", "✗".red().to_string(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.status_line("warning", "⚠".yellow().to_string(), message)
    }

    fn status_line(&self, status: &str, marker: String, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{marker} {message}"),
        }
    }
}
