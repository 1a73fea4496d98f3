//! Command line surface of the `chassis-modules` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sonic_utilities_common::config::DEFAULT_CONFIG_PATH;
use sonic_utilities_common::platform::ALL_DPUS;
use sonic_utilities_common::PlatformInfo;

use crate::chassis::TransitionReport;
use crate::error::{ChassisError, ChassisResult};
use crate::fabric::ReconcileOutcome;
use crate::guard::{TransitionOutcome, TransitionState};
use crate::module::{format_flag, AdminStatus};

/// SONiC chassis module administration
#[derive(Parser, Debug)]
#[command(name = "chassis-modules")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Change chassis module configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Show chassis module state
    #[command(subcommand)]
    Show(ShowCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Chassis-module shutdown of module
    Shutdown {
        #[arg(value_name = "MODULE_NAME")]
        module_name: String,
    },

    /// Chassis-module startup of module
    Startup {
        #[arg(value_name = "MODULE_NAME")]
        module_name: String,
    },

    /// Passwordless SSH to DPUs
    #[cfg(feature = "dpu-ssh")]
    #[command(subcommand)]
    DpuSsh(DpuSshCommand),

    /// Credentials used to provision DPUs
    #[cfg(feature = "dpu-ssh")]
    #[command(subcommand)]
    DpuCredentials(CredentialsCommand),
}

#[cfg(feature = "dpu-ssh")]
#[derive(Subcommand, Debug)]
pub enum DpuSshCommand {
    /// Install the local SSH key on a DPU
    Enable {
        /// DPU module name or "all"
        dpu: String,
    },

    /// Remove SSH keys from a DPU
    Disable {
        /// DPU module name or "all"
        dpu: String,
    },
}

#[cfg(feature = "dpu-ssh")]
#[derive(Subcommand, Debug)]
pub enum CredentialsCommand {
    /// Append a username/password pair
    Add { username: String, password: String },

    /// Replace all pairs with one username/password pair
    Replace { username: String, password: String },

    /// Delete the credentials file
    Remove,
}

#[derive(Subcommand, Debug)]
pub enum ShowCommand {
    /// Admin state and transition progress of chassis modules
    Status {
        #[arg(value_name = "MODULE_NAME")]
        module_name: Option<String>,
    },

    /// Passwordless SSH state of DPUs
    #[cfg(feature = "dpu-ssh")]
    DpuSsh {
        /// DPU module name or "all"
        dpu: String,
    },
}

/// Expands a DPU argument into canonical DPU names.
pub fn select_dpus(platform: &PlatformInfo, arg: &str) -> ChassisResult<Vec<String>> {
    if arg.eq_ignore_ascii_case(ALL_DPUS) {
        return Ok(platform.dpu_list().to_vec());
    }
    platform
        .find_dpu(arg)
        .map(|dpu| vec![dpu.to_string()])
        .ok_or_else(|| ChassisError::UnknownDpu {
            name: arg.to_string(),
            available: platform.dpu_options(),
        })
}

/// Operator messages for a completed shutdown or startup.
pub fn transition_messages(report: &TransitionReport) -> Vec<String> {
    let mut lines = request_messages(report);
    if let Some(fabric) = &report.fabric {
        lines.extend(fabric_messages(fabric));
    }
    lines
}

/// Messages for the transition guard's decision, printed before any
/// fabric reconciliation starts.
pub fn request_messages(report: &TransitionReport) -> Vec<String> {
    let module = report.module.as_str();
    let verb = match report.target {
        AdminStatus::Down => "shutdown",
        AdminStatus::Up => "startup",
    };
    let mut lines = Vec::new();

    match report.outcome {
        TransitionOutcome::AlreadyInTargetState => {
            lines.push(match report.target {
                AdminStatus::Down => format!("Module {} is already in down state", module),
                AdminStatus::Up => format!("Module {} is already set to up state", module),
            });
            return lines;
        }
        TransitionOutcome::RejectedDuplicateInProgress => {
            lines.push(format!(
                "Module {} state transition is already in progress",
                module
            ));
            return lines;
        }
        TransitionOutcome::AppliedAfterTimeoutReclaim => lines.push(format!(
            "Previous transition for module {} timed out. Proceeding with {}.",
            module, verb
        )),
        TransitionOutcome::Applied => {}
    }

    lines.push(match report.target {
        AdminStatus::Down => format!("Shutting down chassis module {}", module),
        AdminStatus::Up => format!("Starting up chassis module {}", module),
    });
    lines
}

/// Per-ASIC service messages for a finished fabric reconciliation.
pub fn fabric_messages(outcome: &ReconcileOutcome) -> Vec<String> {
    match outcome {
        ReconcileOutcome::Started { asics } => asics
            .iter()
            .map(|a| format!("Start swss@{} and peer services", a))
            .collect(),
        ReconcileOutcome::Restarted { asics } => {
            let mut lines: Vec<String> = asics
                .iter()
                .map(|a| format!("Stop swss@{} and peer services", a))
                .collect();
            lines.push("Delete related CHASSIS_FABRIC_ASIC_TABLE entries".to_string());
            lines.extend(asics.iter().map(|a| format!("Start swss@{} and peer services", a)));
            lines
        }
        ReconcileOutcome::NoAsics => Vec::new(),
    }
}

const STATUS_HEADERS: [&str; 5] = ["Name", "Admin-Status", "In-Transition", "Start-Time", "Timed-Out"];

/// Renders module states as a left-aligned column table.
pub fn render_status(statuses: &[(String, TransitionState)]) -> String {
    let rows: Vec<[String; 5]> = statuses
        .iter()
        .map(|(name, state)| {
            [
                name.clone(),
                state.admin_status.to_string(),
                format_flag(state.in_progress).to_string(),
                state.start_time.clone().unwrap_or_else(|| "N/A".to_string()),
                format_flag(state.timed_out).to_string(),
            ]
        })
        .collect();

    let mut widths = STATUS_HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let format_row = |cells: &[&str]| -> String {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(format_row(&STATUS_HEADERS));
    out.push(format_row(&widths.map(|w| "-".repeat(w)).each_ref().map(String::as_str)));
    for row in &rows {
        out.push(format_row(&row.each_ref().map(String::as_str)));
    }
    out.join("\n")
}
