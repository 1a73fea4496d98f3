//! Error types for chassis module commands.

use std::time::Duration;

use sonic_utilities_common::UtilError;
use thiserror::Error;

use crate::module::AdminStatus;

/// Result type alias for chassis module operations.
pub type ChassisResult<T> = Result<T, ChassisError>;

/// Errors raised while changing or reporting chassis module state.
#[derive(Debug, Error)]
pub enum ChassisError {
    /// Module name does not carry a recognised prefix.
    #[error(
        "Module name {name} is invalid; it must start with SUPERVISOR, LINE-CARD, FABRIC-CARD or DPU"
    )]
    InvalidModuleName {
        /// The rejected name.
        name: String,
    },

    /// Module name is not one of the DPUs hosted by this smartswitch.
    #[error("Module {name} is not a DPU of this platform (valid: {})", .available.join(", "))]
    UnknownDpu {
        /// The rejected name.
        name: String,
        /// DPU names the platform does host.
        available: Vec<String>,
    },

    /// Admin state write was not observed within the poll budget.
    #[error(
        "Admin state of module {module} did not reach {expected} within {}s",
        .waited.as_secs()
    )]
    PollTimeout {
        /// The module being reconciled.
        module: String,
        /// The admin state that was expected.
        expected: AdminStatus,
        /// How long the poll waited.
        waited: Duration,
    },

    /// A per-ASIC service was still active after being stopped.
    #[error("Stop {unit} and peer services failed for module {module}")]
    ServiceStopFailed {
        /// The module being shut down.
        module: String,
        /// The unit that did not stop.
        unit: String,
    },

    /// Store, shell or platform failure.
    #[error(transparent)]
    Util(#[from] UtilError),

    /// DPU SSH provisioning failure.
    #[cfg(feature = "dpu-ssh")]
    #[error(transparent)]
    DpuSsh(#[from] sonic_dpu_ssh::DpuSshError),
}

impl ChassisError {
    /// Creates an invalid module name error.
    pub fn invalid_module_name(name: impl Into<String>) -> Self {
        Self::InvalidModuleName { name: name.into() }
    }

    /// Returns true when the operator supplied bad input, as opposed to an
    /// operational failure of the store, services or hardware.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ChassisError::InvalidModuleName { .. } | ChassisError::UnknownDpu { .. }
        )
    }
}
