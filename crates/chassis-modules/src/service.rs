//! systemd control of per-ASIC services.

use async_trait::async_trait;
use sonic_utilities_common::shell::{self, shellquote, SUDO_CMD, SYSTEMCTL_CMD};
use sonic_utilities_common::UtilResult;
use tracing::debug;

/// systemd unit backing a fabric ASIC.
pub fn asic_service_unit(asic: u32) -> String {
    format!("swss@{}.service", asic)
}

/// Control of named service units.
#[async_trait]
pub trait ServiceControl: Send + Sync {
    /// Starts a unit.
    async fn start(&self, unit: &str) -> UtilResult<()>;

    /// Stops a unit.
    async fn stop(&self, unit: &str) -> UtilResult<()>;

    /// Clears a unit's failure state and restart rate limit.
    async fn reset_failed(&self, unit: &str) -> UtilResult<()>;

    /// Reports whether a unit is active.
    async fn is_active(&self, unit: &str) -> UtilResult<bool>;
}

/// [`ServiceControl`] over `systemctl`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemdServiceControl;

impl SystemdServiceControl {
    pub fn new() -> Self {
        Self
    }

    async fn systemctl(&self, verb: &str, unit: &str) -> UtilResult<()> {
        let cmd = format!(
            "{} {} {} {}",
            SUDO_CMD,
            SYSTEMCTL_CMD,
            verb,
            shellquote(unit)
        );
        shell::exec_or_throw(&cmd).await?;
        Ok(())
    }
}

#[async_trait]
impl ServiceControl for SystemdServiceControl {
    async fn start(&self, unit: &str) -> UtilResult<()> {
        self.systemctl("start", unit).await
    }

    async fn stop(&self, unit: &str) -> UtilResult<()> {
        self.systemctl("stop", unit).await
    }

    async fn reset_failed(&self, unit: &str) -> UtilResult<()> {
        self.systemctl("reset-failed", unit).await
    }

    async fn is_active(&self, unit: &str) -> UtilResult<bool> {
        // Exit status 0 means active; no sudo needed for a query.
        let cmd = format!("{} is-active --quiet {}", SYSTEMCTL_CMD, shellquote(unit));
        let result = shell::exec(&cmd).await?;
        debug!(unit, exit_code = result.exit_code, "is-active");
        Ok(result.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asic_service_unit() {
        assert_eq!(asic_service_unit(0), "swss@0.service");
        assert_eq!(asic_service_unit(12), "swss@12.service");
    }
}
