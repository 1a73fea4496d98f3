//! Clock and service-control fakes.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use parking_lot::Mutex;
use sonic_chassis_modules::{Clock, ServiceControl};
use sonic_utilities_common::{UtilError, UtilResult};

/// Naive UTC time for a Unix timestamp. Out-of-range values clamp to the
/// epoch.
pub fn unix_time(secs: i64) -> NaiveDateTime {
    DateTime::from_timestamp(secs, 0)
        .unwrap_or_default()
        .naive_utc()
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

/// Records systemd commands as `"<verb> <unit>"` instead of running them.
///
/// Units marked [`stuck`](Self::stuck) still report active after `stop`;
/// units marked [`failing`](Self::failing) fail every command.
#[derive(Debug, Default)]
pub struct RecordingServiceControl {
    commands: Mutex<Vec<String>>,
    stuck: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingServiceControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stuck(self, unit: &str) -> Self {
        self.stuck.lock().insert(unit.to_string());
        self
    }

    pub fn failing(self, unit: &str) -> Self {
        self.failing.lock().insert(unit.to_string());
        self
    }

    /// Commands issued so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    fn record(&self, verb: &str, unit: &str) -> UtilResult<()> {
        self.commands.lock().push(format!("{} {}", verb, unit));
        if self.failing.lock().contains(unit) {
            return Err(UtilError::ShellCommandFailed {
                command: format!("systemctl {} {}", verb, unit),
                exit_code: 1,
                output: format!("Failed to {} {}", verb, unit),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceControl for RecordingServiceControl {
    async fn start(&self, unit: &str) -> UtilResult<()> {
        self.record("start", unit)
    }

    async fn stop(&self, unit: &str) -> UtilResult<()> {
        self.record("stop", unit)
    }

    async fn reset_failed(&self, unit: &str) -> UtilResult<()> {
        self.record("reset-failed", unit)
    }

    async fn is_active(&self, unit: &str) -> UtilResult<bool> {
        self.record("is-active", unit)?;
        Ok(self.stuck.lock().contains(unit))
    }
}
