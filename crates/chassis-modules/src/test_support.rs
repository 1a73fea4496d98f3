//! Collaborator fakes shared by the unit tests of this crate.
//!
//! Kept apart from the public fakes in `sonic-utilities-test`, which depends
//! on this crate and so cannot be used by its unit tests.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use parking_lot::Mutex;
use sonic_utilities_common::{UtilError, UtilResult};

use crate::guard::Clock;
use crate::service::ServiceControl;

/// 2025-01-01T12:00:00Z
pub const T0: i64 = 1_735_732_800;

/// Naive UTC time for a Unix timestamp.
pub fn at(secs: i64) -> NaiveDateTime {
    DateTime::from_timestamp(secs, 0)
        .expect("valid timestamp")
        .naive_utc()
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock(Mutex<NaiveDateTime>);

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self(Mutex::new(now))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock()
    }
}

/// Records every service command instead of running it.
#[derive(Debug, Default)]
pub struct RecordingServices {
    commands: Mutex<Vec<String>>,
    stuck: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingServices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a unit as still active after `stop`.
    pub fn stuck(self, unit: &str) -> Self {
        self.stuck.lock().insert(unit.to_string());
        self
    }

    /// Makes every command on a unit fail.
    pub fn failing(self, unit: &str) -> Self {
        self.failing.lock().insert(unit.to_string());
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    fn record(&self, verb: &str, unit: &str) -> UtilResult<()> {
        self.commands.lock().push(format!("{} {}", verb, unit));
        if self.failing.lock().contains(unit) {
            return Err(UtilError::ShellCommandFailed {
                command: format!("systemctl {} {}", verb, unit),
                exit_code: 1,
                output: "Failed".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ServiceControl for RecordingServices {
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
