//! Admin-state transition guard.
//!
//! On a smartswitch every admin-state change is tracked in the module's
//! CHASSIS_MODULE record with two extra fields:
//!
//! - `state_transition_in_progress`: `True` while a change is in flight
//! - `transition_start_time`: naive UTC ISO-8601 time the change started,
//!   present only while the flag is `True`
//!
//! A second request for the same module is refused until the first one is
//! cleared by the platform, or until [`TRANSITION_TIMEOUT`] has passed, at
//! which point the stale transition is reclaimed. Standard chassis
//! platforms never write the tracking fields.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use sonic_utilities_common::{field_values, FieldValues, FieldValuesExt, TableStore};
use tracing::{debug, info, instrument, warn};

use crate::error::ChassisResult;
use crate::module::{format_flag, parse_flag, AdminStatus, ModuleName, FLAG_TRUE};
use crate::tables::{fields, CFG_CHASSIS_MODULE_TABLE_NAME};

/// Age after which an in-progress transition is considered abandoned.
pub const TRANSITION_TIMEOUT: Duration = Duration::from_secs(240);

/// Format of `transition_start_time` values written by the guard.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Source of the current naive UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// Formats a transition start time for the store.
pub fn format_timestamp(time: NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a transition start time.
///
/// Accepts naive ISO-8601 with or without fractional seconds, and RFC 3339
/// with an offset (converted to UTC).
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|t| t.naive_utc())
        })
}

/// Result of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// New admin state written.
    Applied,
    /// Module already had the requested admin state; nothing written.
    AlreadyInTargetState,
    /// Another transition is still in flight; nothing written.
    RejectedDuplicateInProgress,
    /// A stale transition was cleared and the new admin state written.
    AppliedAfterTimeoutReclaim,
}

impl TransitionOutcome {
    /// True when the admin state was written and follow-up work may run.
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            TransitionOutcome::Applied | TransitionOutcome::AppliedAfterTimeoutReclaim
        )
    }
}

/// Snapshot of a module's admin state and transition bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionState {
    pub admin_status: AdminStatus,
    pub in_progress: bool,
    pub start_time: Option<String>,
    pub timed_out: bool,
}

/// Gate for admin-state changes of chassis modules.
///
/// The check-then-set sequence in [`request_transition`] is not atomic:
/// the store offers no compare-and-swap, so two processes issuing a
/// request for the same module at the same moment can both see "not in
/// progress" and both write. Requests for different modules never
/// interact. Operators are expected to serialise commands per module.
///
/// [`request_transition`]: TransitionGuard::request_transition
#[derive(Clone)]
pub struct TransitionGuard {
    config_db: Arc<dyn TableStore>,
    smartswitch: bool,
    clock: Arc<dyn Clock>,
}

impl TransitionGuard {
    /// Creates a guard over CONFIG_DB using the wall clock.
    pub fn new(config_db: Arc<dyn TableStore>, smartswitch: bool) -> Self {
        Self {
            config_db,
            smartswitch,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for start times and timeout checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_smartswitch(&self) -> bool {
        self.smartswitch
    }

    pub fn config_db(&self) -> &Arc<dyn TableStore> {
        &self.config_db
    }

    async fn entry(&self, module: &str) -> ChassisResult<Option<FieldValues>> {
        Ok(self
            .config_db
            .get_entry(CFG_CHASSIS_MODULE_TABLE_NAME, module)
            .await?)
    }

    fn admin_state_of(&self, entry: Option<&FieldValues>) -> AdminStatus {
        entry
            .and_then(|fvs| fvs.get_field(fields::ADMIN_STATUS))
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| AdminStatus::platform_default(self.smartswitch))
    }

    fn in_progress_of(entry: Option<&FieldValues>) -> bool {
        entry
            .and_then(|fvs| fvs.get_field(fields::STATE_TRANSITION_IN_PROGRESS))
            .is_some_and(parse_flag)
    }

    fn timed_out_of(&self, entry: Option<&FieldValues>) -> bool {
        let Some(raw) = entry.and_then(|fvs| fvs.get_field(fields::TRANSITION_START_TIME)) else {
            return false;
        };
        let Some(start) = parse_timestamp(raw) else {
            debug!(start_time = raw, "Unparseable transition start time");
            return false;
        };
        // A start time in the future is not timed out.
        (self.clock.now() - start)
            .to_std()
            .is_ok_and(|elapsed| elapsed > TRANSITION_TIMEOUT)
    }

    /// Admin state of a module, or the platform default when unrecorded.
    pub async fn current_admin_state(&self, module: &str) -> ChassisResult<AdminStatus> {
        let entry = self.entry(module).await?;
        Ok(self.admin_state_of(entry.as_ref()))
    }

    /// True when the module's in-progress flag is set.
    pub async fn is_transition_in_progress(&self, module: &str) -> ChassisResult<bool> {
        let entry = self.entry(module).await?;
        Ok(Self::in_progress_of(entry.as_ref()))
    }

    /// True when the module's transition started more than
    /// [`TRANSITION_TIMEOUT`] ago. Missing or unparseable start times are
    /// not timed out.
    pub async fn is_transition_timed_out(&self, module: &str) -> ChassisResult<bool> {
        let entry = self.entry(module).await?;
        Ok(self.timed_out_of(entry.as_ref()))
    }

    /// Reads all transition bookkeeping for a module in one store access.
    pub async fn transition_state(&self, module: &str) -> ChassisResult<TransitionState> {
        let entry = self.entry(module).await?;
        let entry = entry.as_ref();
        Ok(TransitionState {
            admin_status: self.admin_state_of(entry),
            in_progress: Self::in_progress_of(entry),
            start_time: entry
                .and_then(|fvs| fvs.get_field(fields::TRANSITION_START_TIME))
                .map(str::to_string),
            timed_out: self.timed_out_of(entry),
        })
    }

    /// Requests an admin-state change for a module.
    ///
    /// Nothing is written when the module already has the target state or
    /// when another transition is still in flight.
    #[instrument(skip(self), fields(module = %module, target = %target))]
    pub async fn request_transition(
        &self,
        module: &ModuleName,
        target: AdminStatus,
    ) -> ChassisResult<TransitionOutcome> {
        let name = module.as_str();
        let entry = self.entry(name).await?;

        if self.admin_state_of(entry.as_ref()) == target {
            debug!("Module already in target state");
            return Ok(TransitionOutcome::AlreadyInTargetState);
        }

        if !self.smartswitch {
            let fvs = match target {
                AdminStatus::Down => Some(field_values! {
                    fields::ADMIN_STATUS => AdminStatus::Down,
                }),
                // Removing the record restores the implicit "up".
                AdminStatus::Up => None,
            };
            self.config_db
                .set_entry(CFG_CHASSIS_MODULE_TABLE_NAME, name, fvs)
                .await?;
            info!("Admin state set to {}", target);
            return Ok(TransitionOutcome::Applied);
        }

        let mut outcome = TransitionOutcome::Applied;
        if Self::in_progress_of(entry.as_ref()) {
            if !self.timed_out_of(entry.as_ref()) {
                info!("Transition already in progress, request rejected");
                return Ok(TransitionOutcome::RejectedDuplicateInProgress);
            }
            warn!("Previous transition timed out, reclaiming");
            self.clear_transition(name).await?;
            outcome = TransitionOutcome::AppliedAfterTimeoutReclaim;
        }

        let start_time = format_timestamp(self.clock.now());
        self.config_db
            .set_entry(
                CFG_CHASSIS_MODULE_TABLE_NAME,
                name,
                Some(field_values! {
                    fields::ADMIN_STATUS => target,
                    fields::STATE_TRANSITION_IN_PROGRESS => FLAG_TRUE,
                    fields::TRANSITION_START_TIME => start_time,
                }),
            )
            .await?;
        info!(start_time = %start_time, "Transition to {} started", target);
        Ok(outcome)
    }

    /// Clears the in-progress flag and its start time, keeping every other
    /// field of the record.
    pub async fn clear_transition(&self, module: &str) -> ChassisResult<()> {
        let mut fvs = self.entry(module).await?.unwrap_or_default();
        fvs.set_field(fields::STATE_TRANSITION_IN_PROGRESS, format_flag(false));
        fvs.remove_field(fields::TRANSITION_START_TIME);
        self.config_db
            .set_entry(CFG_CHASSIS_MODULE_TABLE_NAME, module, Some(fvs))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, FixedClock, T0};
    use pretty_assertions::assert_eq;
    use sonic_utilities_common::MemoryStore;

    fn guard(store: &Arc<MemoryStore>, smartswitch: bool) -> TransitionGuard {
        TransitionGuard::new(store.clone(), smartswitch).with_clock(Arc::new(FixedClock::new(at(T0))))
    }

    fn module(name: &str) -> ModuleName {
        ModuleName::parse(name).unwrap()
    }

    fn in_progress_since(secs_ago: i64, admin_status: &str) -> FieldValues {
        field_values! {
            fields::ADMIN_STATUS => admin_status,
            fields::STATE_TRANSITION_IN_PROGRESS => "True",
            fields::TRANSITION_START_TIME => format_timestamp(at(T0 - secs_ago)),
        }
    }

    #[tokio::test]
    async fn test_default_state_asymmetry() {
        let store = Arc::new(MemoryStore::new());
        assert_eq!(
            guard(&store, true).current_admin_state("DPU0").await.unwrap(),
            AdminStatus::Down
        );
        assert_eq!(
            guard(&store, false).current_admin_state("LINE-CARD0").await.unwrap(),
            AdminStatus::Up
        );
    }

    #[tokio::test]
    async fn test_record_without_admin_status_uses_default() {
        let store = Arc::new(MemoryStore::new());
        store.insert(
            CFG_CHASSIS_MODULE_TABLE_NAME,
            "DPU1",
            field_values! {fields::STATE_TRANSITION_IN_PROGRESS => "False"},
        );
        assert_eq!(
            guard(&store, true).current_admin_state("DPU1").await.unwrap(),
            AdminStatus::Down
        );
    }

    #[tokio::test]
    async fn test_already_in_target_state_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let outcome = guard(&store, true)
            .request_transition(&module("DPU0"), AdminStatus::Down)
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::AlreadyInTargetState);
        assert_eq!(store.write_count(), 0);

        store.insert(
            CFG_CHASSIS_MODULE_TABLE_NAME,
            "LINE-CARD1",
            field_values! {fields::ADMIN_STATUS => "down"},
        );
        let outcome = guard(&store, false)
            .request_transition(&module("LINE-CARD1"), AdminStatus::Down)
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::AlreadyInTargetState);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_smartswitch_transition_writes_tracking_fields() {
        let store = Arc::new(MemoryStore::new());
        let outcome = guard(&store, true)
            .request_transition(&module("DPU0"), AdminStatus::Up)
            .await
            .unwrap();

        assert_eq!(outcome, TransitionOutcome::Applied);
        assert_eq!(
            store.record(CFG_CHASSIS_MODULE_TABLE_NAME, "DPU0"),
            Some(field_values! {
                "admin_status" => "up",
                "state_transition_in_progress" => "True",
                "transition_start_time" => "2025-01-01T12:00:00.000000",
            })
        );
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_within_timeout_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let before = in_progress_since(60, "down");
        store.insert(CFG_CHASSIS_MODULE_TABLE_NAME, "FABRIC-CARD1", before.clone());

        let outcome = guard(&store, true)
            .request_transition(&module("FABRIC-CARD1"), AdminStatus::Up)
            .await
            .unwrap();

        assert_eq!(outcome, TransitionOutcome::RejectedDuplicateInProgress);
        assert_eq!(store.record(CFG_CHASSIS_MODULE_TABLE_NAME, "FABRIC-CARD1"), Some(before));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_exactly_at_timeout_is_still_in_progress() {
        let store = Arc::new(MemoryStore::new());
        store.insert(CFG_CHASSIS_MODULE_TABLE_NAME, "DPU0", in_progress_since(240, "up"));

        let guard = guard(&store, true);
        assert!(!guard.is_transition_timed_out("DPU0").await.unwrap());
        let outcome = guard
            .request_transition(&module("DPU0"), AdminStatus::Down)
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::RejectedDuplicateInProgress);
    }

    #[tokio::test]
    async fn test_stale_transition_is_reclaimed() {
        let store = Arc::new(MemoryStore::new());
        store.insert(CFG_CHASSIS_MODULE_TABLE_NAME, "FABRIC-CARD1", in_progress_since(300, "down"));

        let outcome = guard(&store, true)
            .request_transition(&module("FABRIC-CARD1"), AdminStatus::Up)
            .await
            .unwrap();

        assert_eq!(outcome, TransitionOutcome::AppliedAfterTimeoutReclaim);
        assert_eq!(
            store.record(CFG_CHASSIS_MODULE_TABLE_NAME, "FABRIC-CARD1"),
            Some(field_values! {
                "admin_status" => "up",
                "state_transition_in_progress" => "True",
                "transition_start_time" => format_timestamp(at(T0)),
            })
        );
        // Clear, then apply.
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_start_time_blocks() {
        let store = Arc::new(MemoryStore::new());
        store.insert(
            CFG_CHASSIS_MODULE_TABLE_NAME,
            "DPU2",
            field_values! {
                fields::ADMIN_STATUS => "up",
                fields::STATE_TRANSITION_IN_PROGRESS => "True",
                fields::TRANSITION_START_TIME => "yesterday",
            },
        );

        let guard = guard(&store, true);
        assert!(guard.is_transition_in_progress("DPU2").await.unwrap());
        assert!(!guard.is_transition_timed_out("DPU2").await.unwrap());
        let outcome = guard
            .request_transition(&module("DPU2"), AdminStatus::Down)
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::RejectedDuplicateInProgress);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_absent_record_is_not_in_progress() {
        let store = Arc::new(MemoryStore::new());
        let guard = guard(&store, true);
        assert!(!guard.is_transition_in_progress("DPU3").await.unwrap());
        assert!(!guard.is_transition_timed_out("DPU3").await.unwrap());
    }

    #[tokio::test]
    async fn test_standard_chassis_never_writes_tracking_fields() {
        let store = Arc::new(MemoryStore::new());
        let guard = guard(&store, false);

        let outcome = guard
            .request_transition(&module("LINE-CARD0"), AdminStatus::Down)
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Applied);
        assert_eq!(
            store.record(CFG_CHASSIS_MODULE_TABLE_NAME, "LINE-CARD0"),
            Some(field_values! {"admin_status" => "down"})
        );

        let outcome = guard
            .request_transition(&module("LINE-CARD0"), AdminStatus::Up)
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Applied);
        assert_eq!(store.record(CFG_CHASSIS_MODULE_TABLE_NAME, "LINE-CARD0"), None);
        assert_eq!(
            guard.current_admin_state("LINE-CARD0").await.unwrap(),
            AdminStatus::Up
        );
    }

    #[tokio::test]
    async fn test_clear_transition_keeps_other_fields() {
        let store = Arc::new(MemoryStore::new());
        store.insert(CFG_CHASSIS_MODULE_TABLE_NAME, "DPU0", in_progress_since(10, "up"));

        guard(&store, true).clear_transition("DPU0").await.unwrap();
        assert_eq!(
            store.record(CFG_CHASSIS_MODULE_TABLE_NAME, "DPU0"),
            Some(field_values! {
                "admin_status" => "up",
                "state_transition_in_progress" => "False",
            })
        );
    }

    #[tokio::test]
    async fn test_transition_state_snapshot() {
        let store = Arc::new(MemoryStore::new());
        store.insert(CFG_CHASSIS_MODULE_TABLE_NAME, "DPU1", in_progress_since(600, "down"));

        let state = guard(&store, true).transition_state("DPU1").await.unwrap();
        assert_eq!(
            state,
            TransitionState {
                admin_status: AdminStatus::Down,
                in_progress: true,
                start_time: Some(format_timestamp(at(T0 - 600))),
                timed_out: true,
            }
        );
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = at(T0);
        assert_eq!(parse_timestamp("2025-01-01T12:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-01T12:00:00.000000"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-01T14:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-01 12:00"), None);
        assert_eq!(
            parse_timestamp("2025-01-01T12:00:00.250000").map(format_timestamp).as_deref(),
            Some("2025-01-01T12:00:00.250000")
        );
    }
}
