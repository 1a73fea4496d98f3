//! Fabric-card service reconciliation.
//!
//! Fabric cards carry switching ASICs, each driven by its own
//! `swss@<asic>` service on the supervisor. Once the guard has written a
//! new admin state for a fabric card, the reconciler waits for the write
//! to be observed and then stops or starts the bound ASIC services.
//!
//! A shutdown does not leave the services stopped: after the ASIC rows are
//! removed from CHASSIS_STATE_DB the services are restarted, so a card
//! whose services were stopped by hand without pulling the hardware comes
//! back on its own. Only physical removal keeps them down.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use sonic_utilities_common::{table_key, TableStore};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use crate::error::{ChassisError, ChassisResult};
use crate::guard::TransitionGuard;
use crate::module::{AdminStatus, ModuleName};
use crate::service::{asic_service_unit, ServiceControl};
use crate::tables::{fields, CHASSIS_STATE_FABRIC_ASIC_TABLE_NAME, FABRIC_ASIC_KEY_PREFIX};

/// Budget for the admin state write to become visible.
pub const ADMIN_STATE_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between admin state reads.
pub const ADMIN_STATE_POLL_INTERVAL: Duration = Duration::from_secs(1);

static ASIC_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)$").expect("Invalid regex pattern"));

/// Extracts the trailing ASIC number of a fabric ASIC key.
fn trailing_asic_id(key: &str) -> Option<u32> {
    ASIC_ID_RE
        .captures(key)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// What the reconciler did for a fabric card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No ASICs are bound to the module.
    NoAsics,
    /// Services of these ASICs were started.
    Started { asics: Vec<u32> },
    /// Services were stopped, their ASIC rows deleted, and the services
    /// started again.
    Restarted { asics: Vec<u32> },
}

/// Drives per-ASIC services after a fabric-card admin state change.
pub struct FabricLinkReconciler {
    guard: TransitionGuard,
    chassis_state_db: Arc<dyn TableStore>,
    services: Arc<dyn ServiceControl>,
    poll_timeout: Duration,
}

impl FabricLinkReconciler {
    pub fn new(
        guard: TransitionGuard,
        chassis_state_db: Arc<dyn TableStore>,
        services: Arc<dyn ServiceControl>,
    ) -> Self {
        Self {
            guard,
            chassis_state_db,
            services,
            poll_timeout: ADMIN_STATE_POLL_TIMEOUT,
        }
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Polls the module's admin state once per interval until it equals
    /// `expected`.
    ///
    /// Returns `true` when the budget ran out without a match.
    pub async fn wait_for_observed_state(
        &self,
        module: &str,
        expected: AdminStatus,
    ) -> ChassisResult<bool> {
        let deadline = Instant::now() + self.poll_timeout;
        loop {
            if self.guard.current_admin_state(module).await? == expected {
                return Ok(false);
            }
            sleep(ADMIN_STATE_POLL_INTERVAL).await;
            if Instant::now() >= deadline {
                warn!(module, %expected, "Admin state not observed within {:?}", self.poll_timeout);
                return Ok(true);
            }
        }
    }

    /// ASIC numbers whose CHASSIS_FABRIC_ASIC_TABLE row names `module`.
    pub async fn resolve_asic_binding(&self, module: &str) -> ChassisResult<BTreeSet<u32>> {
        let pattern = format!("{}*", CHASSIS_STATE_FABRIC_ASIC_TABLE_NAME);
        let mut asics = BTreeSet::new();

        for key in self.chassis_state_db.keys(&pattern).await? {
            let name = self.chassis_state_db.hget(&key, fields::NAME).await?;
            if name.as_deref() != Some(module) {
                continue;
            }
            match trailing_asic_id(&key) {
                Some(asic) => {
                    asics.insert(asic);
                }
                None => debug!(key = %key, "Fabric ASIC key without ASIC number"),
            }
        }

        debug!(module, ?asics, "Resolved fabric ASICs");
        Ok(asics)
    }

    /// Brings the services of a fabric card in line with its new admin
    /// state.
    #[instrument(skip(self), fields(module = %module, target = %target))]
    pub async fn reconcile(
        &self,
        module: &ModuleName,
        target: AdminStatus,
    ) -> ChassisResult<ReconcileOutcome> {
        let name = module.as_str();

        if self.wait_for_observed_state(name, target).await? {
            return Err(ChassisError::PollTimeout {
                module: name.to_string(),
                expected: target,
                waited: self.poll_timeout,
            });
        }

        let asics = self.resolve_asic_binding(name).await?;
        if asics.is_empty() {
            info!("No fabric ASICs bound");
            return Ok(ReconcileOutcome::NoAsics);
        }

        match target {
            AdminStatus::Down => self.shutdown_asics(name, &asics).await,
            AdminStatus::Up => {
                for &asic in &asics {
                    info!("Start swss@{} and peer services", asic);
                    self.services.start(&asic_service_unit(asic)).await?;
                }
                Ok(ReconcileOutcome::Started {
                    asics: asics.into_iter().collect(),
                })
            }
        }
    }

    async fn shutdown_asics(
        &self,
        module: &str,
        asics: &BTreeSet<u32>,
    ) -> ChassisResult<ReconcileOutcome> {
        for &asic in asics {
            info!("Stop swss@{} and peer services", asic);
            self.services.stop(&asic_service_unit(asic)).await?;
        }

        // Only the last ASIC stopped is checked.
        if let Some(&last) = asics.iter().next_back() {
            let unit = asic_service_unit(last);
            if self.services.is_active(&unit).await? {
                warn!(unit = %unit, "Service still active after stop");
                return Err(ChassisError::ServiceStopFailed {
                    module: module.to_string(),
                    unit,
                });
            }
        }

        info!("Delete related CHASSIS_FABRIC_ASIC_TABLE entries");
        for &asic in asics {
            let key = format!("{}{}", FABRIC_ASIC_KEY_PREFIX, asic);
            self.chassis_state_db
                .delete(&table_key(CHASSIS_STATE_FABRIC_ASIC_TABLE_NAME, &key))
                .await?;
        }

        for &asic in asics {
            let unit = asic_service_unit(asic);
            // Restart limits would otherwise refuse the start below.
            self.services.reset_failed(&unit).await?;
            info!("Start swss@{} and peer services", asic);
            self.services.start(&unit).await?;
        }

        Ok(ReconcileOutcome::Restarted {
            asics: asics.iter().copied().collect(),
        })
    }
}
