//! Entry point tying module validation, the transition guard and the
//! fabric reconciler together.

use std::collections::BTreeSet;
use std::sync::Arc;

use sonic_utilities_common::{PlatformInfo, TableStore, TABLE_KEY_SEPARATOR};
use tracing::debug;

use crate::error::{ChassisError, ChassisResult};
use crate::fabric::{FabricLinkReconciler, ReconcileOutcome};
use crate::guard::{TransitionGuard, TransitionOutcome, TransitionState};
use crate::module::{AdminStatus, ModuleName};
use crate::tables::CFG_CHASSIS_MODULE_TABLE_NAME;

/// Result of a shutdown or startup command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionReport {
    pub module: ModuleName,
    pub target: AdminStatus,
    pub outcome: TransitionOutcome,
    /// Set when the module is a fabric card and the transition was applied.
    pub fabric: Option<ReconcileOutcome>,
}

/// Admin-state control of chassis modules.
pub struct ChassisModules {
    platform: PlatformInfo,
    guard: TransitionGuard,
    fabric: Option<FabricLinkReconciler>,
}

impl ChassisModules {
    /// Creates the controller over CONFIG_DB.
    pub fn new(platform: PlatformInfo, config_db: Arc<dyn TableStore>) -> Self {
        let guard = TransitionGuard::new(config_db, platform.is_smartswitch());
        Self {
            platform,
            guard,
            fabric: None,
        }
    }

    /// Replaces the guard, e.g. to install a different clock.
    pub fn with_guard(mut self, guard: TransitionGuard) -> Self {
        self.guard = guard;
        self
    }

    /// Installs the reconciler used for fabric-card transitions.
    pub fn with_fabric_reconciler(mut self, reconciler: FabricLinkReconciler) -> Self {
        self.fabric = Some(reconciler);
        self
    }

    pub fn platform(&self) -> &PlatformInfo {
        &self.platform
    }

    pub fn guard(&self) -> &TransitionGuard {
        &self.guard
    }

    /// Validates an operator-supplied module name.
    ///
    /// On a smartswitch the name must be one of the platform's DPUs,
    /// compared without regard to case and normalised to upper case.
    /// Everywhere the name must start with a recognised module prefix.
    pub fn resolve_module(&self, name: &str) -> ChassisResult<ModuleName> {
        if self.platform.is_smartswitch() {
            let dpu = self
                .platform
                .find_dpu(name)
                .ok_or_else(|| ChassisError::UnknownDpu {
                    name: name.to_string(),
                    available: self.platform.dpu_list().to_vec(),
                })?;
            return ModuleName::parse(dpu);
        }
        ModuleName::parse(name)
    }

    /// Requests admin state `down` for a module.
    pub async fn shutdown(&self, module: &ModuleName) -> ChassisResult<TransitionReport> {
        self.transition(module, AdminStatus::Down).await
    }

    /// Requests admin state `up` for a module.
    pub async fn startup(&self, module: &ModuleName) -> ChassisResult<TransitionReport> {
        self.transition(module, AdminStatus::Up).await
    }

    async fn transition(
        &self,
        module: &ModuleName,
        target: AdminStatus,
    ) -> ChassisResult<TransitionReport> {
        let mut report = self.request(module, target).await?;
        self.reconcile_fabric(&mut report).await?;
        Ok(report)
    }

    /// Runs the transition guard only; `fabric` is left unset.
    pub async fn request(
        &self,
        module: &ModuleName,
        target: AdminStatus,
    ) -> ChassisResult<TransitionReport> {
        let outcome = self.guard.request_transition(module, target).await?;
        Ok(TransitionReport {
            module: module.clone(),
            target,
            outcome,
            fabric: None,
        })
    }

    /// Reconciles fabric-card services after an applied request. Does
    /// nothing for other modules or when the request was not applied.
    pub async fn reconcile_fabric(&self, report: &mut TransitionReport) -> ChassisResult<()> {
        if !report.outcome.is_applied() || !report.module.is_fabric_card() {
            return Ok(());
        }
        let reconciler = self.fabric.as_ref().ok_or_else(|| {
            ChassisError::Util(sonic_utilities_common::UtilError::internal(
                "fabric card transition without a fabric reconciler",
            ))
        })?;
        report.fabric = Some(reconciler.reconcile(&report.module, report.target).await?);
        Ok(())
    }

    /// Admin and transition state of every known module, sorted by name.
    ///
    /// Known modules are those with a CHASSIS_MODULE record plus, on a
    /// smartswitch, every DPU. `filter` restricts the result to one module.
    pub async fn module_statuses(
        &self,
        filter: Option<&str>,
    ) -> ChassisResult<Vec<(String, TransitionState)>> {
        let pattern = format!("{}{}*", CFG_CHASSIS_MODULE_TABLE_NAME, TABLE_KEY_SEPARATOR);
        let prefix_len = pattern.len() - 1;

        let mut names: BTreeSet<String> = self
            .guard
            .config_db()
            .keys(&pattern)
            .await?
            .into_iter()
            .filter_map(|key| key.get(prefix_len..).map(str::to_string))
            .collect();
        names.extend(self.platform.dpu_list().iter().cloned());

        let mut statuses = Vec::with_capacity(names.len());
        for name in names {
            if filter.is_some_and(|f| !f.eq_ignore_ascii_case(&name)) {
                continue;
            }
            let state = self.guard.transition_state(&name).await?;
            statuses.push((name, state));
        }
        debug!(count = statuses.len(), "Collected module statuses");
        Ok(statuses)
    }
}
