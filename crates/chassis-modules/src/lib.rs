//! Chassis module admin-state control for SONiC.
//!
//! `config shutdown|startup <module>` changes the admin state of a
//! supervisor, line card, fabric card or DPU. The work is split in two:
//!
//! - [`TransitionGuard`]: decides whether a request may proceed and records
//!   it in CONFIG_DB `CHASSIS_MODULE`, keeping at most one transition in
//!   flight per module on a smartswitch
//! - [`FabricLinkReconciler`]: for fabric cards, restarts or starts the
//!   `swss@<asic>` services of the card's ASICs once the new state is
//!   visible
//!
//! [`ChassisModules`] validates module names and runs both in order.

pub mod chassis;
pub mod cli;
pub mod error;
pub mod fabric;
pub mod guard;
pub mod module;
pub mod service;
pub mod tables;

#[cfg(test)]
mod test_support;

pub use chassis::{ChassisModules, TransitionReport};
pub use error::{ChassisError, ChassisResult};
pub use fabric::{FabricLinkReconciler, ReconcileOutcome, ADMIN_STATE_POLL_TIMEOUT};
pub use guard::{
    Clock, SystemClock, TransitionGuard, TransitionOutcome, TransitionState, TRANSITION_TIMEOUT,
};
pub use module::{AdminStatus, ModuleKind, ModuleName};
pub use service::{asic_service_unit, ServiceControl, SystemdServiceControl};
