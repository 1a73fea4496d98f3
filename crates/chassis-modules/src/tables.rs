//! Table name constants for the chassis module commands.

/// CONFIG_DB table holding per-module admin state
pub const CFG_CHASSIS_MODULE_TABLE_NAME: &str = "CHASSIS_MODULE";

/// CHASSIS_STATE_DB table binding fabric ASICs to fabric-card modules
pub const CHASSIS_STATE_FABRIC_ASIC_TABLE_NAME: &str = "CHASSIS_FABRIC_ASIC_TABLE";

/// Key prefix of rows in [`CHASSIS_STATE_FABRIC_ASIC_TABLE_NAME`]
pub const FABRIC_ASIC_KEY_PREFIX: &str = "asic";

/// Field names used in chassis tables
pub mod fields {
    // CHASSIS_MODULE
    pub const ADMIN_STATUS: &str = "admin_status";
    pub const STATE_TRANSITION_IN_PROGRESS: &str = "state_transition_in_progress";
    pub const TRANSITION_START_TIME: &str = "transition_start_time";

    // CHASSIS_FABRIC_ASIC_TABLE
    pub const NAME: &str = "name";
}
