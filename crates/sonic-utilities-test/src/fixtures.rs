//! Test fixtures for chassis module scenarios
//!
//! Records can be seeded into a [`MemoryStore`] without touching its write
//! log, or written through any [`TableStore`] such as a containerised Redis.

use std::time::Duration;

use chrono::NaiveDateTime;
use sonic_chassis_modules::guard::format_timestamp;
use sonic_chassis_modules::tables::{
    fields, CFG_CHASSIS_MODULE_TABLE_NAME, CHASSIS_STATE_FABRIC_ASIC_TABLE_NAME,
    FABRIC_ASIC_KEY_PREFIX,
};
use sonic_chassis_modules::AdminStatus;
use sonic_utilities_common::{
    table_key, FieldValues, FieldValuesExt, MemoryStore, TableStore, UtilResult,
};
use tracing::debug;

/// A CONFIG_DB `CHASSIS_MODULE` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Module name, the record key
    pub name: String,
    /// Field-value pairs
    pub fields: FieldValues,
}

impl ModuleRecord {
    /// Creates a record with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: FieldValues::new(),
        }
    }

    pub fn with_admin_status(self, status: AdminStatus) -> Self {
        self.with_field(fields::ADMIN_STATUS, status.as_str())
    }

    /// Marks a transition as started at `start`.
    pub fn in_transition_since(self, start: NaiveDateTime) -> Self {
        self.with_field(fields::STATE_TRANSITION_IN_PROGRESS, "True")
            .with_field(fields::TRANSITION_START_TIME, format_timestamp(start))
    }

    /// Sets a field verbatim, e.g. a malformed start time.
    pub fn with_field(mut self, field: &str, value: impl Into<String>) -> Self {
        self.fields.set_field(field, value);
        self
    }

    /// Raw CONFIG_DB key of the record.
    pub fn config_db_key(&self) -> String {
        table_key(CFG_CHASSIS_MODULE_TABLE_NAME, &self.name)
    }

    pub fn seed(&self, store: &MemoryStore) {
        store.insert(CFG_CHASSIS_MODULE_TABLE_NAME, &self.name, self.fields.clone());
    }

    pub async fn write(&self, store: &dyn TableStore) -> UtilResult<()> {
        debug!(key = %self.config_db_key(), "Writing module record");
        store
            .set_entry(
                CFG_CHASSIS_MODULE_TABLE_NAME,
                &self.name,
                Some(self.fields.clone()),
            )
            .await
    }
}

/// A CHASSIS_STATE_DB row binding a fabric ASIC to a fabric card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FabricAsic {
    pub asic: u32,
    pub module: String,
}

impl FabricAsic {
    pub fn new(asic: u32, module: impl Into<String>) -> Self {
        Self {
            asic,
            module: module.into(),
        }
    }

    /// Row key, e.g. `asic3`.
    pub fn key(&self) -> String {
        format!("{}{}", FABRIC_ASIC_KEY_PREFIX, self.asic)
    }

    /// Raw CHASSIS_STATE_DB key of the row.
    pub fn chassis_state_db_key(&self) -> String {
        table_key(CHASSIS_STATE_FABRIC_ASIC_TABLE_NAME, &self.key())
    }

    fn field_values(&self) -> FieldValues {
        vec![(fields::NAME.to_string(), self.module.clone())]
    }

    pub fn seed(&self, store: &MemoryStore) {
        store.insert(
            CHASSIS_STATE_FABRIC_ASIC_TABLE_NAME,
            &self.key(),
            self.field_values(),
        );
    }

    pub async fn write(&self, store: &dyn TableStore) -> UtilResult<()> {
        store
            .set_entry(
                CHASSIS_STATE_FABRIC_ASIC_TABLE_NAME,
                &self.key(),
                Some(self.field_values()),
            )
            .await
    }
}

/// Common CHASSIS_MODULE fixtures
pub mod module_fixtures {
    use super::*;

    /// Module administratively down with no transition in flight.
    pub fn admin_down(name: &str) -> ModuleRecord {
        ModuleRecord::new(name).with_admin_status(AdminStatus::Down)
    }

    /// Transition towards `target` started `age` before `now`.
    pub fn transition_in_progress(
        name: &str,
        target: AdminStatus,
        now: NaiveDateTime,
        age: Duration,
    ) -> ModuleRecord {
        let age = chrono::Duration::from_std(age).unwrap_or_else(|_| chrono::Duration::zero());
        ModuleRecord::new(name)
            .with_admin_status(target)
            .in_transition_since(now - age)
    }

    /// In-progress flag with a start time that cannot be parsed.
    pub fn malformed_start_time(name: &str, target: AdminStatus) -> ModuleRecord {
        ModuleRecord::new(name)
            .with_admin_status(target)
            .with_field(fields::STATE_TRANSITION_IN_PROGRESS, "True")
            .with_field(fields::TRANSITION_START_TIME, "yesterday-ish")
    }
}

/// Common fabric ASIC fixtures
pub mod fabric_fixtures {
    use super::*;

    /// One binding row per ASIC, all naming `module`.
    pub fn bound_asics(module: &str, asics: &[u32]) -> Vec<FabricAsic> {
        asics
            .iter()
            .map(|&asic| FabricAsic::new(asic, module))
            .collect()
    }
}

/// Database contents a test starts from.
#[derive(Debug, Clone, Default)]
pub struct ChassisScenario {
    /// Scenario name
    pub name: String,
    /// CONFIG_DB CHASSIS_MODULE records
    pub modules: Vec<ModuleRecord>,
    /// CHASSIS_STATE_DB fabric ASIC rows
    pub asics: Vec<FabricAsic>,
}

impl ChassisScenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_module(mut self, record: ModuleRecord) -> Self {
        self.modules.push(record);
        self
    }

    pub fn add_asics(mut self, asics: impl IntoIterator<Item = FabricAsic>) -> Self {
        self.asics.extend(asics);
        self
    }

    /// Seeds both databases without logging writes.
    pub fn seed(&self, config_db: &MemoryStore, chassis_state_db: &MemoryStore) {
        for record in &self.modules {
            record.seed(config_db);
        }
        for asic in &self.asics {
            asic.seed(chassis_state_db);
        }
    }

    /// Writes the scenario through the store interface.
    pub async fn write(
        &self,
        config_db: &dyn TableStore,
        chassis_state_db: &dyn TableStore,
    ) -> UtilResult<()> {
        debug!(scenario = %self.name, "Writing scenario");
        for record in &self.modules {
            record.write(config_db).await?;
        }
        for asic in &self.asics {
            asic.write(chassis_state_db).await?;
        }
        Ok(())
    }
}
