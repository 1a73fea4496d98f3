//! Shared infrastructure for the SONiC chassis administration utilities.
//!
//! - [`db`]: the [`TableStore`] record-store contract over CONFIG_DB,
//!   STATE_DB and CHASSIS_STATE_DB
//! - [`RedisStore`] / [`MemoryStore`]: store backends
//! - [`shell`]: shell command execution with proper quoting
//! - [`platform`]: smartswitch / DPU capability queries
//! - [`config`]: the TOML configuration file
//! - [`error`]: error types
//!
//! # Example
//!
//! ```ignore
//! use sonic_utilities_common::{RedisStore, TableStore, UtilitiesConfig};
//!
//! let config = UtilitiesConfig::load_or_default("/etc/sonic/chassis-modules.toml")?;
//! let config_db = RedisStore::connect(config.database.config_db()).await?;
//! let entry = config_db.get_entry("CHASSIS_MODULE", "DPU0").await?;
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod memory_store;
pub mod platform;
pub mod redis_store;
pub mod shell;

// Re-export commonly used items at crate root
pub use config::{DatabaseConfig, DpuSshConfig, PlatformConfig, UtilitiesConfig};
pub use db::{
    table_key, DbId, FieldValue, FieldValues, FieldValuesExt, TableStore, TABLE_KEY_SEPARATOR,
};
pub use error::{UtilError, UtilResult};
pub use memory_store::MemoryStore;
pub use platform::PlatformInfo;
pub use redis_store::{RedisConfig, RedisStore};
