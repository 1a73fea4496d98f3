//! Configuration file support for the chassis utilities.
//!
//! Loads settings from a TOML file, falling back to built-in defaults
//! when the file does not exist.
//! Default location: /etc/sonic/chassis-modules.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::DbId;
use crate::error::{UtilError, UtilResult};
use crate::redis_store::RedisConfig;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/chassis-modules.toml";

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Redis host serving CONFIG_DB and STATE_DB
    #[serde(default = "default_redis_host")]
    pub redis_host: String,

    /// Redis port serving CONFIG_DB and STATE_DB
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    /// Database number for CONFIG_DB
    #[serde(default = "default_config_db")]
    pub config_db: u32,

    /// Database number for STATE_DB
    #[serde(default = "default_state_db")]
    pub state_db: u32,

    /// Redis host serving the chassis databases
    #[serde(default = "default_chassis_redis_host")]
    pub chassis_redis_host: String,

    /// Redis port serving the chassis databases
    #[serde(default = "default_chassis_redis_port")]
    pub chassis_redis_port: u16,

    /// Database number for CHASSIS_STATE_DB
    #[serde(default = "default_chassis_state_db")]
    pub chassis_state_db: u32,
}

/// Platform discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Root of the per-platform device directories
    #[serde(default = "default_device_dir")]
    pub device_dir: PathBuf,

    /// File holding the `onie_platform=` line
    #[serde(default = "default_machine_conf")]
    pub machine_conf: PathBuf,

    /// Platform name override
    #[serde(default)]
    pub platform: Option<String>,
}

/// DPU SSH provisioning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DpuSshConfig {
    /// Username/password pairs for DPU login
    #[serde(default = "default_password_file")]
    pub password_file: PathBuf,

    /// Public key installed on DPUs
    #[serde(default = "default_public_key_file")]
    pub public_key_file: PathBuf,

    /// Private key paired with `public_key_file`
    #[serde(default = "default_private_key_file")]
    pub private_key_file: PathBuf,

    /// SSH connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// SSH port on the DPU
    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

/// Complete utility configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UtilitiesConfig {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Platform configuration
    #[serde(default)]
    pub platform: PlatformConfig,

    /// DPU SSH configuration
    #[serde(default)]
    pub dpu_ssh: DpuSshConfig,
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_config_db() -> u32 {
    DbId::ConfigDb.id()
}

fn default_state_db() -> u32 {
    DbId::StateDb.id()
}

fn default_chassis_redis_host() -> String {
    "redis_chassis.server".to_string()
}

fn default_chassis_redis_port() -> u16 {
    6380
}

fn default_chassis_state_db() -> u32 {
    DbId::ChassisStateDb.id()
}

fn default_device_dir() -> PathBuf {
    PathBuf::from("/usr/share/sonic/device")
}

fn default_machine_conf() -> PathBuf {
    PathBuf::from("/host/machine.conf")
}

fn default_password_file() -> PathBuf {
    PathBuf::from("/etc/sonic/dpu_credentials")
}

fn default_public_key_file() -> PathBuf {
    home_dir().join(".ssh/id_rsa.pub")
}

fn default_private_key_file() -> PathBuf {
    home_dir().join(".ssh/id_rsa")
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_ssh_port() -> u16 {
    22
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/root"))
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            redis_host: default_redis_host(),
            redis_port: default_redis_port(),
            config_db: default_config_db(),
            state_db: default_state_db(),
            chassis_redis_host: default_chassis_redis_host(),
            chassis_redis_port: default_chassis_redis_port(),
            chassis_state_db: default_chassis_state_db(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            device_dir: default_device_dir(),
            machine_conf: default_machine_conf(),
            platform: None,
        }
    }
}

impl Default for DpuSshConfig {
    fn default() -> Self {
        Self {
            password_file: default_password_file(),
            public_key_file: default_public_key_file(),
            private_key_file: default_private_key_file(),
            connect_timeout_secs: default_connect_timeout(),
            port: default_ssh_port(),
        }
    }
}

impl DatabaseConfig {
    /// Connection settings for CONFIG_DB.
    pub fn config_db(&self) -> RedisConfig {
        RedisConfig::new(&self.redis_host, self.redis_port, DbId::ConfigDb).with_db(self.config_db)
    }

    /// Connection settings for STATE_DB.
    pub fn state_db(&self) -> RedisConfig {
        RedisConfig::new(&self.redis_host, self.redis_port, DbId::StateDb).with_db(self.state_db)
    }

    /// Connection settings for CHASSIS_STATE_DB.
    pub fn chassis_state_db(&self) -> RedisConfig {
        RedisConfig::new(
            &self.chassis_redis_host,
            self.chassis_redis_port,
            DbId::ChassisStateDb,
        )
        .with_db(self.chassis_state_db)
    }
}

impl DpuSshConfig {
    /// SSH connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl UtilitiesConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> UtilResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content).map_err(|e| {
                    UtilError::invalid_config(path.display().to_string(), e.to_string())
                })?;
                config.validate()?;
                tracing::debug!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(UtilError::io(path, e)),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> UtilResult<()> {
        if self.database.redis_port == 0 {
            return Err(UtilError::invalid_config(
                "database.redis_port",
                "must be non-zero",
            ));
        }
        if self.database.chassis_redis_port == 0 {
            return Err(UtilError::invalid_config(
                "database.chassis_redis_port",
                "must be non-zero",
            ));
        }
        if self.dpu_ssh.connect_timeout_secs == 0 {
            return Err(UtilError::invalid_config(
                "dpu_ssh.connect_timeout_secs",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = UtilitiesConfig::default();
        assert_eq!(config.database.config_db().uri(), "redis://127.0.0.1:6379/4");
        assert_eq!(config.database.state_db().uri(), "redis://127.0.0.1:6379/6");
        assert_eq!(
            config.database.chassis_state_db().uri(),
            "redis://redis_chassis.server:6380/13"
        );
        assert_eq!(config.dpu_ssh.connect_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = UtilitiesConfig::load_or_default("/nonexistent/chassis-modules.toml").unwrap();
        assert_eq!(config, UtilitiesConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[database]\nredis_port = 6400\n\n[platform]\nplatform = \"x86_64-test-r0\"\n"
        )
        .unwrap();

        let config = UtilitiesConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.database.redis_port, 6400);
        assert_eq!(config.database.redis_host, "127.0.0.1");
        assert_eq!(config.platform.platform.as_deref(), Some("x86_64-test-r0"));
        assert_eq!(config.dpu_ssh.port, 22);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[database\nredis_port = ").unwrap();

        let err = UtilitiesConfig::load_or_default(file.path()).unwrap_err();
        assert!(matches!(err, UtilError::InvalidConfig { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = UtilitiesConfig::default();
        config.dpu_ssh.connect_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
