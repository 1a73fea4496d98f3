//! Platform capability queries.
//!
//! The platform name comes from the `PLATFORM` environment variable or
//! `machine.conf`; its device directory provides `platform.json` (DPU
//! inventory) and `chassisdb.conf` (midplane interfaces). Missing files
//! describe a standard chassis with no DPUs.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::config::PlatformConfig;
use crate::error::{UtilError, UtilResult};

const PLATFORM_JSON: &str = "platform.json";
const CHASSISDB_CONF: &str = "chassisdb.conf";
const CHASSIS_INTERNAL_INTFS: &str = "chassis_internal_intfs";

/// Option value selecting every DPU.
pub const ALL_DPUS: &str = "all";

/// Capabilities of the platform the utilities run on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformInfo {
    name: Option<String>,
    smartswitch: bool,
    dpu: bool,
    dpus: Vec<String>,
    chassis_local_interfaces: Vec<String>,
}

impl PlatformInfo {
    /// A standard chassis: no DPUs, not a smartswitch.
    pub fn standard() -> Self {
        Self::default()
    }

    /// A smartswitch hosting the given DPUs.
    pub fn smartswitch<I, S>(dpus: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            smartswitch: true,
            dpus: dpus.into_iter().map(|d| d.as_ref().to_uppercase()).collect(),
            ..Self::default()
        }
    }

    /// Detects the running platform from the filesystem.
    pub fn detect(config: &PlatformConfig) -> UtilResult<Self> {
        let Some(name) = platform_name(config)? else {
            debug!("Platform name unknown, assuming standard chassis");
            return Ok(Self::standard());
        };

        let dir = config.device_dir.join(&name);
        let mut info = Self {
            name: Some(name),
            ..Self::default()
        };

        if let Some(json) = read_optional(&dir.join(PLATFORM_JSON))? {
            let value: Value = serde_json::from_str(&json)
                .map_err(|e| UtilError::platform(dir.join(PLATFORM_JSON), e.to_string()))?;
            info.apply_platform_json(&value);
        }

        if let Some(conf) = read_optional(&dir.join(CHASSISDB_CONF))? {
            info.chassis_local_interfaces = parse_chassis_local_interfaces(&conf);
        }

        debug!(
            platform = ?info.name,
            smartswitch = info.smartswitch,
            dpus = ?info.dpus,
            "Detected platform"
        );
        Ok(info)
    }

    fn apply_platform_json(&mut self, value: &Value) {
        if let Some(dpus) = value.get("DPUS").and_then(Value::as_object) {
            let mut names: Vec<String> = dpus.keys().map(|k| k.to_uppercase()).collect();
            names.sort_by_key(|n| dpu_sort_key(n));
            self.smartswitch = !names.is_empty();
            self.dpus = names;
        }
        self.dpu = value.get("DPU").is_some_and(Value::is_object);
    }

    /// Platform name, when known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// True on a smartswitch (a switch hosting DPUs).
    pub fn is_smartswitch(&self) -> bool {
        self.smartswitch
    }

    /// True when running on a DPU itself.
    pub fn is_dpu(&self) -> bool {
        self.dpu
    }

    /// Number of DPUs hosted by this platform.
    pub fn num_dpus(&self) -> usize {
        self.dpus.len()
    }

    /// Upper-cased DPU module names (`DPU0`, `DPU1`, ...).
    pub fn dpu_list(&self) -> &[String] {
        &self.dpus
    }

    /// DPU module names plus [`ALL_DPUS`].
    pub fn dpu_options(&self) -> Vec<String> {
        let mut options = self.dpus.clone();
        options.push(ALL_DPUS.to_string());
        options
    }

    /// Looks up a DPU by name, ignoring case, and returns its canonical name.
    pub fn find_dpu(&self, name: &str) -> Option<&str> {
        self.dpus
            .iter()
            .find(|d| d.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Midplane interfaces listed in `chassisdb.conf`.
    pub fn chassis_local_interfaces(&self) -> &[String] {
        &self.chassis_local_interfaces
    }
}

fn platform_name(config: &PlatformConfig) -> UtilResult<Option<String>> {
    if let Some(name) = &config.platform {
        return Ok(Some(name.clone()));
    }
    if let Ok(name) = std::env::var("PLATFORM") {
        if !name.is_empty() {
            return Ok(Some(name));
        }
    }
    Ok(read_optional(&config.machine_conf)?.and_then(|conf| parse_machine_conf(&conf)))
}

fn read_optional(path: &Path) -> UtilResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(UtilError::io(PathBuf::from(path), e)),
    }
}

/// Extracts the platform from `onie_platform=` or `aboot_platform=`.
fn parse_machine_conf(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            "onie_platform" | "aboot_platform" if !value.is_empty() => Some(value.to_string()),
            _ => None,
        }
    })
}

fn parse_chassis_local_interfaces(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .find(|line| line.contains(CHASSIS_INTERNAL_INTFS))
        .and_then(|line| line.split_once('='))
        .map(|(_, value)| {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Orders `DPU2` before `DPU10`.
fn dpu_sort_key(name: &str) -> (String, u32) {
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    let (prefix, index) = name.split_at(name.len() - digits);
    (prefix.to_string(), index.parse().unwrap_or(0))
}
