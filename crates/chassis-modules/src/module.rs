//! Chassis module names and admin state values.

use std::fmt;
use std::str::FromStr;

use crate::error::{ChassisError, ChassisResult};

/// Store representation of a true flag.
pub const FLAG_TRUE: &str = "True";

/// Store representation of a false flag.
pub const FLAG_FALSE: &str = "False";

/// Parses a store flag. Anything other than `True` is false.
pub fn parse_flag(value: &str) -> bool {
    value == FLAG_TRUE
}

/// Formats a flag for the store.
pub fn format_flag(value: bool) -> &'static str {
    if value {
        FLAG_TRUE
    } else {
        FLAG_FALSE
    }
}

/// Kind of field-replaceable unit, encoded as the module name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Supervisor,
    LineCard,
    FabricCard,
    Dpu,
}

impl ModuleKind {
    /// All kinds, in prefix-match order.
    pub const ALL: [ModuleKind; 4] = [
        ModuleKind::Supervisor,
        ModuleKind::LineCard,
        ModuleKind::FabricCard,
        ModuleKind::Dpu,
    ];

    /// Name prefix identifying this kind.
    pub fn prefix(&self) -> &'static str {
        match self {
            ModuleKind::Supervisor => "SUPERVISOR",
            ModuleKind::LineCard => "LINE-CARD",
            ModuleKind::FabricCard => "FABRIC-CARD",
            ModuleKind::Dpu => "DPU",
        }
    }

    fn of(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| name.starts_with(k.prefix()))
    }
}

/// A validated chassis module name such as `LINE-CARD0` or `DPU1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleName {
    name: String,
    kind: ModuleKind,
}

impl ModuleName {
    /// Validates the name prefix. Matching is case-sensitive.
    pub fn parse(name: &str) -> ChassisResult<Self> {
        let kind = ModuleKind::of(name).ok_or_else(|| ChassisError::invalid_module_name(name))?;
        Ok(Self {
            name: name.to_string(),
            kind,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// True for fabric cards, whose transitions drive per-ASIC services.
    pub fn is_fabric_card(&self) -> bool {
        self.kind == ModuleKind::FabricCard
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl AsRef<str> for ModuleName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

/// Operator-intended state of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminStatus {
    Up,
    Down,
}

impl AdminStatus {
    /// Store representation (`up` / `down`).
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminStatus::Up => "up",
            AdminStatus::Down => "down",
        }
    }

    /// State assumed for a module with no admin status recorded.
    ///
    /// DPUs on a smartswitch stay powered off until configured up; modules
    /// of a standard chassis are up unless shut down.
    pub fn platform_default(smartswitch: bool) -> Self {
        if smartswitch {
            AdminStatus::Down
        } else {
            AdminStatus::Up
        }
    }
}

impl fmt::Display for AdminStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(AdminStatus::Up),
            "down" => Ok(AdminStatus::Down),
            other => Err(format!("unknown admin status '{}'", other)),
        }
    }
}
