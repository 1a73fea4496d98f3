//! Record-store abstraction over the SONiC databases.
//!
//! Records are addressed by `(table, key)` and hold a flat field map. The
//! raw Redis key is `TABLE|key` in every database the utilities touch.

use async_trait::async_trait;
use regex::Regex;

use crate::error::{UtilError, UtilResult};

/// Separator between table name and key in raw database keys.
pub const TABLE_KEY_SEPARATOR: char = '|';

/// Database identifiers used by the chassis utilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbId {
    /// Configuration database (CONFIG_DB) - operator intent.
    ConfigDb,
    /// State database (STATE_DB) - local operational state.
    StateDb,
    /// Chassis state database (CHASSIS_STATE_DB) - chassis-wide state
    /// shared by the supervisor and line cards.
    ChassisStateDb,
}

impl DbId {
    /// Returns the database name as used in SONiC.
    pub fn name(&self) -> &'static str {
        match self {
            DbId::ConfigDb => "CONFIG_DB",
            DbId::StateDb => "STATE_DB",
            DbId::ChassisStateDb => "CHASSIS_STATE_DB",
        }
    }

    /// Returns the default Redis database number.
    pub fn id(&self) -> u32 {
        match self {
            DbId::ConfigDb => 4,
            DbId::StateDb => 6,
            DbId::ChassisStateDb => 13,
        }
    }
}

/// Key-value tuple representing a field and its value.
pub type FieldValue = (String, String);

/// Collection of field-value pairs for a table entry.
pub type FieldValues = Vec<FieldValue>;

/// Helper trait for working with field-value collections.
pub trait FieldValuesExt {
    /// Gets the value for a field, if present.
    fn get_field(&self, field: &str) -> Option<&str>;

    /// Gets the value for a field, returning the default if not present.
    fn get_field_or<'a>(&'a self, field: &str, default: &'a str) -> &'a str;

    /// Checks if a field exists.
    fn has_field(&self, field: &str) -> bool;

    /// Sets a field, replacing an existing value in place.
    fn set_field(&mut self, field: &str, value: impl Into<String>);

    /// Removes a field, returning its previous value.
    fn remove_field(&mut self, field: &str) -> Option<String>;
}

impl FieldValuesExt for FieldValues {
    fn get_field(&self, field: &str) -> Option<&str> {
        self.iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    fn get_field_or<'a>(&'a self, field: &str, default: &'a str) -> &'a str {
        self.get_field(field).unwrap_or(default)
    }

    fn has_field(&self, field: &str) -> bool {
        self.iter().any(|(f, _)| f == field)
    }

    fn set_field(&mut self, field: &str, value: impl Into<String>) {
        let value = value.into();
        match self.iter_mut().find(|(f, _)| f == field) {
            Some(entry) => entry.1 = value,
            None => self.push((field.to_string(), value)),
        }
    }

    fn remove_field(&mut self, field: &str) -> Option<String> {
        let pos = self.iter().position(|(f, _)| f == field)?;
        Some(self.remove(pos).1)
    }
}

/// Builds a FieldValues collection from key-value pairs.
#[macro_export]
macro_rules! field_values {
    ($($field:expr => $value:expr),* $(,)?) => {
        vec![
            $(($field.to_string(), $value.to_string()),)*
        ]
    };
}

/// Builds the raw database key for a table entry.
pub fn table_key(table: &str, key: &str) -> String {
    format!("{}{}{}", table, TABLE_KEY_SEPARATOR, key)
}

/// Compiles a Redis-style glob (`*`, `?`) into an anchored regex.
///
/// Character classes are not supported; every other character matches
/// itself literally.
pub fn glob_to_regex(pattern: &str) -> UtilResult<Regex> {
    let mut re = String::with_capacity(pattern.len() + 2);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| UtilError::internal(format!("glob {}: {}", pattern, e)))
}

/// Whole-record access to one SONiC database.
///
/// The contract is intentionally narrow: there are no transactions across
/// keys and no compare-and-swap, so read-then-write sequences by different
/// processes against the same key can interleave.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Reads a record. An absent or empty record yields `None`.
    async fn get_entry(&self, table: &str, key: &str) -> UtilResult<Option<FieldValues>>;

    /// Replaces a record. `None` or an empty field list deletes it.
    async fn set_entry(&self, table: &str, key: &str, fvs: Option<FieldValues>) -> UtilResult<()>;

    /// Lists raw keys matching a glob pattern.
    async fn keys(&self, pattern: &str) -> UtilResult<Vec<String>>;

    /// Reads a single field of a raw key.
    async fn hget(&self, raw_key: &str, field: &str) -> UtilResult<Option<String>>;

    /// Deletes a raw key.
    async fn delete(&self, raw_key: &str) -> UtilResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_id() {
        assert_eq!(DbId::ConfigDb.name(), "CONFIG_DB");
        assert_eq!(DbId::ConfigDb.id(), 4);
        assert_eq!(DbId::StateDb.id(), 6);
        assert_eq!(DbId::ChassisStateDb.name(), "CHASSIS_STATE_DB");
        assert_eq!(DbId::ChassisStateDb.id(), 13);
    }

    #[test]
    fn test_field_values_ext() {
        let mut fvs: FieldValues = field_values! {
            "admin_status" => "down",
            "state_transition_in_progress" => "True",
        };

        assert_eq!(fvs.get_field("admin_status"), Some("down"));
        assert_eq!(fvs.get_field_or("transition_start_time", "none"), "none");
        assert!(fvs.has_field("state_transition_in_progress"));

        fvs.set_field("state_transition_in_progress", "False");
        assert_eq!(fvs.get_field("state_transition_in_progress"), Some("False"));
        assert_eq!(fvs.len(), 2);

        assert_eq!(fvs.remove_field("admin_status"), Some("down".to_string()));
        assert_eq!(fvs.remove_field("admin_status"), None);
        assert_eq!(fvs.len(), 1);
    }

    #[test]
    fn test_table_key() {
        assert_eq!(table_key("CHASSIS_MODULE", "DPU0"), "CHASSIS_MODULE|DPU0");
    }

    #[test]
    fn test_glob_to_regex() {
        let re = glob_to_regex("CHASSIS_FABRIC_ASIC_TABLE*").unwrap();
        assert!(re.is_match("CHASSIS_FABRIC_ASIC_TABLE|asic3"));
        assert!(!re.is_match("CHASSIS_MODULE|FABRIC-CARD0"));

        let re = glob_to_regex("CHASSIS_MODULE|DPU?").unwrap();
        assert!(re.is_match("CHASSIS_MODULE|DPU1"));
        assert!(!re.is_match("CHASSIS_MODULE|DPU10"));

        // Regex metacharacters in the pattern are literal.
        let re = glob_to_regex("A.B|*").unwrap();
        assert!(re.is_match("A.B|x"));
        assert!(!re.is_match("AxB|x"));
    }
}
