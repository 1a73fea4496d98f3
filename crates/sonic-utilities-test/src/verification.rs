//! Verification helpers for chassis module tests
//!
//! Assertions over database records and over the service commands a fake
//! collaborator captured.

use sonic_utilities_common::{table_key, FieldValues, FieldValuesExt, TableStore, UtilError};
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Store error: {0}")]
    Store(#[from] UtilError),

    #[error("Expected record '{key}' not found")]
    KeyNotFound { key: String },

    #[error("Record '{key}' should not exist, found {fields:?}")]
    UnexpectedKey { key: String, fields: FieldValues },

    #[error("Expected field '{field}' not found in '{key}'")]
    FieldNotFound { key: String, field: String },

    #[error("Field '{field}' should not be present in '{key}', found '{value}'")]
    UnexpectedField {
        key: String,
        field: String,
        value: String,
    },

    #[error("Value mismatch for {key}:{field}: expected '{expected}', got '{actual}'")]
    ValueMismatch {
        key: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Expected {expected} keys matching pattern '{pattern}', found {actual}")]
    KeyCountMismatch {
        pattern: String,
        expected: usize,
        actual: usize,
    },

    #[error("Command check '{check}' failed for {commands:?}")]
    CommandMismatch { check: String, commands: Vec<String> },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Record assertions against any [`TableStore`].
pub struct StoreVerifier<'a> {
    store: &'a dyn TableStore,
}

impl<'a> StoreVerifier<'a> {
    pub fn new(store: &'a dyn TableStore) -> Self {
        Self { store }
    }

    /// Verifies a record exists and returns its fields.
    pub async fn assert_record_exists(&self, table: &str, key: &str) -> VerifyResult<FieldValues> {
        self.store
            .get_entry(table, key)
            .await?
            .ok_or_else(|| VerificationError::KeyNotFound {
                key: table_key(table, key),
            })
    }

    pub async fn assert_record_absent(&self, table: &str, key: &str) -> VerifyResult<()> {
        match self.store.get_entry(table, key).await? {
            Some(fields) => Err(VerificationError::UnexpectedKey {
                key: table_key(table, key),
                fields,
            }),
            None => Ok(()),
        }
    }

    /// Verifies one field of a record.
    pub async fn assert_field_value(
        &self,
        table: &str,
        key: &str,
        field: &str,
        expected: &str,
    ) -> VerifyResult<()> {
        let fields = self.assert_record_exists(table, key).await?;
        let raw_key = table_key(table, key);
        match fields.get_field(field) {
            None => Err(VerificationError::FieldNotFound {
                key: raw_key,
                field: field.to_string(),
            }),
            Some(actual) if actual != expected => Err(VerificationError::ValueMismatch {
                key: raw_key,
                field: field.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    /// Verifies a field is missing from an existing record.
    pub async fn assert_field_absent(&self, table: &str, key: &str, field: &str) -> VerifyResult<()> {
        let fields = self.assert_record_exists(table, key).await?;
        match fields.get_field(field) {
            Some(value) => Err(VerificationError::UnexpectedField {
                key: table_key(table, key),
                field: field.to_string(),
                value: value.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Verifies several fields at once.
    pub async fn assert_fields(
        &self,
        table: &str,
        key: &str,
        expected: &[(&str, &str)],
    ) -> VerifyResult<()> {
        for (field, value) in expected {
            self.assert_field_value(table, key, field, value).await?;
        }
        Ok(())
    }

    /// Verifies the number of raw keys matching a glob.
    pub async fn assert_key_count(&self, pattern: &str, expected: usize) -> VerifyResult<()> {
        let actual = self.store.keys(pattern).await?.len();
        if actual != expected {
            return Err(VerificationError::KeyCountMismatch {
                pattern: pattern.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

/// Assertions over captured service commands.
pub struct CommandVerifier {
    captured_commands: Vec<String>,
}

impl CommandVerifier {
    pub fn new(captured_commands: Vec<String>) -> Self {
        Self { captured_commands }
    }

    fn mismatch(&self, check: String) -> VerificationError {
        VerificationError::CommandMismatch {
            check,
            commands: self.captured_commands.clone(),
        }
    }

    /// Verifies some command contains `expected`.
    pub fn assert_command_executed(&self, expected: &str) -> VerifyResult<()> {
        if self.captured_commands.iter().any(|cmd| cmd.contains(expected)) {
            Ok(())
        } else {
            Err(self.mismatch(format!("executed '{}'", expected)))
        }
    }

    /// Verifies no command contains `unexpected`.
    pub fn assert_command_not_executed(&self, unexpected: &str) -> VerifyResult<()> {
        if self.captured_commands.iter().any(|cmd| cmd.contains(unexpected)) {
            Err(self.mismatch(format!("not executed '{}'", unexpected)))
        } else {
            Ok(())
        }
    }

    pub fn assert_command_count(&self, expected: usize) -> VerifyResult<()> {
        if self.captured_commands.len() != expected {
            return Err(self.mismatch(format!("{} commands", expected)));
        }
        Ok(())
    }

    /// Verifies the exact command sequence.
    pub fn assert_sequence(&self, expected: &[&str]) -> VerifyResult<()> {
        if self.captured_commands.iter().map(String::as_str).ne(expected.iter().copied()) {
            return Err(self.mismatch(format!("sequence {:?}", expected)));
        }
        Ok(())
    }

    pub fn captured_commands(&self) -> &[String] {
        &self.captured_commands
    }
}
