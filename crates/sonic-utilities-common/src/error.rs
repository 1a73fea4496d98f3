//! Error types shared by the chassis utilities.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for utility operations.
pub type UtilResult<T> = Result<T, UtilError>;

/// Errors raised by the store, shell, platform and configuration layers.
#[derive(Debug, Error)]
pub enum UtilError {
    /// Failed to execute a shell command (spawn error).
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Shell command returned non-zero exit code.
    #[error("Shell command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// Redis/database operation failed.
    #[error("Database operation failed: {operation}: {message}")]
    Database {
        /// The operation that failed (e.g., "hgetall", "keys", "del").
        operation: String,
        /// Error message.
        message: String,
    },

    /// Configuration file could not be parsed or holds an invalid value.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field (or file) that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Platform description file is present but unreadable or malformed.
    #[error("Platform file {}: {message}", .path.display())]
    Platform {
        /// The offending file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Local filesystem error.
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl UtilError {
    /// Creates a database error.
    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a platform file error.
    pub fn platform(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Platform {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a filesystem error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed when the operator reissues the command.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UtilError::Database { .. } | UtilError::ShellCommandFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error() {
        let err = UtilError::database("hgetall", "Connection refused");
        assert_eq!(
            err.to_string(),
            "Database operation failed: hgetall: Connection refused"
        );
    }

    #[test]
    fn test_shell_command_failed() {
        let err = UtilError::ShellCommandFailed {
            command: "sudo systemctl stop swss@0.service".to_string(),
            exit_code: 5,
            output: "Unit not loaded".to_string(),
        };
        assert!(err.to_string().contains("systemctl stop"));
        assert!(err.to_string().contains("exit code 5"));
    }

    #[test]
    fn test_platform_error_names_file() {
        let err = UtilError::platform("/usr/share/sonic/device/x/platform.json", "bad json");
        assert_eq!(
            err.to_string(),
            "Platform file /usr/share/sonic/device/x/platform.json: bad json"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(UtilError::database("get", "timeout").is_retryable());
        assert!(!UtilError::invalid_config("database.redis_port", "zero").is_retryable());
        assert!(!UtilError::internal("bug").is_retryable());
    }
}
