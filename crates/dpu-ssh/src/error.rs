//! Error types for DPU SSH provisioning.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use sonic_utilities_common::UtilError;
use thiserror::Error;

/// Result type alias for DPU SSH operations.
pub type DpuSshResult<T> = Result<T, DpuSshError>;

/// Errors raised while provisioning SSH access to DPUs.
#[derive(Debug, Error)]
pub enum DpuSshError {
    /// Credentials file could not be written or removed.
    #[error("Credentials file {}: {message}", .path.display())]
    Credentials { path: PathBuf, message: String },

    /// Credentials file holds no username/password pair.
    #[error("No DPU credentials in {}", .path.display())]
    NoCredentials { path: PathBuf },

    /// SSH protocol or transport failure.
    #[error("SSH error with {host}: {source}")]
    Ssh {
        host: String,
        #[source]
        source: russh::Error,
    },

    /// Connection did not complete in time.
    #[error("SSH connection to {host} timed out after {}s", .timeout.as_secs())]
    Timeout { host: String, timeout: Duration },

    /// Server rejected the username/password pair.
    #[error("Authentication failed for {user}@{host}")]
    AuthenticationFailed { host: String, user: String },

    /// Every credential pair failed.
    #[error("All authentication attempts failed for {host}")]
    AllAttemptsFailed { host: String },

    /// Remote command ran but reported an error.
    #[error("Remote command on {host} failed: {message}")]
    RemoteCommand { host: String, message: String },

    /// Local filesystem error.
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Store or shell failure.
    #[error(transparent)]
    Util(#[from] UtilError),
}

impl DpuSshError {
    /// Creates an SSH error.
    pub fn ssh(host: impl Into<String>, source: russh::Error) -> Self {
        Self::Ssh {
            host: host.into(),
            source,
        }
    }

    /// Creates a filesystem error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = DpuSshError::AllAttemptsFailed {
            host: "169.254.200.1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "All authentication attempts failed for 169.254.200.1"
        );

        let err = DpuSshError::Timeout {
            host: "169.254.200.2".to_string(),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(
            err.to_string(),
            "SSH connection to 169.254.200.2 timed out after 10s"
        );

        let err = DpuSshError::NoCredentials {
            path: PathBuf::from("/etc/sonic/dpu_credentials"),
        };
        assert_eq!(err.to_string(), "No DPU credentials in /etc/sonic/dpu_credentials");
    }
}
