//! DPU login credentials file.
//!
//! The file holds alternating username and password lines. Pairs are tried
//! in file order when connecting to a DPU.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{DpuSshError, DpuSshResult};

/// Owner read/write only.
const CREDENTIALS_MODE: u32 = 0o600;

/// A username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Reads every complete pair from the credentials file.
///
/// A trailing unpaired line is ignored. An unreadable file yields no pairs.
pub fn read_credentials(path: &Path) -> Vec<Credential> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Error reading {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    let lines: Vec<&str> = content.lines().map(str::trim).collect();
    lines
        .chunks_exact(2)
        .map(|pair| Credential::new(pair[0], pair[1]))
        .collect()
}

/// Writes a pair to the credentials file.
///
/// With `append` the pair is added after the existing ones; otherwise the
/// file is replaced. A replaced or newly created file gets mode 0600.
pub fn write_credentials(
    path: &Path,
    username: &str,
    password: &str,
    append: bool,
) -> DpuSshResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .mode(CREDENTIALS_MODE)
        .open(path)
        .map_err(|e| DpuSshError::io(path, e))?;

    // The open mode only applies to new files.
    if !append {
        file.set_permissions(fs::Permissions::from_mode(CREDENTIALS_MODE))
            .map_err(|e| DpuSshError::io(path, e))?;
    }

    write!(file, "{}\n{}\n", username, password).map_err(|e| DpuSshError::io(path, e))?;

    debug!(
        "{} credentials for {} in {}",
        if append { "Appended" } else { "Saved" },
        username,
        path.display()
    );
    Ok(())
}

/// Deletes the credentials file.
pub fn remove_credentials_file(path: &Path) -> DpuSshResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(DpuSshError::Credentials {
            path: path.to_path_buf(),
            message: "file does not exist".to_string(),
        }),
        Err(e) => Err(DpuSshError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_read_pairs_ignores_trailing_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dpu_credentials");
        fs::write(&path, "admin\nYourPaSsWoRd\nroot\n  secret  \norphan\n").unwrap();

        assert_eq!(
            read_credentials(&path),
            vec![
                Credential::new("admin", "YourPaSsWoRd"),
                Credential::new("root", "secret"),
            ]
        );
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(read_credentials(&dir.path().join("absent")).is_empty());
    }

    #[test]
    fn test_replace_sets_owner_only_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dpu_credentials");
        fs::write(&path, "old\npass\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        write_credentials(&path, "admin", "pw", false).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "admin\npw\n");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn test_append_keeps_existing_pairs_and_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dpu_credentials");

        write_credentials(&path, "admin", "pw1", true).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();
        write_credentials(&path, "root", "pw2", true).unwrap();

        assert_eq!(read_credentials(&path).len(), 2);
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_remove_credentials_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dpu_credentials");
        fs::write(&path, "admin\npw\n").unwrap();

        remove_credentials_file(&path).unwrap();
        assert!(!path.exists());
        assert!(matches!(
            remove_credentials_file(&path),
            Err(DpuSshError::Credentials { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", Credential::new("admin", "hunter2"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
