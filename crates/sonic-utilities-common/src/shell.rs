//! Shell command execution for the chassis utilities.
//!
//! Every external program (systemctl, ssh-keygen, ...) is run through
//! `/bin/sh -c` with arguments quoted by [`shellquote`].
//!
//! # Example
//!
//! ```ignore
//! use sonic_utilities_common::shell::{self, SUDO_CMD, SYSTEMCTL_CMD, shellquote};
//!
//! let cmd = format!("{} {} stop {}", SUDO_CMD, SYSTEMCTL_CMD, shellquote("swss@0.service"));
//! shell::exec_or_throw(&cmd).await?;
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{UtilError, UtilResult};

/// Path to `sudo`; service mutations are run with elevated privileges.
pub const SUDO_CMD: &str = "/usr/bin/sudo";

/// Path to `systemctl` for per-ASIC service control.
pub const SYSTEMCTL_CMD: &str = "/bin/systemctl";

/// Path to `ssh-keygen` for local key generation.
pub const SSH_KEYGEN_CMD: &str = "/usr/bin/ssh-keygen";

/// Characters that need escaping inside shell double-quotes:
/// `$`, `` ` ``, `"`, `\` and newline.
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Quotes a string for safe use in shell commands.
///
/// The string is wrapped in double quotes and every character with a
/// special meaning inside double quotes is backslash-escaped.
///
/// # Example
///
/// ```
/// use sonic_utilities_common::shell::shellquote;
///
/// assert_eq!(shellquote("swss@3.service"), "\"swss@3.service\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Result of a shell command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// The exit code of the command (0 = success).
    pub exit_code: i32,
    /// Trimmed stdout output.
    pub stdout: String,
    /// Trimmed stderr output.
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Executes a shell command.
///
/// A non-zero exit status is not an error here; callers that need one
/// use [`exec_or_throw`]. Only a spawn failure is reported as `Err`.
pub async fn exec(cmd: &str) -> UtilResult<ExecResult> {
    tracing::debug!(command = %cmd, "Executing shell command");

    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| UtilError::ShellExec {
            command: cmd.to_string(),
            source: e,
        })?;

    let exit_code = output.status.code().unwrap_or(-1);
    let result = ExecResult {
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };

    if result.success() {
        tracing::trace!(command = %cmd, "Command succeeded");
    } else {
        tracing::debug!(
            command = %cmd,
            exit_code = exit_code,
            stderr = %result.stderr,
            "Command exited non-zero"
        );
    }

    Ok(result)
}

/// Executes a shell command and turns a non-zero exit into
/// [`UtilError::ShellCommandFailed`].
///
/// Returns the trimmed stdout on success.
pub async fn exec_or_throw(cmd: &str) -> UtilResult<String> {
    let result = exec(cmd).await?;
    if result.success() {
        Ok(result.stdout)
    } else {
        Err(UtilError::ShellCommandFailed {
            command: cmd.to_string(),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}
