//! Passwordless SSH provisioning of DPUs.
//!
//! The local public key is appended to the DPU's `authorized_keys` over a
//! password login, using the pairs from the credentials file in order. The
//! DPU's midplane address comes from STATE_DB.

use std::fmt;
use std::sync::Arc;

use sonic_utilities_common::shell::{self, shellquote, SSH_KEYGEN_CMD};
use sonic_utilities_common::{table_key, DpuSshConfig, TableStore};
use tracing::{debug, info, instrument, warn};

use crate::credentials::{read_credentials, Credential};
use crate::error::{DpuSshError, DpuSshResult};
use crate::remote::{RemoteShell, SshTarget};

/// STATE_DB table with module midplane reachability
pub const STATE_CHASSIS_MIDPLANE_TABLE_NAME: &str = "CHASSIS_MIDPLANE_TABLE";

/// STATE_DB table with module operational state
pub const STATE_CHASSIS_MODULE_TABLE_NAME: &str = "CHASSIS_MODULE_TABLE";

const IP_ADDRESS_FIELD: &str = "ip_address";
const OPER_STATUS_FIELD: &str = "oper_status";
const OPER_STATUS_OFFLINE: &str = "Offline";

/// Removes every RSA key from the remote `authorized_keys`.
pub const REMOVE_KEY_COMMAND: &str = "sed -i '/ssh-rsa/d' ~/.ssh/authorized_keys";

/// Prints `exists` when the remote `authorized_keys` is present.
pub const AUTHORIZED_KEYS_CHECK_COMMAND: &str =
    "test -f ~/.ssh/authorized_keys && echo \"exists\" || echo \"not found\"";

/// Appends a public key to the remote `authorized_keys`.
pub fn install_key_command(public_key: &str) -> String {
    format!(
        "mkdir -p ~/.ssh && chmod 700 ~/.ssh && echo {} >> ~/.ssh/authorized_keys && chmod 600 ~/.ssh/authorized_keys",
        shellquote(public_key)
    )
}

/// Whether a DPU accepts key-based logins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordlessState {
    Enabled,
    Disabled,
}

impl fmt::Display for PasswordlessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordlessState::Enabled => f.write_str("Enabled"),
            PasswordlessState::Disabled => f.write_str("Disabled"),
        }
    }
}

/// Result of enabling or disabling passwordless SSH on one DPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DpuSshOutcome {
    /// Key appended using this username.
    KeyInstalled { ip: String, username: String },
    /// Key removed.
    KeyRemoved { ip: String },
    /// Passwordless SSH was not enabled; nothing to remove.
    AlreadyDisabled { ip: String },
    /// DPU has no midplane address or is offline.
    Unreachable,
}

/// Provisions SSH keys on DPUs.
pub struct DpuSshProvisioner {
    config: DpuSshConfig,
    state_db: Arc<dyn TableStore>,
    shell: Arc<dyn RemoteShell>,
}

impl DpuSshProvisioner {
    pub fn new(
        config: DpuSshConfig,
        state_db: Arc<dyn TableStore>,
        shell: Arc<dyn RemoteShell>,
    ) -> Self {
        Self {
            config,
            state_db,
            shell,
        }
    }

    fn target(&self, ip: &str) -> SshTarget {
        SshTarget::new(ip, self.config.port, self.config.connect_timeout())
    }

    fn credentials(&self) -> DpuSshResult<Vec<Credential>> {
        let credentials = read_credentials(&self.config.password_file);
        if credentials.is_empty() {
            return Err(DpuSshError::NoCredentials {
                path: self.config.password_file.clone(),
            });
        }
        Ok(credentials)
    }

    /// Midplane IP of a module, or `None` when unknown or offline.
    pub async fn module_ip(&self, module: &str) -> DpuSshResult<Option<String>> {
        let ip = self
            .state_db
            .hget(
                &table_key(STATE_CHASSIS_MIDPLANE_TABLE_NAME, module),
                IP_ADDRESS_FIELD,
            )
            .await?;
        let oper_status = self
            .state_db
            .hget(
                &table_key(STATE_CHASSIS_MODULE_TABLE_NAME, module),
                OPER_STATUS_FIELD,
            )
            .await?;

        if oper_status.as_deref() == Some(OPER_STATUS_OFFLINE) {
            info!(module, ip = ?ip, "Module is offline");
            return Ok(None);
        }
        Ok(ip)
    }

    /// Returns the local public key, generating an RSA-4096 key pair first
    /// when none exists.
    pub async fn ensure_local_key(&self) -> DpuSshResult<String> {
        let public_key = &self.config.public_key_file;
        if !tokio::fs::try_exists(public_key)
            .await
            .map_err(|e| DpuSshError::io(public_key, e))?
        {
            info!("SSH key not found. Generating a new key...");
            let cmd = format!(
                "{} -t rsa -b 4096 -f {} -N ''",
                SSH_KEYGEN_CMD,
                shellquote(&self.config.private_key_file.to_string_lossy())
            );
            shell::exec_or_throw(&cmd).await?;
        }

        let key = tokio::fs::read_to_string(public_key)
            .await
            .map_err(|e| DpuSshError::io(public_key, e))?;
        Ok(key.trim().to_string())
    }

    /// Appends the local public key to the DPU at `ip`.
    ///
    /// Credential pairs are tried in order; the first one that runs the
    /// command successfully wins. Returns its username.
    #[instrument(skip(self))]
    pub async fn copy_ssh_key(&self, ip: &str) -> DpuSshResult<String> {
        let credentials = self.credentials()?;
        let command = install_key_command(&self.ensure_local_key().await?);
        let target = self.target(ip);

        for credential in &credentials {
            match self.shell.exec(&target, credential, &command).await {
                Ok(result) if result.success() => {
                    info!(
                        "SSH key successfully copied to {} using {}.",
                        ip, credential.username
                    );
                    return Ok(credential.username.clone());
                }
                Ok(result) => warn!(
                    user = %credential.username,
                    exit_code = result.exit_code,
                    "Key installation failed: {}",
                    result.combined_output()
                ),
                Err(e) => debug!(user = %credential.username, "Attempt failed: {}", e),
            }
        }

        Err(DpuSshError::AllAttemptsFailed {
            host: ip.to_string(),
        })
    }

    /// Removes RSA keys from the DPU at `ip`.
    ///
    /// A pair that fails to connect, or whose command writes to stderr,
    /// hands over to the next pair.
    #[instrument(skip(self))]
    pub async fn remove_ssh_key(&self, ip: &str) -> DpuSshResult<()> {
        let credentials = self.credentials()?;
        let target = self.target(ip);

        for credential in &credentials {
            match self.shell.exec(&target, credential, REMOVE_KEY_COMMAND).await {
                Ok(result) if result.stderr.is_empty() => {
                    info!("SSH key removed from {}", ip);
                    return Ok(());
                }
                Ok(result) => warn!(
                    user = %credential.username,
                    "Error removing SSH key from DPU {}: {}",
                    ip,
                    result.stderr
                ),
                Err(e) => warn!(
                    user = %credential.username,
                    "Error while removing SSH key from DPU {}: {}",
                    ip,
                    e
                ),
            }
        }

        Err(DpuSshError::AllAttemptsFailed {
            host: ip.to_string(),
        })
    }

    /// Reports whether `authorized_keys` exists on the DPU at `ip`.
    ///
    /// Any failure to log in reads as [`PasswordlessState::Disabled`].
    pub async fn passwordless_state(&self, ip: &str) -> PasswordlessState {
        let target = self.target(ip);
        for credential in read_credentials(&self.config.password_file) {
            match self
                .shell
                .exec(&target, &credential, AUTHORIZED_KEYS_CHECK_COMMAND)
                .await
            {
                Ok(result) if result.stdout == "exists" => return PasswordlessState::Enabled,
                Ok(_) => return PasswordlessState::Disabled,
                Err(e) => debug!(user = %credential.username, "State check failed: {}", e),
            }
        }
        PasswordlessState::Disabled
    }

    /// Installs the local key on a DPU module.
    pub async fn enable_dpu(&self, module: &str) -> DpuSshResult<DpuSshOutcome> {
        let Some(ip) = self.module_ip(module).await? else {
            return Ok(DpuSshOutcome::Unreachable);
        };
        let username = self.copy_ssh_key(&ip).await?;
        Ok(DpuSshOutcome::KeyInstalled { ip, username })
    }

    /// Removes the key from a DPU module when passwordless SSH is enabled.
    pub async fn disable_dpu(&self, module: &str) -> DpuSshResult<DpuSshOutcome> {
        let Some(ip) = self.module_ip(module).await? else {
            return Ok(DpuSshOutcome::Unreachable);
        };
        if self.passwordless_state(&ip).await == PasswordlessState::Disabled {
            return Ok(DpuSshOutcome::AlreadyDisabled { ip });
        }
        self.remove_ssh_key(&ip).await?;
        Ok(DpuSshOutcome::KeyRemoved { ip })
    }

    /// Passwordless state of a DPU module; unreachable modules are disabled.
    pub async fn dpu_state(&self, module: &str) -> DpuSshResult<PasswordlessState> {
        match self.module_ip(module).await? {
            Some(ip) => Ok(self.passwordless_state(&ip).await),
            None => Ok(PasswordlessState::Disabled),
        }
    }
}
