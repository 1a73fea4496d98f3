//! Remote command execution on DPUs over SSH.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::PublicKey;
use russh::ChannelMsg;
use sonic_utilities_common::shell::ExecResult;
use tracing::debug;

use crate::credentials::Credential;
use crate::error::{DpuSshError, DpuSshResult};

/// stderr stream id of SSH extended data.
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Address of a DPU's SSH server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl SshTarget {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
        }
    }
}

/// Runs one command on a remote host per connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Connects with a password, runs `command` and disconnects.
    async fn exec(
        &self,
        target: &SshTarget,
        credential: &Credential,
        command: &str,
    ) -> DpuSshResult<ExecResult>;
}

/// Host keys of midplane DPUs change on every reimage and are accepted
/// without verification.
struct AcceptAnyHostKey;

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(&mut self, _server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// [`RemoteShell`] backed by `russh`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RusshShell;

impl RusshShell {
    pub fn new() -> Self {
        Self
    }

    async fn connect(
        target: &SshTarget,
        credential: &Credential,
    ) -> DpuSshResult<Handle<AcceptAnyHostKey>> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(target.connect_timeout),
            ..Default::default()
        });

        let mut session = tokio::time::timeout(
            target.connect_timeout,
            client::connect(config, (target.host.as_str(), target.port), AcceptAnyHostKey),
        )
        .await
        .map_err(|_| DpuSshError::Timeout {
            host: target.host.clone(),
            timeout: target.connect_timeout,
        })?
        .map_err(|e| DpuSshError::ssh(&target.host, e))?;

        let authenticated = session
            .authenticate_password(credential.username.as_str(), credential.password.as_str())
            .await
            .map_err(|e| DpuSshError::ssh(&target.host, e))?
            .success();
        if !authenticated {
            return Err(DpuSshError::AuthenticationFailed {
                host: target.host.clone(),
                user: credential.username.clone(),
            });
        }
        Ok(session)
    }
}

#[async_trait]
impl RemoteShell for RusshShell {
    async fn exec(
        &self,
        target: &SshTarget,
        credential: &Credential,
        command: &str,
    ) -> DpuSshResult<ExecResult> {
        let session = Self::connect(target, credential).await?;
        debug!(host = %target.host, user = %credential.username, command, "Running remote command");

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| DpuSshError::ssh(&target.host, e))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| DpuSshError::ssh(&target.host, e))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                    stderr.extend_from_slice(&data)
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    exit_code = Some(i32::try_from(exit_status).unwrap_or(i32::MAX))
                }
                _ => {}
            }
        }

        if let Err(e) = session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
        {
            debug!(host = %target.host, "Disconnect failed: {}", e);
        }

        let result = ExecResult {
            // No exit status means the channel closed without one.
            exit_code: exit_code.unwrap_or(-1),
            stdout: String::from_utf8_lossy(&stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        };
        debug!(host = %target.host, exit_code = result.exit_code, "Remote command finished");
        Ok(result)
    }
}
