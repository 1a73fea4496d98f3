//! Passwordless SSH provisioning for smartswitch DPUs.
//!
//! - [`credentials`]: the username/password file used for first login
//! - [`remote`]: the [`RemoteShell`] seam and its `russh` implementation
//! - [`provision`]: key installation, removal and state queries keyed by
//!   DPU module name
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sonic_dpu_ssh::{DpuSshProvisioner, RusshShell};
//!
//! let provisioner = DpuSshProvisioner::new(config.dpu_ssh, state_db, Arc::new(RusshShell::new()));
//! provisioner.enable_dpu("DPU0").await?;
//! ```

pub mod credentials;
pub mod error;
pub mod provision;
pub mod remote;

pub use credentials::{read_credentials, remove_credentials_file, write_credentials, Credential};
pub use error::{DpuSshError, DpuSshResult};
pub use provision::{DpuSshOutcome, DpuSshProvisioner, PasswordlessState};
pub use remote::{RemoteShell, RusshShell, SshTarget};
