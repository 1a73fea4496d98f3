//! chassis-modules - chassis module configuration and status commands
//!
//! Operator messages go to stdout, diagnostics to stderr through
//! `tracing` (`RUST_LOG`, or `--verbose` for debug).

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sonic_chassis_modules::cli::{
    fabric_messages, render_status, request_messages, Cli, Command, ConfigCommand, ShowCommand,
};
use sonic_chassis_modules::{
    AdminStatus, ChassisError, ChassisModules, FabricLinkReconciler, SystemdServiceControl,
};
use sonic_utilities_common::{PlatformInfo, RedisConfig, RedisStore, TableStore, UtilitiesConfig};

/// Exit status for invalid operator input.
const EXIT_USAGE: u8 = 2;

/// Initializes tracing/logging subsystem
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

async fn connect(config: RedisConfig) -> Result<Arc<dyn TableStore>> {
    let name = config.db_id.name();
    let store = RedisStore::connect(config)
        .await
        .with_context(|| format!("connecting to {}", name))?;
    Ok(Arc::new(store))
}

async fn run_config(
    command: ConfigCommand,
    config: &UtilitiesConfig,
    platform: PlatformInfo,
) -> Result<()> {
    match command {
        ConfigCommand::Shutdown { module_name } => {
            set_admin_state(&module_name, true, config, platform).await
        }
        ConfigCommand::Startup { module_name } => {
            set_admin_state(&module_name, false, config, platform).await
        }
        #[cfg(feature = "dpu-ssh")]
        ConfigCommand::DpuSsh(command) => dpu::run_ssh(command, config, &platform).await,
        #[cfg(feature = "dpu-ssh")]
        ConfigCommand::DpuCredentials(command) => dpu::run_credentials(command, config),
    }
}

async fn set_admin_state(
    module_name: &str,
    shutdown: bool,
    config: &UtilitiesConfig,
    platform: PlatformInfo,
) -> Result<()> {
    let config_db = connect(config.database.config_db()).await?;
    let mut chassis = ChassisModules::new(platform, config_db);
    let module = chassis.resolve_module(module_name)?;

    if module.is_fabric_card() {
        let chassis_state_db = connect(config.database.chassis_state_db()).await?;
        let reconciler = FabricLinkReconciler::new(
            chassis.guard().clone(),
            chassis_state_db,
            Arc::new(SystemdServiceControl::new()),
        );
        chassis = chassis.with_fabric_reconciler(reconciler);
    }

    let target = if shutdown {
        AdminStatus::Down
    } else {
        AdminStatus::Up
    };
    let mut report = chassis.request(&module, target).await?;
    // CONFIG_DB is already written when reconciliation fails.
    for line in request_messages(&report) {
        println!("{}", line);
    }

    chassis.reconcile_fabric(&mut report).await?;
    debug!(?report, "Transition finished");
    if let Some(fabric) = &report.fabric {
        for line in fabric_messages(fabric) {
            println!("{}", line);
        }
    }
    Ok(())
}

async fn run_show(
    command: ShowCommand,
    config: &UtilitiesConfig,
    platform: PlatformInfo,
) -> Result<()> {
    match command {
        ShowCommand::Status { module_name } => {
            let config_db = connect(config.database.config_db()).await?;
            let chassis = ChassisModules::new(platform, config_db);
            let statuses = chassis.module_statuses(module_name.as_deref()).await?;
            println!("{}", render_status(&statuses));
            Ok(())
        }
        #[cfg(feature = "dpu-ssh")]
        ShowCommand::DpuSsh { dpu } => dpu::show_ssh(&dpu, config, &platform).await,
    }
}

#[cfg(feature = "dpu-ssh")]
mod dpu {
    use std::sync::Arc;

    use anyhow::{bail, Result};
    use sonic_chassis_modules::cli::{select_dpus, CredentialsCommand, DpuSshCommand};
    use sonic_dpu_ssh::{
        remove_credentials_file, write_credentials, DpuSshOutcome, DpuSshProvisioner, RusshShell,
    };
    use sonic_utilities_common::{PlatformInfo, UtilitiesConfig};

    use super::connect;

    async fn provisioner(config: &UtilitiesConfig) -> Result<DpuSshProvisioner> {
        let state_db = connect(config.database.state_db()).await?;
        Ok(DpuSshProvisioner::new(
            config.dpu_ssh.clone(),
            state_db,
            Arc::new(RusshShell::new()),
        ))
    }

    fn outcome_message(dpu: &str, outcome: &DpuSshOutcome) -> String {
        match outcome {
            DpuSshOutcome::KeyInstalled { ip, username } => {
                format!("SSH key successfully copied to {} ({}) using {}.", dpu, ip, username)
            }
            DpuSshOutcome::KeyRemoved { ip } => format!("SSH key removed from {} ({})", dpu, ip),
            DpuSshOutcome::AlreadyDisabled { ip } => {
                format!("Passwordless SSH is not enabled on {} ({})", dpu, ip)
            }
            DpuSshOutcome::Unreachable => format!("{} is offline or has no midplane IP", dpu),
        }
    }

    pub async fn run_ssh(
        command: DpuSshCommand,
        config: &UtilitiesConfig,
        platform: &PlatformInfo,
    ) -> Result<()> {
        let (arg, enable) = match &command {
            DpuSshCommand::Enable { dpu } => (dpu, true),
            DpuSshCommand::Disable { dpu } => (dpu, false),
        };
        let dpus = select_dpus(platform, arg)?;
        let provisioner = provisioner(config).await?;

        let mut failed = 0;
        for dpu in &dpus {
            let result = if enable {
                provisioner.enable_dpu(dpu).await
            } else {
                provisioner.disable_dpu(dpu).await
            };
            match result {
                Ok(outcome) => println!("{}", outcome_message(dpu, &outcome)),
                Err(e) => {
                    eprintln!("{}: {}", dpu, e);
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            bail!("{} of {} DPUs failed", failed, dpus.len());
        }
        Ok(())
    }

    pub fn run_credentials(command: CredentialsCommand, config: &UtilitiesConfig) -> Result<()> {
        let path = &config.dpu_ssh.password_file;
        match command {
            CredentialsCommand::Add { username, password } => {
                write_credentials(path, &username, &password, true)?
            }
            CredentialsCommand::Replace { username, password } => {
                write_credentials(path, &username, &password, false)?
            }
            CredentialsCommand::Remove => {
                remove_credentials_file(path)?;
                println!("Password file removed successfully.");
            }
        }
        Ok(())
    }

    pub async fn show_ssh(arg: &str, config: &UtilitiesConfig, platform: &PlatformInfo) -> Result<()> {
        let dpus = select_dpus(platform, arg)?;
        let provisioner = provisioner(config).await?;
        for dpu in &dpus {
            let state = provisioner.dpu_state(dpu).await?;
            println!("{}: {}", dpu, state);
        }
        Ok(())
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = UtilitiesConfig::load_or_default(&cli.config).context("loading configuration")?;
    let platform = PlatformInfo::detect(&config.platform).context("detecting platform")?;

    match cli.command {
        Command::Config(command) => run_config(command, &config, platform).await,
        Command::Show(command) => run_show(command, &config, platform).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let usage = e
                .downcast_ref::<ChassisError>()
                .is_some_and(ChassisError::is_usage_error);
            if usage {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
