//! Binary entry point for the Skylift CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;

use skylift::{
    AccountOps, Approval, Decommissioner, KeyStore, OutscaleConfig, OutscaleProvider,
    PrivacyConverter, ProvisionRequest, QuickProvisioner, ResizeError, TagFilter, VolumeResizer,
    ansible_hosts, ssh_config,
};

mod cli;

use cli::{
    Cli, DecommissionCommand, InventoryCommand, InventoryFormat, ProvisionCommand,
    ResizeVolumeCommand, SetPrivateCommand,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("refusing to decommission without --yes")]
    ConfirmationRequired,
    #[error("CRITICAL: {0}")]
    Critical(String),
    #[error("{0}")]
    Workflow(String),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::SetPrivate(command) => set_private(command).await,
        Cli::ResizeVolume(command) => resize_volume(command).await,
        Cli::Provision(command) => provision(command).await,
        Cli::Decommission(command) => decommission(command).await,
        Cli::Inventory(command) => inventory(command).await,
    }
}

fn load_provider() -> Result<(OutscaleProvider, OutscaleConfig), CliError> {
    let config =
        OutscaleConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let provider = OutscaleProvider::new(config.clone())
        .map_err(|err| CliError::Provider(err.to_string()))?;
    Ok((provider, config))
}

async fn set_private(args: SetPrivateCommand) -> Result<(), CliError> {
    let SetPrivateCommand {
        instance_id,
        terminate_old,
    } = args;
    let (provider, config) = load_provider()?;
    let converter = PrivacyConverter::new(provider, config.wait_options());
    let report = converter
        .convert_to_private(&instance_id, terminate_old)
        .await
        .map_err(|err| CliError::Workflow(err.to_string()))?;

    let mut stdout = io::stdout();
    writeln!(
        stdout,
        "replaced {} ({}) with {} ({})",
        instance_id,
        report.old_private_ip.as_deref().unwrap_or("no address"),
        report.new_instance_id,
        report.new_private_ip.as_deref().unwrap_or("no address"),
    )
    .ok();
    render_audit(&mut stdout, report.audit.entries());
    Ok(())
}

async fn resize_volume(args: ResizeVolumeCommand) -> Result<(), CliError> {
    let ResizeVolumeCommand { volume_id, size_gb } = args;
    let (provider, config) = load_provider()?;
    let resizer = VolumeResizer::new(provider, config.wait_options());
    let report = resizer
        .resize(&volume_id, size_gb)
        .await
        .map_err(|err| match err {
            critical @ ResizeError::CriticalInconsistency(_) => {
                CliError::Critical(critical.to_string())
            }
            other => CliError::Workflow(other.to_string()),
        })?;

    let mut stdout = io::stdout();
    writeln!(
        stdout,
        "volume {} replaced by {} ({} GiB)",
        report.replaced_volume_id, report.volume.id, report.volume.size_gb,
    )
    .ok();
    render_audit(&mut stdout, report.audit.entries());
    Ok(())
}

async fn provision(args: ProvisionCommand) -> Result<(), CliError> {
    let (provider, _config) = load_provider()?;
    let key_store = KeyStore::default_ssh_dir().map_err(|err| CliError::Config(err.to_string()))?;
    let provisioner = QuickProvisioner::new(provider, key_store);

    let mut request = ProvisionRequest::new(args.name, args.image, args.instance_type)
        .env_tag(args.env)
        .zone_tag(args.zone_tag)
        .os_tag(args.os)
        .security_group_id(args.security_group_id)
        .terminate_on_shutdown(args.terminate_on_shutdown);
    if args.public {
        request = request.public();
    }

    let outcome = provisioner
        .provision(&request)
        .await
        .map_err(|err| CliError::Workflow(err.to_string()))?;

    let mut stdout = io::stdout();
    writeln!(
        stdout,
        "launched {} ({}), key written to {}",
        outcome.instance.id,
        outcome.instance.private_ip.as_deref().unwrap_or("no address"),
        outcome.key_path,
    )
    .ok();
    render_audit(&mut stdout, outcome.audit.entries());
    Ok(())
}

async fn decommission(args: DecommissionCommand) -> Result<(), CliError> {
    let DecommissionCommand { instance_id, yes } = args;
    if !yes {
        return Err(CliError::ConfirmationRequired);
    }
    let (provider, config) = load_provider()?;
    let decommissioner = Decommissioner::new(provider, config.wait_options());
    let report = decommissioner
        .decommission(&instance_id, Approval::Granted)
        .await
        .map_err(|err| CliError::Workflow(err.to_string()))?;

    let mut stdout = io::stdout();
    writeln!(stdout, "terminated {}", report.instance_id).ok();
    render_audit(&mut stdout, report.audit.entries());
    Ok(())
}

async fn inventory(args: InventoryCommand) -> Result<(), CliError> {
    let (provider, _config) = load_provider()?;
    let instances = provider
        .list_instances(&TagFilter::new())
        .await
        .map_err(|err| CliError::Provider(err.to_string()))?;

    let rendered = match args.format {
        InventoryFormat::Ansible { local, grain } => {
            let keys: Vec<&str> = grain.iter().map(String::as_str).collect();
            ansible_hosts(&instances, &keys, local)
        }
        InventoryFormat::SshConfig { local } => ssh_config(&instances, local),
    };

    let mut stdout = io::stdout();
    stdout.write_all(rendered.as_bytes()).ok();
    Ok(())
}

fn render_audit(target: &mut impl Write, entries: &[skylift::AuditEntry]) {
    for entry in entries {
        writeln!(target, "  {entry}").ok();
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
