//! Command-line interface definitions for the `skylift` binary.
//!
//! This module centralises the clap parser structures so both the main
//! binary and the build script can reuse them when generating the manual
//! page.

use clap::{Parser, Subcommand};

/// Top-level CLI for the `skylift` binary.
#[derive(Debug, Parser)]
#[command(
    name = "skylift",
    about = "Reshape a cloud estate: privacy conversion, volume resizing, inventory",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Replace an instance with a private-only copy.
    #[command(
        name = "set-private",
        about = "Replace an instance with a private-only copy"
    )]
    SetPrivate(SetPrivateCommand),
    /// Grow a volume by replacing it with a larger copy.
    #[command(
        name = "resize-volume",
        about = "Grow a volume by replacing it with a larger copy"
    )]
    ResizeVolume(ResizeVolumeCommand),
    /// Provision an instance with the estate conventions.
    #[command(name = "provision", about = "Provision an instance with the estate conventions")]
    Provision(ProvisionCommand),
    /// Terminate an instance and clean up its security group and key pair.
    #[command(
        name = "decommission",
        about = "Terminate an instance and clean up its security group and key pair"
    )]
    Decommission(DecommissionCommand),
    /// Render an inventory of the estate.
    #[command(name = "inventory", about = "Render an inventory of the estate")]
    Inventory(InventoryCommand),
}

/// Arguments for the `skylift set-private` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct SetPrivateCommand {
    /// Instance to convert.
    pub(crate) instance_id: String,
    /// Terminate the original instance once the replacement exists.
    #[arg(long)]
    pub(crate) terminate_old: bool,
}

/// Arguments for the `skylift resize-volume` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ResizeVolumeCommand {
    /// Volume to grow.
    pub(crate) volume_id: String,
    /// New size in gigabytes; must be larger than the current size.
    pub(crate) size_gb: u32,
}

/// Arguments for the `skylift provision` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ProvisionCommand {
    /// Machine name; also names the generated security group and key pair.
    pub(crate) name: String,
    /// Image to boot from.
    #[arg(long, value_name = "IMAGE_ID")]
    pub(crate) image: String,
    /// Commercial instance type.
    #[arg(long, value_name = "TYPE")]
    pub(crate) instance_type: String,
    /// Environment tag, `prod` or `dev`.
    #[arg(long, default_value = "dev")]
    pub(crate) env: String,
    /// Zone tag.
    #[arg(long, default_value = "starwatts")]
    pub(crate) zone_tag: String,
    /// Operating system tag.
    #[arg(long, default_value = "debian")]
    pub(crate) os: String,
    /// Give the instance a public address.
    #[arg(long)]
    pub(crate) public: bool,
    /// Use an existing security group instead of creating a named one.
    #[arg(long, value_name = "SG_ID")]
    pub(crate) security_group_id: Option<String>,
    /// Terminate instead of stop when the instance shuts itself down.
    #[arg(long)]
    pub(crate) terminate_on_shutdown: bool,
}

/// Arguments for the `skylift decommission` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DecommissionCommand {
    /// Instance to terminate and clean up after.
    pub(crate) instance_id: String,
    /// Confirm the destructive operation; without it the command refuses.
    #[arg(long)]
    pub(crate) yes: bool,
}

/// Arguments for the `skylift inventory` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct InventoryCommand {
    /// Which inventory to render.
    #[command(subcommand)]
    pub(crate) format: InventoryFormat,
}

/// Inventory output formats.
#[derive(Debug, Subcommand)]
pub(crate) enum InventoryFormat {
    /// Ansible hosts file grouped by tag values.
    #[command(name = "ansible")]
    Ansible {
        /// Render for use outside the cloud (hosts resolve via ssh config).
        #[arg(long)]
        local: bool,
        /// Tag keys to group by.
        #[arg(long, value_name = "TAG", default_values_t = [String::from("env"), String::from("zone")])]
        grain: Vec<String>,
    },
    /// ssh client configuration routed through the bastion.
    #[command(name = "ssh-config")]
    SshConfig {
        /// Render for use outside the cloud (adds ProxyCommand entries).
        #[arg(long)]
        local: bool,
    },
}
