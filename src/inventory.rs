//! Inventory rendering for the estate.
//!
//! Renders machine-readable inventories from instance descriptors: an
//! ansible hosts file grouped by tag values, and an ssh client
//! configuration that routes non-bastion hosts through the bastion when
//! generated for a machine outside the cloud. Both are pure functions over
//! descriptor slices so they can be fed from the provider or from fixtures.

use crate::provider::InstanceDescriptor;

/// Name tag identifying the bastion host.
pub const BASTION_NAME: &str = "bastion";

/// Default tag keys used to build ansible groups.
pub const DEFAULT_GRAIN: [&str; 2] = ["env", "zone"];

/// Renders an ansible hosts file.
///
/// Each named instance gets a `[name]` block listing its address (the name
/// itself when `local` is true, so resolution goes through ssh config).
/// Afterwards one `[<key>_<value>:children]` group is emitted per distinct
/// value of each grain key, in first-seen order, listing the named
/// instances carrying that tag value.
#[must_use]
pub fn ansible_hosts(instances: &[InstanceDescriptor], grain: &[&str], local: bool) -> String {
    let mut rendered = String::new();
    let mut matrix: Vec<(&str, Vec<&str>)> = grain.iter().map(|key| (*key, Vec::new())).collect();

    for instance in instances {
        if let Some(name) = instance.tags.get("name") {
            let address = if local {
                Some(name)
            } else {
                instance.private_ip.as_deref()
            };
            if let Some(addr) = address {
                rendered.push_str(&format!("[{name}]\n{addr}\n\n"));
            }
        }
        for (key, values) in &mut matrix {
            if let Some(value) = instance.tags.get(key)
                && !values.contains(&value)
            {
                values.push(value);
            }
        }
    }

    for (key, values) in &matrix {
        for value in values {
            rendered.push_str(&format!("[{key}_{value}:children]\n"));
            for instance in instances {
                if instance.tags.get(key) == Some(*value)
                    && let Some(name) = instance.tags.get("name")
                {
                    rendered.push_str(&format!("{name}\n"));
                }
            }
            rendered.push('\n');
        }
    }

    rendered
}

/// Renders an ssh client configuration.
///
/// The bastion entry uses its public address; every other named instance
/// uses its private address and, when `local` is true, a `ProxyCommand`
/// forwarding through the bastion.
#[must_use]
pub fn ssh_config(instances: &[InstanceDescriptor], local: bool) -> String {
    let mut rendered = String::new();

    for instance in instances {
        let Some(name) = instance.tags.get("name") else {
            continue;
        };
        if name == BASTION_NAME {
            if let Some(address) = instance.public_ip.as_deref() {
                rendered.push_str(&format!("Host {name}\n\tHostName {address}\n\tUser root\n\n"));
            }
            continue;
        }
        let Some(address) = instance.private_ip.as_deref() else {
            continue;
        };
        rendered.push_str(&format!("Host {name}\n\tHostName {address}\n\tUser root\n"));
        if local {
            rendered.push_str("\tProxyCommand ssh -q -W %h:%p bastion\n");
        }
        rendered.push('\n');
    }

    rendered
}

/// Hardware description of a commercial instance type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InstanceTypeSpec {
    /// Number of virtual cores.
    pub cores: u32,
    /// RAM in megabytes.
    pub ram_mb: u32,
}

/// Known commercial types and their hardware.
pub const INSTANCE_TYPE_CATALOG: &[(&str, InstanceTypeSpec)] = &[
    (
        "t1.micro",
        InstanceTypeSpec {
            cores: 1,
            ram_mb: 600,
        },
    ),
    (
        "t2.micro",
        InstanceTypeSpec {
            cores: 1,
            ram_mb: 1000,
        },
    ),
    (
        "t2.medium",
        InstanceTypeSpec {
            cores: 2,
            ram_mb: 4000,
        },
    ),
    (
        "m1.xlarge",
        InstanceTypeSpec {
            cores: 4,
            ram_mb: 15000,
        },
    ),
];

/// Looks up the hardware of a commercial type.
#[must_use]
pub fn instance_type_spec(instance_type: &str) -> Option<InstanceTypeSpec> {
    INSTANCE_TYPE_CATALOG
        .iter()
        .find(|(name, _)| *name == instance_type)
        .map(|(_, spec)| *spec)
}

/// Total hardware consumed by a set of instances.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResourceTotals {
    /// Cores across every instance with a known type.
    pub cores: u32,
    /// RAM in megabytes across every instance with a known type.
    pub ram_mb: u32,
}

impl ResourceTotals {
    /// Sums the catalogued hardware of the given instances; unknown types
    /// contribute nothing.
    #[must_use]
    pub fn tally(instances: &[InstanceDescriptor]) -> Self {
        instances
            .iter()
            .filter_map(|instance| instance_type_spec(&instance.instance_type))
            .fold(Self::default(), |totals, spec| Self {
                cores: totals.cores + spec.cores,
                ram_mb: totals.ram_mb + spec.ram_mb,
            })
    }
}
