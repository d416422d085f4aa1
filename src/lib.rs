//! Core library for the Skylift estate tool.
//!
//! The crate exposes a provider abstraction over an EC2-compatible cloud
//! API and the orchestration workflows layered on top of it: a resource
//! state poller, an instance privacy converter, a volume resize workflow
//! with rollback, quick provisioning, decommissioning, and inventory
//! rendering.

pub mod audit;
pub mod config;
pub mod decommission;
pub mod inventory;
pub mod key_store;
pub mod outscale;
pub mod privacy;
pub mod provider;
pub mod provision;
pub mod resize;
pub mod test_support;
pub mod wait;

pub use audit::{AuditAction, AuditEntry, AuditTrail};
pub use config::{ConfigError, OutscaleConfig};
pub use decommission::{Approval, DecommissionError, DecommissionReport, Decommissioner};
pub use inventory::{
    BASTION_NAME, DEFAULT_GRAIN, INSTANCE_TYPE_CATALOG, InstanceTypeSpec, ResourceTotals,
    ansible_hosts, instance_type_spec, ssh_config,
};
pub use key_store::{KeyStore, KeyStoreError, KeyWriter};
pub use outscale::{OutscaleError, OutscaleProvider};
pub use privacy::{ConversionReport, ConvertError, PrivacyConverter};
pub use provider::{
    AccountOps, AttachmentState, ImageDescriptor, InstanceDescriptor, InstanceOps, InstanceState,
    KeyPairDescriptor, KeyPairMaterial, LaunchSpec, LaunchSpecBuilder, LaunchSpecError,
    ProviderFuture, SecurityGroupDescriptor, ShutdownBehavior, SnapshotDescriptor, TagFilter,
    TagSet, VolumeAttachment, VolumeDescriptor, VolumeOps,
};
pub use provision::{
    PRIVATE_ONLY_USER_DATA, ProvisionError, ProvisionOutcome, ProvisionRequest, QuickProvisioner,
    STANDARD_GROUP,
};
pub use resize::{ResizeError, ResizeReport, StrandedResize, VolumeResizer};
pub use wait::{
    CancelHandle, CancelToken, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT, SNAPSHOT_COMPLETE,
    WaitError, WaitOptions, cancel_pair, wait_for_state,
};
