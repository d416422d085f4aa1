//! Provider abstraction for the compute estate.
//!
//! The original tooling grafted helper methods straight onto the SDK's
//! connection, instance, and volume classes. Here the provider surface is an
//! explicit set of traits so workflows stay generic over the concrete API
//! client and tests can substitute scripted doubles.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Future returned by provider operations.
pub type ProviderFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Lifecycle state reported for an instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstanceState {
    /// Instance is being provisioned.
    Pending,
    /// Instance is powered on.
    Running,
    /// Instance is shutting down.
    Stopping,
    /// Instance is powered off.
    Stopped,
    /// Instance has been destroyed.
    Terminated,
    /// Any state this crate does not model explicitly.
    Other(String),
}

impl InstanceState {
    /// Returns the wire-format name of the state.
    #[must_use]
    pub const fn wire(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Terminated => "terminated",
            Self::Other(state) => state.as_str(),
        }
    }

    /// Parses a wire-format state name.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "terminated" => Self::Terminated,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Attachment state reported for a volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AttachmentState {
    /// Volume exists and is not attached to any instance.
    Available,
    /// Volume is attached to an instance.
    Attached,
    /// Attachment is in progress.
    Attaching,
    /// Detachment is in progress.
    Detaching,
    /// Any state this crate does not model explicitly.
    Other(String),
}

impl AttachmentState {
    /// Returns the wire-format name of the state.
    #[must_use]
    pub const fn wire(&self) -> &str {
        match self {
            Self::Available => "available",
            Self::Attached => "attached",
            Self::Attaching => "attaching",
            Self::Detaching => "detaching",
            Self::Other(state) => state.as_str(),
        }
    }

    /// Parses a wire-format state name.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "available" => Self::Available,
            "attached" => Self::Attached,
            "attaching" => Self::Attaching,
            "detaching" => Self::Detaching,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Key/value metadata attached to estate resources.
///
/// Tags are the estate's only naming mechanism; keys are case-sensitive and
/// ordering is stable so rendered inventories are deterministic.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TagSet(BTreeMap<String, String>);

impl TagSet {
    /// Creates an empty tag set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts or replaces a tag.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value of a tag, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true when no tags are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of tags in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns a copy with every key and value lower-cased.
    #[must_use]
    pub fn lowercased(&self) -> Self {
        self.0
            .iter()
            .map(|(key, value)| (key.to_lowercase(), value.to_lowercase()))
            .collect()
    }
}

impl FromIterator<(String, String)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.to_owned(), value.to_owned()))
                .collect(),
        )
    }
}

/// Conjunction of tag equality requirements used to filter instances.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TagFilter(BTreeMap<String, String>);

impl TagFilter {
    /// Creates an empty filter, matching every resource.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds an equality requirement.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns true when every requirement is satisfied by `tags`.
    #[must_use]
    pub fn matches(&self, tags: &TagSet) -> bool {
        self.0
            .iter()
            .all(|(key, value)| tags.get(key) == Some(value.as_str()))
    }

    /// Iterates over the filter's requirements in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Point-in-time view of an instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceDescriptor {
    /// Provider identifier, e.g. `i-1a2b3c`.
    pub id: String,
    /// Current lifecycle state.
    pub state: InstanceState,
    /// Private network address.
    pub private_ip: Option<String>,
    /// Public network address, absent for private-only instances.
    pub public_ip: Option<String>,
    /// Commercial type, e.g. `t2.medium`.
    pub instance_type: String,
    /// Name of the key pair the instance was launched with.
    pub key_name: String,
    /// Security group identifiers applied to the instance.
    pub security_group_ids: Vec<String>,
    /// Tag metadata.
    pub tags: TagSet,
    /// Availability zone the instance is placed in.
    pub zone: String,
}

/// Where a volume is attached.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeAttachment {
    /// Instance the volume is attached to.
    pub instance_id: String,
    /// Device path on that instance, e.g. `/dev/sdb`.
    pub device: String,
}

/// Point-in-time view of a volume.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeDescriptor {
    /// Provider identifier, e.g. `vol-1a2b3c`.
    pub id: String,
    /// Size in gigabytes. Grows only by replacement, never in place.
    pub size_gb: u32,
    /// Current attachment state.
    pub state: AttachmentState,
    /// Attachment details when the volume is attached.
    pub attachment: Option<VolumeAttachment>,
    /// Availability zone the volume lives in.
    pub zone: String,
}

/// Point-in-time view of a snapshot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotDescriptor {
    /// Provider identifier, e.g. `snap-1a2b3c`.
    pub id: String,
    /// Volume the snapshot was taken from.
    pub volume_id: String,
    /// Completion percentage as reported on the wire, e.g. `100%`.
    pub progress: String,
}

/// Point-in-time view of a machine image.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageDescriptor {
    /// Provider identifier, e.g. `ami-1a2b3c`.
    pub id: String,
    /// Readiness state, `available` once usable.
    pub state: String,
}

/// Security group summary.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SecurityGroupDescriptor {
    /// Provider identifier, e.g. `sg-1a2b3c`.
    pub id: String,
    /// Human-chosen group name.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

/// Key pair summary as listed by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyPairDescriptor {
    /// Key pair name, unique per account.
    pub name: String,
    /// Provider-computed fingerprint when available.
    pub fingerprint: Option<String>,
}

/// Key pair material returned exactly once at creation time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyPairMaterial {
    /// Key pair name.
    pub name: String,
    /// PEM-encoded private key.
    pub material: String,
}

/// Shutdown behaviour requested for a new instance.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ShutdownBehavior {
    /// The instance powers off and can be started again.
    #[default]
    Stop,
    /// The instance is destroyed when it shuts down.
    Terminate,
}

impl ShutdownBehavior {
    /// Returns the wire-format name of the behaviour.
    #[must_use]
    pub const fn wire(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Terminate => "terminate",
        }
    }
}

/// Parameters required to launch a new instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchSpec {
    /// Image to boot from.
    pub image_id: String,
    /// Commercial type to request.
    pub instance_type: String,
    /// Key pair name for SSH access.
    pub key_name: String,
    /// Security group identifiers to apply.
    pub security_group_ids: Vec<String>,
    /// Tags applied after launch.
    pub tags: TagSet,
    /// When true the instance must receive no public address.
    pub private_only: bool,
    /// Optional user-data payload handed to the first boot.
    pub user_data: Option<String>,
    /// Behaviour when the instance shuts itself down.
    pub shutdown_behavior: ShutdownBehavior,
    /// Optional target availability zone.
    pub zone: Option<String>,
}

impl LaunchSpec {
    /// Starts a builder for a [`LaunchSpec`].
    #[must_use]
    pub fn builder() -> LaunchSpecBuilder {
        LaunchSpecBuilder::default()
    }

    /// Validates the spec, returning a descriptive error when a required
    /// field is missing.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchSpecError::Validation`] when any required string field
    /// is empty.
    pub fn validate(&self) -> Result<(), LaunchSpecError> {
        if self.image_id.is_empty() {
            return Err(LaunchSpecError::Validation("image_id".to_owned()));
        }
        if self.instance_type.is_empty() {
            return Err(LaunchSpecError::Validation("instance_type".to_owned()));
        }
        if self.key_name.is_empty() {
            return Err(LaunchSpecError::Validation("key_name".to_owned()));
        }
        Ok(())
    }
}

/// Builder for [`LaunchSpec`] that defers trimming and validation to
/// construction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LaunchSpecBuilder {
    image_id: String,
    instance_type: String,
    key_name: String,
    security_group_ids: Vec<String>,
    tags: TagSet,
    private_only: bool,
    user_data: Option<String>,
    shutdown_behavior: ShutdownBehavior,
    zone: Option<String>,
}

impl LaunchSpecBuilder {
    /// Sets the image identifier.
    #[must_use]
    pub fn image_id(mut self, value: impl Into<String>) -> Self {
        self.image_id = value.into();
        self
    }

    /// Sets the commercial type.
    #[must_use]
    pub fn instance_type(mut self, value: impl Into<String>) -> Self {
        self.instance_type = value.into();
        self
    }

    /// Sets the key pair name.
    #[must_use]
    pub fn key_name(mut self, value: impl Into<String>) -> Self {
        self.key_name = value.into();
        self
    }

    /// Sets the security group identifiers.
    #[must_use]
    pub fn security_group_ids(mut self, value: Vec<String>) -> Self {
        self.security_group_ids = value;
        self
    }

    /// Sets the tag metadata.
    #[must_use]
    pub fn tags(mut self, value: TagSet) -> Self {
        self.tags = value;
        self
    }

    /// Requests a private-only instance.
    #[must_use]
    pub const fn private_only(mut self, value: bool) -> Self {
        self.private_only = value;
        self
    }

    /// Sets the user-data payload.
    #[must_use]
    pub fn user_data(mut self, value: Option<String>) -> Self {
        self.user_data = value;
        self
    }

    /// Sets the shutdown behaviour.
    #[must_use]
    pub const fn shutdown_behavior(mut self, value: ShutdownBehavior) -> Self {
        self.shutdown_behavior = value;
        self
    }

    /// Sets the target availability zone.
    #[must_use]
    pub fn zone(mut self, value: Option<String>) -> Self {
        self.zone = value;
        self
    }

    /// Builds and validates the [`LaunchSpec`], trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchSpecError::Validation`] when any required field is
    /// empty.
    pub fn build(self) -> Result<LaunchSpec, LaunchSpecError> {
        let spec = LaunchSpec {
            image_id: self.image_id.trim().to_owned(),
            instance_type: self.instance_type.trim().to_owned(),
            key_name: self.key_name.trim().to_owned(),
            security_group_ids: self.security_group_ids,
            tags: self.tags,
            private_only: self.private_only,
            user_data: self.user_data,
            shutdown_behavior: self.shutdown_behavior,
            zone: self.zone.map(|zone| zone.trim().to_owned()),
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// Errors raised while assembling launch parameters.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum LaunchSpecError {
    /// Raised when a request is missing a required field.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Instance lifecycle operations every provider must support.
pub trait InstanceOps {
    /// Provider specific error type returned by all operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches the current view of an instance.
    fn describe_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ProviderFuture<'a, InstanceDescriptor, Self::Error>;

    /// Requests a stop; completion is observed by polling.
    fn stop_instance<'a>(&'a self, instance_id: &'a str) -> ProviderFuture<'a, (), Self::Error>;

    /// Requests a start; completion is observed by polling.
    fn start_instance<'a>(&'a self, instance_id: &'a str) -> ProviderFuture<'a, (), Self::Error>;

    /// Destroys an instance.
    fn terminate_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ProviderFuture<'a, (), Self::Error>;

    /// Creates a machine image from a stopped instance and returns its id.
    fn create_image<'a>(
        &'a self,
        instance_id: &'a str,
        name: &'a str,
    ) -> ProviderFuture<'a, String, Self::Error>;

    /// Fetches the current view of an image.
    fn describe_image<'a>(
        &'a self,
        image_id: &'a str,
    ) -> ProviderFuture<'a, ImageDescriptor, Self::Error>;

    /// Deletes an image, optionally together with its backing snapshot.
    fn deregister_image<'a>(
        &'a self,
        image_id: &'a str,
        delete_backing_snapshot: bool,
    ) -> ProviderFuture<'a, (), Self::Error>;

    /// Launches a new instance and returns its initial view.
    fn run_instance<'a>(
        &'a self,
        spec: &'a LaunchSpec,
    ) -> ProviderFuture<'a, InstanceDescriptor, Self::Error>;

    /// Replaces the full tag set of a resource.
    fn replace_tags<'a>(
        &'a self,
        resource_id: &'a str,
        tags: &'a TagSet,
    ) -> ProviderFuture<'a, (), Self::Error>;
}

/// Volume and snapshot operations used by the resize workflow.
pub trait VolumeOps: InstanceOps {
    /// Fetches the current view of a volume.
    fn describe_volume<'a>(
        &'a self,
        volume_id: &'a str,
    ) -> ProviderFuture<'a, VolumeDescriptor, Self::Error>;

    /// Creates a snapshot of a volume.
    fn create_snapshot<'a>(
        &'a self,
        volume_id: &'a str,
        name: &'a str,
    ) -> ProviderFuture<'a, SnapshotDescriptor, Self::Error>;

    /// Fetches the current view of a snapshot.
    fn describe_snapshot<'a>(
        &'a self,
        snapshot_id: &'a str,
    ) -> ProviderFuture<'a, SnapshotDescriptor, Self::Error>;

    /// Deletes a snapshot.
    fn delete_snapshot<'a>(&'a self, snapshot_id: &'a str)
    -> ProviderFuture<'a, (), Self::Error>;

    /// Creates a volume of `size_gb` from a snapshot in the given zone.
    fn create_volume_from_snapshot<'a>(
        &'a self,
        snapshot_id: &'a str,
        zone: &'a str,
        size_gb: u32,
    ) -> ProviderFuture<'a, VolumeDescriptor, Self::Error>;

    /// Deletes a volume.
    fn delete_volume<'a>(&'a self, volume_id: &'a str) -> ProviderFuture<'a, (), Self::Error>;

    /// Attaches a volume to an instance at a device path.
    fn attach_volume<'a>(
        &'a self,
        volume_id: &'a str,
        instance_id: &'a str,
        device: &'a str,
    ) -> ProviderFuture<'a, (), Self::Error>;

    /// Detaches a volume from its instance.
    fn detach_volume<'a>(&'a self, volume_id: &'a str) -> ProviderFuture<'a, (), Self::Error>;
}

/// Account-wide lookup and lifecycle operations.
pub trait AccountOps: InstanceOps {
    /// Lists instances whose tags satisfy the filter.
    fn list_instances<'a>(
        &'a self,
        filter: &'a TagFilter,
    ) -> ProviderFuture<'a, Vec<InstanceDescriptor>, Self::Error>;

    /// Lists every security group in the account.
    fn list_security_groups<'a>(
        &'a self,
    ) -> ProviderFuture<'a, Vec<SecurityGroupDescriptor>, Self::Error>;

    /// Creates a security group and returns its id.
    fn create_security_group<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
    ) -> ProviderFuture<'a, String, Self::Error>;

    /// Deletes a security group by id.
    fn delete_security_group<'a>(
        &'a self,
        group_id: &'a str,
    ) -> ProviderFuture<'a, (), Self::Error>;

    /// Lists every key pair in the account.
    fn list_key_pairs<'a>(&'a self) -> ProviderFuture<'a, Vec<KeyPairDescriptor>, Self::Error>;

    /// Creates a key pair and returns its private material.
    fn create_key_pair<'a>(
        &'a self,
        name: &'a str,
    ) -> ProviderFuture<'a, KeyPairMaterial, Self::Error>;

    /// Deletes a key pair by name.
    fn delete_key_pair<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, (), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_filter_requires_every_pair() {
        let tags: TagSet = [("name", "web-1"), ("env", "prod")].into_iter().collect();
        let filter = TagFilter::new().with("env", "prod");
        assert!(filter.matches(&tags));
        let stricter = TagFilter::new().with("env", "prod").with("zone", "defab");
        assert!(!stricter.matches(&tags));
    }

    #[test]
    fn tag_set_lowercases_keys_and_values() {
        let tags: TagSet = [("Name", "Web-1"), ("ENV", "Prod")].into_iter().collect();
        let lowered = tags.lowercased();
        assert_eq!(lowered.get("name"), Some("web-1"));
        assert_eq!(lowered.get("env"), Some("prod"));
        assert_eq!(lowered.len(), 2);
    }

    #[test]
    fn launch_spec_rejects_missing_image() {
        let result = LaunchSpec::builder()
            .instance_type("t2.micro")
            .key_name("ops")
            .build();
        assert_eq!(
            result,
            Err(LaunchSpecError::Validation("image_id".to_owned()))
        );
    }

    #[test]
    fn instance_state_round_trips_known_names() {
        for name in ["pending", "running", "stopping", "stopped", "terminated"] {
            assert_eq!(InstanceState::from_wire(name).wire(), name);
        }
        assert_eq!(InstanceState::from_wire("rebooting").wire(), "rebooting");
    }
}
