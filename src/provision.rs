//! Pre-flight checked instance provisioning.
//!
//! Provisioning follows the estate's conventions: every instance carries the
//! `name`, `os`, `env`, `zone`, and `privacy` tags, owns a security group
//! and a key pair named after it, and keeps the shared `standard` group so
//! the bastion and proxy can reach it. The workflow refuses to run when any
//! of those names is already taken, so a half-configured estate is caught
//! before the first mutating call.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::audit::{AuditAction, AuditTrail};
use crate::key_store::{KeyStoreError, KeyWriter};
use crate::provider::{
    AccountOps, InstanceDescriptor, InstanceState, LaunchSpec, LaunchSpecError, ShutdownBehavior,
    TagFilter, TagSet,
};

/// Name of the security group shared by every estate instance.
pub const STANDARD_GROUP: &str = "standard";

/// User-data stanza instructing the provider to skip public addressing.
pub const PRIVATE_ONLY_USER_DATA: &str =
    "-----BEGIN OUTSCALE SECTION-----\nprivate_only=true\n-----END OUTSCALE SECTION-----";

const ALLOWED_ENV_TAGS: [&str; 2] = ["prod", "dev"];

/// Parameters for a quick provision.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionRequest {
    /// Machine name; also names the generated security group and key pair.
    pub name: String,
    /// Image to boot from.
    pub image_id: String,
    /// Commercial type.
    pub instance_type: String,
    /// `env` tag, restricted to `prod` or `dev`.
    pub env_tag: String,
    /// `zone` tag.
    pub zone_tag: String,
    /// `os` tag.
    pub os_tag: String,
    /// Existing security group to use instead of creating a named one.
    pub security_group_id: Option<String>,
    /// Whether the instance is private-only.
    pub private: bool,
    /// Extra security groups applied in addition to the generated one.
    pub extra_security_group_ids: Vec<String>,
    /// Extra tags, overriding generated ones on key collision.
    pub extra_tags: TagSet,
    /// Terminate instead of stop when the instance shuts itself down.
    pub terminate_on_shutdown: bool,
}

impl ProvisionRequest {
    /// Creates a request with the estate defaults (`dev`, private, debian).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        image_id: impl Into<String>,
        instance_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into().trim().to_owned(),
            image_id: image_id.into().trim().to_owned(),
            instance_type: instance_type.into().trim().to_owned(),
            env_tag: String::from("dev"),
            zone_tag: String::from("starwatts"),
            os_tag: String::from("debian"),
            security_group_id: None,
            private: true,
            extra_security_group_ids: Vec::new(),
            extra_tags: TagSet::new(),
            terminate_on_shutdown: false,
        }
    }

    /// Sets the `env` tag.
    #[must_use]
    pub fn env_tag(mut self, value: impl Into<String>) -> Self {
        self.env_tag = value.into();
        self
    }

    /// Sets the `zone` tag.
    #[must_use]
    pub fn zone_tag(mut self, value: impl Into<String>) -> Self {
        self.zone_tag = value.into();
        self
    }

    /// Sets the `os` tag.
    #[must_use]
    pub fn os_tag(mut self, value: impl Into<String>) -> Self {
        self.os_tag = value.into();
        self
    }

    /// Uses an existing security group instead of creating a named one.
    #[must_use]
    pub fn security_group_id(mut self, value: Option<String>) -> Self {
        self.security_group_id = value;
        self
    }

    /// Requests a public instance.
    #[must_use]
    pub const fn public(mut self) -> Self {
        self.private = false;
        self
    }

    /// Adds extra security groups.
    #[must_use]
    pub fn extra_security_group_ids(mut self, value: Vec<String>) -> Self {
        self.extra_security_group_ids = value;
        self
    }

    /// Adds extra tags.
    #[must_use]
    pub fn extra_tags(mut self, value: TagSet) -> Self {
        self.extra_tags = value;
        self
    }

    /// Terminates the instance when it shuts itself down.
    #[must_use]
    pub const fn terminate_on_shutdown(mut self, value: bool) -> Self {
        self.terminate_on_shutdown = value;
        self
    }

    /// Tags generated for the new instance, extras overriding on collision.
    #[must_use]
    pub fn generated_tags(&self) -> TagSet {
        let mut tags = TagSet::new();
        tags.insert("name", self.name.clone());
        tags.insert("os", self.os_tag.clone());
        tags.insert("env", self.env_tag.clone());
        tags.insert("zone", self.zone_tag.clone());
        tags.insert("privacy", if self.private { "true" } else { "false" });
        for (key, value) in self.extra_tags.iter() {
            tags.insert(key, value);
        }
        tags
    }
}

/// Errors raised by [`QuickProvisioner::provision`].
#[derive(Debug, Error)]
pub enum ProvisionError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the `env` tag is not one of the allowed values.
    #[error("unsupported env tag '{value}' (expected prod or dev)")]
    InvalidEnvTag {
        /// Rejected value.
        value: String,
    },
    /// Raised when the boot image cannot be fetched.
    #[error("image {image_id} could not be found: {message}")]
    ImageNotFound {
        /// Image the caller asked for.
        image_id: String,
        /// Provider message from the lookup.
        message: String,
    },
    /// Raised when a running or stopped instance already carries the name.
    #[error("an instance named '{name}' already exists")]
    NameTaken {
        /// Conflicting name tag.
        name: String,
    },
    /// Raised when a key pair already carries the name.
    #[error("a key pair named '{name}' already exists")]
    KeyPairExists {
        /// Conflicting key pair name.
        name: String,
    },
    /// Raised when a security group already carries the name.
    #[error("a security group named '{name}' already exists")]
    SecurityGroupExists {
        /// Conflicting security group name.
        name: String,
    },
    /// Raised when the shared group is missing or ambiguous.
    #[error("expected exactly one '{STANDARD_GROUP}' security group, found {count}")]
    StandardGroupAmbiguous {
        /// Number of matching groups found.
        count: usize,
    },
    /// The launch parameters were rejected before any call.
    #[error(transparent)]
    Spec(#[from] LaunchSpecError),
    /// Key material could not be persisted.
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    /// A provider call failed; the workflow aborts at that step.
    #[error("provision step '{step}' failed for {resource_id}: {source}")]
    Step {
        /// Step that failed.
        step: &'static str,
        /// Resource the step was operating on.
        resource_id: String,
        /// Provider failure, propagated unmodified.
        #[source]
        source: E,
    },
}

/// Outcome of a successful provision.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionOutcome {
    /// The launched instance.
    pub instance: InstanceDescriptor,
    /// Security group created for the instance, when one was generated.
    pub created_security_group_id: Option<String>,
    /// Where the key pair material was written.
    pub key_path: Utf8PathBuf,
    /// Mutations performed, in order.
    pub audit: AuditTrail,
}

/// Executes the quick-provision workflow against a provider.
#[derive(Debug)]
pub struct QuickProvisioner<P, K> {
    provider: P,
    key_writer: K,
}

impl<P, K> QuickProvisioner<P, K>
where
    P: AccountOps,
    K: KeyWriter,
{
    /// Creates a provisioner.
    #[must_use]
    pub const fn new(provider: P, key_writer: K) -> Self {
        Self {
            provider,
            key_writer,
        }
    }

    /// Provisions a new instance after running the pre-flight checks.
    ///
    /// The instance is launched but not waited on; callers poll for
    /// `running` themselves when they need it.
    ///
    /// # Errors
    ///
    /// Returns the pre-flight variants of [`ProvisionError`] when a check
    /// fails, and [`ProvisionError::Step`] for provider failures.
    pub async fn provision(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionOutcome, ProvisionError<P::Error>> {
        self.preflight(request).await?;

        let mut audit = AuditTrail::new();
        let mut created_security_group_id = None;

        let standard_id = self.standard_group_id().await?;

        let group_id = match &request.security_group_id {
            Some(existing) => existing.clone(),
            None => {
                let description = format!("SG applied to {} VM", request.name);
                let id = self
                    .provider
                    .create_security_group(&request.name, &description)
                    .await
                    .map_err(|source_err| {
                        step_error("create security group", &request.name, source_err)
                    })?;
                audit.record(AuditAction::CreatedSecurityGroup, &id);
                created_security_group_id = Some(id.clone());
                id
            }
        };

        let material = self
            .provider
            .create_key_pair(&request.name)
            .await
            .map_err(|source_err| step_error("create key pair", &request.name, source_err))?;
        audit.record(AuditAction::CreatedKeyPair, &material.name);
        let key_path = self.key_writer.write_key(&material)?;

        let mut security_group_ids = vec![group_id, standard_id];
        security_group_ids.extend(request.extra_security_group_ids.iter().cloned());

        let tags = request.generated_tags();
        let user_data = request
            .private
            .then(|| PRIVATE_ONLY_USER_DATA.to_owned());
        let shutdown_behavior = if request.terminate_on_shutdown {
            ShutdownBehavior::Terminate
        } else {
            ShutdownBehavior::Stop
        };

        let spec = LaunchSpec::builder()
            .image_id(request.image_id.clone())
            .instance_type(request.instance_type.clone())
            .key_name(request.name.clone())
            .security_group_ids(security_group_ids)
            .tags(tags.clone())
            .private_only(request.private)
            .user_data(user_data)
            .shutdown_behavior(shutdown_behavior)
            .build()?;

        let mut instance = self
            .provider
            .run_instance(&spec)
            .await
            .map_err(|source_err| step_error("run instance", &request.image_id, source_err))?;
        audit.record(AuditAction::LaunchedInstance, &instance.id);

        self.provider
            .replace_tags(&instance.id, &tags)
            .await
            .map_err(|source_err| step_error("apply tags", &instance.id, source_err))?;
        audit.record(AuditAction::ReplacedTags, &instance.id);
        instance.tags = tags;

        Ok(ProvisionOutcome {
            instance,
            created_security_group_id,
            key_path,
            audit,
        })
    }

    /// Runs the pre-flight checks without mutating anything.
    async fn preflight(
        &self,
        request: &ProvisionRequest,
    ) -> Result<(), ProvisionError<P::Error>> {
        if !ALLOWED_ENV_TAGS.contains(&request.env_tag.as_str()) {
            return Err(ProvisionError::InvalidEnvTag {
                value: request.env_tag.clone(),
            });
        }

        if let Some(err) = self
            .provider
            .describe_image(&request.image_id)
            .await
            .err()
        {
            return Err(ProvisionError::ImageNotFound {
                image_id: request.image_id.clone(),
                message: err.to_string(),
            });
        }

        let filter = TagFilter::new().with("name", request.name.clone());
        let named = self
            .provider
            .list_instances(&filter)
            .await
            .map_err(|source_err| step_error("list instances", &request.name, source_err))?;
        let conflict = named.iter().any(|instance| {
            matches!(
                instance.state,
                InstanceState::Running | InstanceState::Stopped
            )
        });
        if conflict {
            return Err(ProvisionError::NameTaken {
                name: request.name.clone(),
            });
        }

        let key_pairs = self
            .provider
            .list_key_pairs()
            .await
            .map_err(|source_err| step_error("list key pairs", &request.name, source_err))?;
        if key_pairs.iter().any(|pair| pair.name == request.name) {
            return Err(ProvisionError::KeyPairExists {
                name: request.name.clone(),
            });
        }

        if request.security_group_id.is_none() {
            let groups = self
                .provider
                .list_security_groups()
                .await
                .map_err(|source_err| {
                    step_error("list security groups", &request.name, source_err)
                })?;
            if groups.iter().any(|group| group.name == request.name) {
                return Err(ProvisionError::SecurityGroupExists {
                    name: request.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Resolves the shared `standard` group, requiring exactly one match.
    async fn standard_group_id(&self) -> Result<String, ProvisionError<P::Error>> {
        let groups = self
            .provider
            .list_security_groups()
            .await
            .map_err(|source_err| step_error("list security groups", STANDARD_GROUP, source_err))?;
        let matches: Vec<&str> = groups
            .iter()
            .filter(|group| group.name == STANDARD_GROUP)
            .map(|group| group.id.as_str())
            .collect();
        match matches.as_slice() {
            [only] => Ok((*only).to_owned()),
            other => Err(ProvisionError::StandardGroupAmbiguous { count: other.len() }),
        }
    }
}

fn step_error<E>(step: &'static str, resource_id: &str, source: E) -> ProvisionError<E>
where
    E: std::error::Error + 'static,
{
    ProvisionError::Step {
        step,
        resource_id: resource_id.to_owned(),
        source,
    }
}
