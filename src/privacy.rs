//! Instance privacy conversion.
//!
//! Replaces a publicly-addressable instance with a functionally identical
//! one that only has a private network address. The running instance is
//! stopped, captured into a temporary machine image, and relaunched from
//! that image with the same key pair, security groups, instance type, and
//! tag set; the temporary image and its backing snapshot are deleted once
//! the replacement launch has returned a reference.
//!
//! When the replacement launch fails the workflow rolls back: the temporary
//! image is deregistered and the original instance is restarted.

use thiserror::Error;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditTrail};
use crate::provider::{InstanceOps, InstanceState, LaunchSpec, LaunchSpecError};
use crate::provision::PRIVATE_ONLY_USER_DATA;
use crate::wait::{CancelToken, WaitError, WaitOptions, wait_for_state};

const TEMP_IMAGE_PREFIX: &str = "skylift-privacy-";

/// Errors raised by [`PrivacyConverter::convert_to_private`].
#[derive(Debug, Error)]
pub enum ConvertError<E>
where
    E: std::error::Error + 'static,
{
    /// A poll failed, timed out, or was cancelled.
    #[error(transparent)]
    Wait(#[from] WaitError<E>),
    /// The replacement launch parameters were rejected before any call.
    #[error(transparent)]
    Spec(#[from] LaunchSpecError),
    /// A provider call outside the launch rollback failed; the workflow
    /// aborts at that step.
    #[error("conversion step '{step}' failed for {resource_id}: {source}")]
    Step {
        /// Step that failed.
        step: &'static str,
        /// Resource the step was operating on.
        resource_id: String,
        /// Provider failure, propagated unmodified.
        #[source]
        source: E,
    },
    /// The replacement instance could not be launched. The temporary image
    /// was deregistered and the original instance restarted; any rollback
    /// step that also failed is appended to the message.
    #[error("failed to launch private replacement for {instance_id}: {message}")]
    LaunchFailed {
        /// Instance the conversion was requested for.
        instance_id: String,
        /// Launch failure plus the outcome of each rollback step.
        message: String,
    },
}

/// Outcome of a successful conversion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConversionReport {
    /// Private address of the original instance.
    pub old_private_ip: Option<String>,
    /// Private address of the replacement.
    pub new_private_ip: Option<String>,
    /// Identifier of the replacement instance.
    pub new_instance_id: String,
    /// Mutations performed, in order.
    pub audit: AuditTrail,
}

/// Executes the privacy conversion workflow against a provider.
#[derive(Debug)]
pub struct PrivacyConverter<P> {
    provider: P,
    options: WaitOptions,
    cancel: CancelToken,
}

impl<P> PrivacyConverter<P>
where
    P: InstanceOps,
{
    /// Creates a converter with the given wait options and no cancellation.
    #[must_use]
    pub const fn new(provider: P, options: WaitOptions) -> Self {
        Self {
            provider,
            options,
            cancel: CancelToken::never(),
        }
    }

    /// Installs a cancellation token checked between polls.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Converts `instance_id` to a private-only replacement.
    ///
    /// When `terminate_old` is true the original instance is terminated once
    /// the replacement exists; otherwise it is left stopped.
    ///
    /// # Errors
    ///
    /// Returns [`ConvertError::LaunchFailed`] when the replacement cannot be
    /// launched (after rollback), and [`ConvertError::Step`] or
    /// [`ConvertError::Wait`] for any other failure.
    pub async fn convert_to_private(
        &self,
        instance_id: &str,
        terminate_old: bool,
    ) -> Result<ConversionReport, ConvertError<P::Error>> {
        let mut audit = AuditTrail::new();

        self.provider
            .stop_instance(instance_id)
            .await
            .map_err(|source_err| step_error("stop instance", instance_id, source_err))?;
        self.wait_for_instance_state(instance_id, InstanceState::Stopped.wire())
            .await?;
        audit.record(AuditAction::StoppedInstance, instance_id);

        let original = self
            .provider
            .describe_instance(instance_id)
            .await
            .map_err(|source_err| step_error("describe stopped instance", instance_id, source_err))?;

        let image_name = format!("{TEMP_IMAGE_PREFIX}{}", Uuid::new_v4().simple());
        let image_id = self
            .provider
            .create_image(instance_id, &image_name)
            .await
            .map_err(|source_err| step_error("create image", instance_id, source_err))?;
        audit.record(AuditAction::CreatedImage, &image_id);
        self.wait_for_image(&image_id).await?;

        let spec = LaunchSpec::builder()
            .image_id(image_id.clone())
            .instance_type(original.instance_type.clone())
            .key_name(original.key_name.clone())
            .security_group_ids(original.security_group_ids.clone())
            .tags(original.tags.clone())
            .private_only(true)
            .user_data(Some(PRIVATE_ONLY_USER_DATA.to_owned()))
            .build()?;

        let replacement = match self.provider.run_instance(&spec).await {
            Ok(instance) => instance,
            Err(launch_err) => {
                let notes = self.rollback_launch(instance_id, &image_id).await;
                return Err(ConvertError::LaunchFailed {
                    instance_id: instance_id.to_owned(),
                    message: with_notes(launch_err.to_string(), &notes),
                });
            }
        };
        audit.record(AuditAction::LaunchedInstance, &replacement.id);

        // Cleanup is unconditional once the launch returned a reference; the
        // replacement does not have to be running yet.
        self.provider
            .deregister_image(&image_id, true)
            .await
            .map_err(|source_err| step_error("deregister image", &image_id, source_err))?;
        audit.record(AuditAction::DeletedImage, &image_id);

        if terminate_old {
            self.provider
                .terminate_instance(instance_id)
                .await
                .map_err(|source_err| step_error("terminate instance", instance_id, source_err))?;
            audit.record(AuditAction::TerminatedInstance, instance_id);
        }

        Ok(ConversionReport {
            old_private_ip: original.private_ip,
            new_private_ip: replacement.private_ip,
            new_instance_id: replacement.id,
            audit,
        })
    }

    /// Best-effort rollback after a failed launch: deregister the temporary
    /// image (with its backing snapshot) and restart the original instance.
    async fn rollback_launch(&self, instance_id: &str, image_id: &str) -> Vec<String> {
        let mut notes = Vec::new();
        if let Some(err) = self.provider.deregister_image(image_id, true).await.err() {
            notes.push(format!("deregistering image {image_id} also failed: {err}"));
        }
        if let Some(err) = self.provider.start_instance(instance_id).await.err() {
            notes.push(format!("restart of {instance_id} also failed: {err}"));
        }
        notes
    }

    async fn wait_for_instance_state(
        &self,
        instance_id: &str,
        target: &str,
    ) -> Result<(), ConvertError<P::Error>> {
        let subject = format!("instance {instance_id}");
        wait_for_state(
            || {
                let fut = self.provider.describe_instance(instance_id);
                async move { fut.await.map(|instance| instance.state.wire().to_owned()) }
            },
            target,
            &subject,
            self.options,
            &self.cancel,
        )
        .await
        .map_err(ConvertError::from)
    }

    async fn wait_for_image(&self, image_id: &str) -> Result<(), ConvertError<P::Error>> {
        let subject = format!("image {image_id}");
        wait_for_state(
            || {
                let fut = self.provider.describe_image(image_id);
                async move { fut.await.map(|image| image.state) }
            },
            "available",
            &subject,
            self.options,
            &self.cancel,
        )
        .await
        .map_err(ConvertError::from)
    }
}

fn step_error<E>(step: &'static str, resource_id: &str, source: E) -> ConvertError<E>
where
    E: std::error::Error + 'static,
{
    ConvertError::Step {
        step,
        resource_id: resource_id.to_owned(),
        source,
    }
}

fn with_notes(message: String, notes: &[String]) -> String {
    if notes.is_empty() {
        message
    } else {
        format!("{message}; {}", notes.join("; "))
    }
}
