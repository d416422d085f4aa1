//! Volume resize workflow.
//!
//! A volume never grows in place: the workflow snapshots the source volume,
//! creates a larger replacement from the snapshot, and swaps the two when
//! the source is attached to an instance. The snapshot is always taken
//! before any destructive step so the source data is never at risk.
//!
//! The attached branch carries explicit rollback: a failed detach restores
//! the running instance untouched, a failed attach re-attaches the original
//! volume, and only the double failure (attach and re-attach) is surfaced
//! as an unrecoverable [`ResizeError::CriticalInconsistency`] that leaves
//! every intermediate resource in place for manual recovery.

use thiserror::Error;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditTrail};
use crate::provider::{AttachmentState, VolumeAttachment, VolumeDescriptor, VolumeOps};
use crate::wait::{CancelToken, SNAPSHOT_COMPLETE, WaitError, WaitOptions, wait_for_state};

const TEMP_SNAPSHOT_PREFIX: &str = "skylift-resize-";

/// Resources stranded by an unrecoverable attach failure.
///
/// Every identifier here still exists on the provider side; nothing is
/// deleted once this state is reached.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StrandedResize {
    /// Instance left stopped with no volume at `device`.
    pub instance_id: String,
    /// Device path that has no volume attached.
    pub device: String,
    /// The original volume, now detached.
    pub old_volume_id: String,
    /// The replacement volume that could not be attached.
    pub new_volume_id: String,
    /// The snapshot the replacement was created from.
    pub snapshot_id: String,
    /// Message from the failed re-attach of the original volume.
    pub detail: String,
}

/// Errors raised by [`VolumeResizer::resize`].
#[derive(Debug, Error)]
pub enum ResizeError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the requested size does not grow the volume.
    #[error(
        "volume {volume_id} is {current_gb} GiB; replacement size {requested_gb} GiB must be larger"
    )]
    InvalidArgument {
        /// Volume the resize was requested for.
        volume_id: String,
        /// Current size of that volume.
        current_gb: u32,
        /// Size that was requested.
        requested_gb: u32,
    },
    /// A poll failed, timed out, or was cancelled.
    #[error(transparent)]
    Wait(#[from] WaitError<E>),
    /// A provider call outside the rollback branches failed; the workflow
    /// aborts at that step and intermediate resources may remain.
    #[error("resize step '{step}' failed for {resource_id}: {source}")]
    Step {
        /// Step that failed.
        step: &'static str,
        /// Resource the step was operating on.
        resource_id: String,
        /// Provider failure, propagated unmodified.
        #[source]
        source: E,
    },
    /// The old volume could not be detached; the instance was restarted and
    /// the snapshot and replacement volume were deleted. The original volume
    /// remains attached and usable.
    #[error("failed to detach volume {volume_id} from instance {instance_id}: {message}")]
    DetachFailed {
        /// Volume that stayed attached.
        volume_id: String,
        /// Instance it stayed attached to.
        instance_id: String,
        /// Detach failure plus the outcome of each rollback step.
        message: String,
    },
    /// The replacement could not be attached but the original volume was
    /// re-attached; the pre-call state was restored and the snapshot and
    /// replacement volume were deleted.
    #[error("failed to attach volume {volume_id} to instance {instance_id}: {message}")]
    AttachFailed {
        /// Replacement volume that could not be attached.
        volume_id: String,
        /// Target instance.
        instance_id: String,
        /// Attach failure plus the outcome of each rollback step.
        message: String,
    },
    /// Both the attach of the replacement and the re-attach of the original
    /// failed. The instance is left stopped with no volume at the device and
    /// no automated deletion is performed: the old volume, the new volume,
    /// and the snapshot all still exist for manual recovery.
    #[error(
        "critical inconsistency: instance {} left stopped with no volume at {}; \
         old volume {}, new volume {}, and snapshot {} retained for manual recovery ({})",
        .0.instance_id,
        .0.device,
        .0.old_volume_id,
        .0.new_volume_id,
        .0.snapshot_id,
        .0.detail
    )]
    CriticalInconsistency(Box<StrandedResize>),
}

/// Outcome of a successful resize.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResizeReport {
    /// The replacement volume.
    pub volume: VolumeDescriptor,
    /// Identifier of the deleted source volume.
    pub replaced_volume_id: String,
    /// Mutations performed, in order.
    pub audit: AuditTrail,
}

/// Executes the volume resize workflow against a provider.
#[derive(Debug)]
pub struct VolumeResizer<P> {
    provider: P,
    options: WaitOptions,
    cancel: CancelToken,
}

impl<P> VolumeResizer<P>
where
    P: VolumeOps,
{
    /// Creates a resizer with default wait options and no cancellation.
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

    /// Replaces `volume_id` with a `new_size_gb` volume created from a fresh
    /// snapshot, swapping attachments when the source is attached.
    ///
    /// # Errors
    ///
    /// Returns [`ResizeError::InvalidArgument`] when the requested size does
    /// not grow the volume, the rollback variants described on
    /// [`ResizeError`] for the attached branch, and [`ResizeError::Step`] or
    /// [`ResizeError::Wait`] for any other failure.
    pub async fn resize(
        &self,
        volume_id: &str,
        new_size_gb: u32,
    ) -> Result<ResizeReport, ResizeError<P::Error>> {
        let source = self
            .provider
            .describe_volume(volume_id)
            .await
            .map_err(|source_err| step_error("describe source volume", volume_id, source_err))?;

        if new_size_gb <= source.size_gb {
            return Err(ResizeError::InvalidArgument {
                volume_id: volume_id.to_owned(),
                current_gb: source.size_gb,
                requested_gb: new_size_gb,
            });
        }

        let mut audit = AuditTrail::new();

        // Snapshot before anything destructive.
        let snapshot_name = format!("{TEMP_SNAPSHOT_PREFIX}{}", Uuid::new_v4().simple());
        let snapshot = self
            .provider
            .create_snapshot(volume_id, &snapshot_name)
            .await
            .map_err(|source_err| step_error("create snapshot", volume_id, source_err))?;
        audit.record(AuditAction::CreatedSnapshot, &snapshot.id);
        self.wait_for_snapshot(&snapshot.id).await?;

        let attachment = match source.state {
            AttachmentState::Attached => source.attachment.clone(),
            _ => None,
        };

        if let Some(seat) = attachment {
            return self
                .resize_attached(&source, &seat, &snapshot.id, new_size_gb, audit)
                .await;
        }
        self.resize_detached(&source, &snapshot.id, new_size_gb, audit)
            .await
    }

    /// Unattached branch: create, wait, delete the source and snapshot.
    async fn resize_detached(
        &self,
        source: &VolumeDescriptor,
        snapshot_id: &str,
        new_size_gb: u32,
        mut audit: AuditTrail,
    ) -> Result<ResizeReport, ResizeError<P::Error>> {
        let replacement = self
            .create_replacement(snapshot_id, &source.zone, new_size_gb, &mut audit)
            .await?;

        self.provider
            .delete_snapshot(snapshot_id)
            .await
            .map_err(|source_err| step_error("delete snapshot", snapshot_id, source_err))?;
        audit.record(AuditAction::DeletedSnapshot, snapshot_id);

        self.provider
            .delete_volume(&source.id)
            .await
            .map_err(|source_err| step_error("delete source volume", &source.id, source_err))?;
        audit.record(AuditAction::DeletedVolume, &source.id);

        self.finish(&replacement.id, &source.id, audit).await
    }

    /// Attached branch: stop, detach, attach, restart, with rollback at the
    /// detach and attach steps.
    async fn resize_attached(
        &self,
        source: &VolumeDescriptor,
        seat: &VolumeAttachment,
        snapshot_id: &str,
        new_size_gb: u32,
        mut audit: AuditTrail,
    ) -> Result<ResizeReport, ResizeError<P::Error>> {
        let instance = self
            .provider
            .describe_instance(&seat.instance_id)
            .await
            .map_err(|source_err| {
                step_error("describe attached instance", &seat.instance_id, source_err)
            })?;

        let replacement = self
            .create_replacement(snapshot_id, &instance.zone, new_size_gb, &mut audit)
            .await?;

        self.provider
            .stop_instance(&instance.id)
            .await
            .map_err(|source_err| step_error("stop instance", &instance.id, source_err))?;
        self.wait_for_instance_state(&instance.id, "stopped").await?;
        audit.record(AuditAction::StoppedInstance, &instance.id);

        if let Err(detach_err) = self.provider.detach_volume(&source.id).await {
            let notes = self
                .discard_replacement(&instance.id, snapshot_id, &replacement.id)
                .await;
            return Err(ResizeError::DetachFailed {
                volume_id: source.id.clone(),
                instance_id: instance.id.clone(),
                message: with_notes(detach_err.to_string(), &notes),
            });
        }
        audit.record(AuditAction::DetachedVolume, &source.id);

        self.attach_replacement(source, seat, snapshot_id, &replacement.id, &mut audit)
            .await?;

        self.provider
            .start_instance(&instance.id)
            .await
            .map_err(|source_err| step_error("restart instance", &instance.id, source_err))?;
        audit.record(AuditAction::StartedInstance, &instance.id);

        self.provider
            .delete_snapshot(snapshot_id)
            .await
            .map_err(|source_err| step_error("delete snapshot", snapshot_id, source_err))?;
        audit.record(AuditAction::DeletedSnapshot, snapshot_id);

        self.provider
            .delete_volume(&source.id)
            .await
            .map_err(|source_err| step_error("delete source volume", &source.id, source_err))?;
        audit.record(AuditAction::DeletedVolume, &source.id);

        self.finish(&replacement.id, &source.id, audit).await
    }

    /// Attaches the replacement at the vacated device, re-attaching the
    /// original on failure.
    async fn attach_replacement(
        &self,
        source: &VolumeDescriptor,
        seat: &VolumeAttachment,
        snapshot_id: &str,
        replacement_id: &str,
        audit: &mut AuditTrail,
    ) -> Result<(), ResizeError<P::Error>> {
        let Err(attach_err) = self
            .provider
            .attach_volume(replacement_id, &seat.instance_id, &seat.device)
            .await
        else {
            audit.record(AuditAction::AttachedVolume, replacement_id);
            return Ok(());
        };

        match self
            .provider
            .attach_volume(&source.id, &seat.instance_id, &seat.device)
            .await
        {
            Ok(()) => {
                let notes = self
                    .discard_replacement(&seat.instance_id, snapshot_id, replacement_id)
                    .await;
                Err(ResizeError::AttachFailed {
                    volume_id: replacement_id.to_owned(),
                    instance_id: seat.instance_id.clone(),
                    message: with_notes(
                        format!("{attach_err} (original volume re-attached)"),
                        &notes,
                    ),
                })
            }
            Err(reattach_err) => Err(ResizeError::CriticalInconsistency(Box::new(
                StrandedResize {
                    instance_id: seat.instance_id.clone(),
                    device: seat.device.clone(),
                    old_volume_id: source.id.clone(),
                    new_volume_id: replacement_id.to_owned(),
                    snapshot_id: snapshot_id.to_owned(),
                    detail: reattach_err.to_string(),
                },
            ))),
        }
    }

    /// Creates the replacement volume and waits until it is available.
    async fn create_replacement(
        &self,
        snapshot_id: &str,
        zone: &str,
        new_size_gb: u32,
        audit: &mut AuditTrail,
    ) -> Result<VolumeDescriptor, ResizeError<P::Error>> {
        let replacement = self
            .provider
            .create_volume_from_snapshot(snapshot_id, zone, new_size_gb)
            .await
            .map_err(|source_err| step_error("create replacement volume", snapshot_id, source_err))?;
        audit.record(AuditAction::CreatedVolume, &replacement.id);
        self.wait_for_volume_state(&replacement.id, AttachmentState::Available.wire())
            .await?;
        Ok(replacement)
    }

    /// Best-effort rollback: restart the instance and delete the snapshot
    /// and replacement volume, collecting a note for each step that fails.
    async fn discard_replacement(
        &self,
        instance_id: &str,
        snapshot_id: &str,
        replacement_id: &str,
    ) -> Vec<String> {
        let mut notes = Vec::new();
        if let Some(err) = self.provider.start_instance(instance_id).await.err() {
            notes.push(format!("restart of {instance_id} also failed: {err}"));
        }
        if let Some(err) = self.provider.delete_snapshot(snapshot_id).await.err() {
            notes.push(format!("deleting snapshot {snapshot_id} also failed: {err}"));
        }
        if let Some(err) = self.provider.delete_volume(replacement_id).await.err() {
            notes.push(format!(
                "deleting replacement volume {replacement_id} also failed: {err}"
            ));
        }
        notes
    }

    async fn finish(
        &self,
        replacement_id: &str,
        replaced_volume_id: &str,
        audit: AuditTrail,
    ) -> Result<ResizeReport, ResizeError<P::Error>> {
        let volume = self
            .provider
            .describe_volume(replacement_id)
            .await
            .map_err(|source_err| {
                step_error("describe replacement volume", replacement_id, source_err)
            })?;
        Ok(ResizeReport {
            volume,
            replaced_volume_id: replaced_volume_id.to_owned(),
            audit,
        })
    }

    async fn wait_for_snapshot(&self, snapshot_id: &str) -> Result<(), ResizeError<P::Error>> {
        let subject = format!("snapshot {snapshot_id}");
        wait_for_state(
            || {
                let fut = self.provider.describe_snapshot(snapshot_id);
                async move { fut.await.map(|snapshot| snapshot.progress) }
            },
            SNAPSHOT_COMPLETE,
            &subject,
            self.options,
            &self.cancel,
        )
        .await
        .map_err(ResizeError::from)
    }

    async fn wait_for_volume_state(
        &self,
        volume_id: &str,
        target: &str,
    ) -> Result<(), ResizeError<P::Error>> {
        let subject = format!("volume {volume_id}");
        wait_for_state(
            || {
                let fut = self.provider.describe_volume(volume_id);
                async move { fut.await.map(|volume| volume.state.wire().to_owned()) }
            },
            target,
            &subject,
            self.options,
            &self.cancel,
        )
        .await
        .map_err(ResizeError::from)
    }

    async fn wait_for_instance_state(
        &self,
        instance_id: &str,
        target: &str,
    ) -> Result<(), ResizeError<P::Error>> {
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
        .map_err(ResizeError::from)
    }
}

fn step_error<E>(step: &'static str, resource_id: &str, source: E) -> ResizeError<E>
where
    E: std::error::Error + 'static,
{
    ResizeError::Step {
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
