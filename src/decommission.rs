//! Instance decommissioning.
//!
//! Terminates an instance and cleans up the security group and key pair
//! that were generated for it at provision time. Only a security group
//! named after the instance's `name` tag and referenced by no other
//! instance is deleted; the key pair named by the instance's key reference
//! is always deleted.
//!
//! Confirmation is policy, not mechanism: the caller passes an [`Approval`]
//! it obtained however it sees fit, and the workflow never prompts.

use thiserror::Error;

use crate::audit::{AuditAction, AuditTrail};
use crate::provider::{AccountOps, InstanceState, TagFilter};
use crate::wait::{CancelToken, WaitError, WaitOptions, wait_for_state};

/// Caller-provided confirmation for a destructive operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Approval {
    /// The caller confirmed the operation.
    Granted,
    /// The caller did not confirm; the workflow refuses to run.
    Withheld,
}

/// Errors raised by [`Decommissioner::decommission`].
#[derive(Debug, Error)]
pub enum DecommissionError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the caller withheld approval.
    #[error("decommission of {instance_id} requires confirmed approval")]
    ApprovalWithheld {
        /// Instance the decommission was requested for.
        instance_id: String,
    },
    /// Raised when the instance has no `name` tag to clean up by.
    #[error("instance {instance_id} has no name tag")]
    MissingNameTag {
        /// Instance the decommission was requested for.
        instance_id: String,
    },
    /// A poll failed, timed out, or was cancelled.
    #[error(transparent)]
    Wait(#[from] WaitError<E>),
    /// A provider call failed; the workflow aborts at that step.
    #[error("decommission step '{step}' failed for {resource_id}: {source}")]
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

/// Outcome of a successful decommission.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DecommissionReport {
    /// Instance that was terminated.
    pub instance_id: String,
    /// Security groups deleted because they were named after the instance
    /// and referenced by no other instance.
    pub deleted_security_group_ids: Vec<String>,
    /// Key pair that was deleted, when one was found.
    pub deleted_key_pair: Option<String>,
    /// Mutations performed, in order.
    pub audit: AuditTrail,
}

/// Executes the decommission workflow against a provider.
#[derive(Debug)]
pub struct Decommissioner<P> {
    provider: P,
    options: WaitOptions,
    cancel: CancelToken,
}

impl<P> Decommissioner<P>
where
    P: AccountOps,
{
    /// Creates a decommissioner with the given wait options.
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

    /// Terminates `instance_id` and deletes its exclusive security groups
    /// and key pair.
    ///
    /// # Errors
    ///
    /// Returns [`DecommissionError::ApprovalWithheld`] without approval,
    /// [`DecommissionError::MissingNameTag`] when the instance carries no
    /// `name` tag, and [`DecommissionError::Step`] or
    /// [`DecommissionError::Wait`] for provider failures.
    pub async fn decommission(
        &self,
        instance_id: &str,
        approval: Approval,
    ) -> Result<DecommissionReport, DecommissionError<P::Error>> {
        if approval == Approval::Withheld {
            return Err(DecommissionError::ApprovalWithheld {
                instance_id: instance_id.to_owned(),
            });
        }

        let instance = self
            .provider
            .describe_instance(instance_id)
            .await
            .map_err(|source_err| step_error("describe instance", instance_id, source_err))?;
        let name = instance
            .tags
            .get("name")
            .map(ToOwned::to_owned)
            .ok_or_else(|| DecommissionError::MissingNameTag {
                instance_id: instance_id.to_owned(),
            })?;

        let exclusive_groups = self.exclusive_groups(instance_id, &name).await?;

        let mut audit = AuditTrail::new();

        self.provider
            .terminate_instance(instance_id)
            .await
            .map_err(|source_err| step_error("terminate instance", instance_id, source_err))?;
        self.wait_for_terminated(instance_id).await?;
        audit.record(AuditAction::TerminatedInstance, instance_id);

        let mut deleted_security_group_ids = Vec::new();
        for group_id in exclusive_groups {
            self.provider
                .delete_security_group(&group_id)
                .await
                .map_err(|source_err| {
                    step_error("delete security group", &group_id, source_err)
                })?;
            audit.record(AuditAction::DeletedSecurityGroup, &group_id);
            deleted_security_group_ids.push(group_id);
        }

        let mut deleted_key_pair = None;
        if !instance.key_name.is_empty() {
            self.provider
                .delete_key_pair(&instance.key_name)
                .await
                .map_err(|source_err| {
                    step_error("delete key pair", &instance.key_name, source_err)
                })?;
            audit.record(AuditAction::DeletedKeyPair, &instance.key_name);
            deleted_key_pair = Some(instance.key_name.clone());
        }

        Ok(DecommissionReport {
            instance_id: instance_id.to_owned(),
            deleted_security_group_ids,
            deleted_key_pair,
            audit,
        })
    }

    /// Security groups named after the instance and referenced only by it.
    async fn exclusive_groups(
        &self,
        instance_id: &str,
        name: &str,
    ) -> Result<Vec<String>, DecommissionError<P::Error>> {
        let groups = self
            .provider
            .list_security_groups()
            .await
            .map_err(|source_err| step_error("list security groups", name, source_err))?;
        let estate = self
            .provider
            .list_instances(&TagFilter::new())
            .await
            .map_err(|source_err| step_error("list instances", name, source_err))?;

        let ids = groups
            .iter()
            .filter(|group| group.name == name)
            .filter(|group| {
                estate
                    .iter()
                    .filter(|other| other.security_group_ids.contains(&group.id))
                    .all(|other| other.id == instance_id)
            })
            .map(|group| group.id.clone())
            .collect();
        Ok(ids)
    }

    async fn wait_for_terminated(
        &self,
        instance_id: &str,
    ) -> Result<(), DecommissionError<P::Error>> {
        let subject = format!("instance {instance_id}");
        wait_for_state(
            || {
                let fut = self.provider.describe_instance(instance_id);
                async move { fut.await.map(|instance| instance.state.wire().to_owned()) }
            },
            InstanceState::Terminated.wire(),
            &subject,
            self.options,
            &self.cancel,
        )
        .await
        .map_err(DecommissionError::from)
    }
}

fn step_error<E>(step: &'static str, resource_id: &str, source: E) -> DecommissionError<E>
where
    E: std::error::Error + 'static,
{
    DecommissionError::Step {
        step,
        resource_id: resource_id.to_owned(),
        source,
    }
}
