//! BDD step definitions for the volume resize workflow.

use rstest_bdd_macros::{given, then, when};
use skylift::provider::{AttachmentState, InstanceState};
use skylift::resize::VolumeResizer;
use tokio::runtime::Runtime;

use super::test_helpers::{
    DEVICE, INSTANCE, REPLACEMENT_VOLUME, ResizeContext, ResizeOutcome, SOURCE_VOLUME,
    failure_kind, fast_options,
};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a volume attached to a running instance")]
fn attached_volume(resize_context: ResizeContext) -> ResizeContext {
    resize_context
}

#[given("detaching the old volume fails")]
fn detach_fails(resize_context: ResizeContext) -> ResizeContext {
    resize_context.provider.fail_detach();
    resize_context
}

#[given("attaching the replacement fails")]
fn attach_replacement_fails(resize_context: ResizeContext) -> ResizeContext {
    resize_context.provider.fail_attach_of(REPLACEMENT_VOLUME);
    resize_context
}

#[given("re-attaching the original also fails")]
fn reattach_fails(resize_context: ResizeContext) -> ResizeContext {
    resize_context.provider.fail_attach_of(SOURCE_VOLUME);
    resize_context
}

#[when("I resize the volume to \"{size}\" GiB")]
fn resize(resize_context: ResizeContext, size: u32) -> Result<ResizeContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let ResizeContext { provider, .. } = resize_context;
    let workflow = VolumeResizer::new(provider.clone(), fast_options());
    let result = runtime.block_on(async { workflow.resize(SOURCE_VOLUME, size).await });
    let outcome = match result {
        Ok(report) => ResizeOutcome::Success(report),
        Err(err) => ResizeOutcome::Failure {
            kind: failure_kind(&err),
            message: err.to_string(),
        },
    };
    Ok(ResizeContext {
        provider,
        outcome: Some(outcome),
    })
}

#[then("the resize succeeds with size \"{size}\"")]
fn resize_succeeds(resize_context: &ResizeContext, size: u32) -> Result<(), StepError> {
    match &resize_context.outcome {
        Some(ResizeOutcome::Success(report)) if report.volume.size_gb == size => Ok(()),
        Some(ResizeOutcome::Success(report)) => Err(StepError::Assertion(format!(
            "expected size {size}, got {}",
            report.volume.size_gb
        ))),
        Some(ResizeOutcome::Failure { message, .. }) => Err(StepError::Assertion(format!(
            "resize failed unexpectedly: {message}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the resize fails with \"{kind}\"")]
fn resize_fails(resize_context: &ResizeContext, kind: String) -> Result<(), StepError> {
    match &resize_context.outcome {
        Some(ResizeOutcome::Failure { kind: actual, .. }) if *actual == kind => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {kind} failure, got {other:?}"
        ))),
    }
}

#[then("the original volume is attached to the instance")]
fn original_attached(resize_context: &ResizeContext) -> Result<(), StepError> {
    let volume = resize_context
        .provider
        .volume(SOURCE_VOLUME)
        .ok_or_else(|| StepError::Assertion(String::from("original volume missing")))?;
    if volume.state != AttachmentState::Attached {
        return Err(StepError::Assertion(format!(
            "original volume is {:?}",
            volume.state
        )));
    }
    let attachment = volume
        .attachment
        .ok_or_else(|| StepError::Assertion(String::from("original volume not attached")))?;
    if attachment.instance_id == INSTANCE && attachment.device == DEVICE {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "unexpected attachment: {attachment:?}"
        )))
    }
}

#[then("only the original volume remains")]
fn only_original_remains(resize_context: &ResizeContext) -> Result<(), StepError> {
    let volumes = resize_context.provider.volume_ids();
    if volumes == [SOURCE_VOLUME.to_owned()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "unexpected volumes: {volumes:?}"
        )))
    }
}

#[then("the snapshot is gone")]
fn snapshot_gone(resize_context: &ResizeContext) -> Result<(), StepError> {
    let snapshots = resize_context.provider.snapshot_ids();
    if snapshots.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "snapshots still present: {snapshots:?}"
        )))
    }
}

#[then("the old volume, the replacement, and the snapshot still exist")]
fn everything_retained(resize_context: &ResizeContext) -> Result<(), StepError> {
    let mut volumes = resize_context.provider.volume_ids();
    volumes.sort();
    if volumes != [REPLACEMENT_VOLUME.to_owned(), SOURCE_VOLUME.to_owned()] {
        return Err(StepError::Assertion(format!(
            "unexpected volumes: {volumes:?}"
        )));
    }
    if resize_context.provider.snapshot_ids().is_empty() {
        return Err(StepError::Assertion(String::from(
            "snapshot was deleted in the unrecoverable branch",
        )));
    }
    Ok(())
}

#[then("the instance is \"{state}\"")]
fn instance_state(resize_context: &ResizeContext, state: String) -> Result<(), StepError> {
    let instance = resize_context
        .provider
        .instance(INSTANCE)
        .ok_or_else(|| StepError::Assertion(String::from("instance missing")))?;
    let expected = InstanceState::from_wire(&state);
    if instance.state == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected instance {state}, got {:?}",
            instance.state
        )))
    }
}
