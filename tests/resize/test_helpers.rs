//! Shared fixtures for resize BDD scenarios.

use std::time::Duration;

use rstest::fixture;
use skylift::resize::{ResizeError, ResizeReport};
use skylift::test_support::{ScriptedProvider, attached_volume_fixture, instance_fixture};
use skylift::wait::WaitOptions;

/// Identifier of the seeded source volume.
pub const SOURCE_VOLUME: &str = "vol-src";
/// Identifier of the seeded instance.
pub const INSTANCE: &str = "i-1";
/// Device the source volume is attached at.
pub const DEVICE: &str = "/dev/sdb";
/// Identifier the scripted provider allocates for the replacement volume
/// (the snapshot takes the first serial, the volume the second).
pub const REPLACEMENT_VOLUME: &str = "vol-2";

#[derive(Clone, Debug)]
pub struct ResizeContext {
    pub provider: ScriptedProvider,
    pub outcome: Option<ResizeOutcome>,
}

#[derive(Clone, Debug)]
pub enum ResizeOutcome {
    Success(ResizeReport),
    Failure { kind: String, message: String },
}

pub fn fast_options() -> WaitOptions {
    WaitOptions::new(Duration::from_millis(1), Duration::from_millis(200))
}

/// Names the rollback branch an error belongs to.
pub fn failure_kind<E>(err: &ResizeError<E>) -> String
where
    E: std::error::Error + 'static,
{
    match err {
        ResizeError::InvalidArgument { .. } => "invalid-argument",
        ResizeError::Wait(_) => "wait",
        ResizeError::Step { .. } => "step",
        ResizeError::DetachFailed { .. } => "detach-failed",
        ResizeError::AttachFailed { .. } => "attach-failed",
        ResizeError::CriticalInconsistency(_) => "critical-inconsistency",
    }
    .to_owned()
}

#[fixture]
pub fn resize_context() -> ResizeContext {
    let provider = ScriptedProvider::new();
    provider.insert_instance(instance_fixture(INSTANCE, "web-1", None));
    provider.insert_volume(attached_volume_fixture(SOURCE_VOLUME, 5, INSTANCE, DEVICE));
    ResizeContext {
        provider,
        outcome: None,
    }
}
