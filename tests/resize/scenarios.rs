//! BDD scenarios for the volume resize workflow.

use rstest_bdd_macros::scenario;

use super::test_helpers::{ResizeContext, resize_context};

#[scenario(
    path = "tests/features/resize.feature",
    name = "Replace an attached volume with a larger copy"
)]
fn scenario_replace_attached(resize_context: ResizeContext) {
    let _ = resize_context;
}

#[scenario(
    path = "tests/features/resize.feature",
    name = "Roll back when the old volume cannot be detached"
)]
fn scenario_detach_rollback(resize_context: ResizeContext) {
    let _ = resize_context;
}

#[scenario(
    path = "tests/features/resize.feature",
    name = "Restore the original volume when the replacement cannot be attached"
)]
fn scenario_attach_restore(resize_context: ResizeContext) {
    let _ = resize_context;
}

#[scenario(
    path = "tests/features/resize.feature",
    name = "Retain every resource when re-attaching the original also fails"
)]
fn scenario_double_failure_forensics(resize_context: ResizeContext) {
    let _ = resize_context;
}

#[scenario(
    path = "tests/features/resize.feature",
    name = "Reject a size that does not grow the volume"
)]
fn scenario_reject_shrink(resize_context: ResizeContext) {
    let _ = resize_context;
}
