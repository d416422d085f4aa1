//! Behavioural scenarios for the volume resize workflow.

mod resize;
