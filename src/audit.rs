//! Audit trail recorded by workflows.
//!
//! The workflows mutate shared cloud state step by step; instead of logging
//! to a global sink they append each provider mutation to an ordered trail
//! that is returned to the caller inside the workflow report.

use std::fmt;

/// A provider mutation performed by a workflow.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuditAction {
    /// An instance was asked to stop and reached `stopped`.
    StoppedInstance,
    /// An instance was asked to start.
    StartedInstance,
    /// An instance was terminated.
    TerminatedInstance,
    /// A replacement instance was launched.
    LaunchedInstance,
    /// A machine image was created.
    CreatedImage,
    /// A machine image (and its backing snapshot) was deleted.
    DeletedImage,
    /// A snapshot was created.
    CreatedSnapshot,
    /// A snapshot was deleted.
    DeletedSnapshot,
    /// A volume was created.
    CreatedVolume,
    /// A volume was deleted.
    DeletedVolume,
    /// A volume was attached to an instance.
    AttachedVolume,
    /// A volume was detached from its instance.
    DetachedVolume,
    /// A security group was created.
    CreatedSecurityGroup,
    /// A security group was deleted.
    DeletedSecurityGroup,
    /// A key pair was created.
    CreatedKeyPair,
    /// A key pair was deleted.
    DeletedKeyPair,
    /// A resource's tag set was replaced.
    ReplacedTags,
}

impl AuditAction {
    /// Short machine-friendly name of the action.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StoppedInstance => "stopped-instance",
            Self::StartedInstance => "started-instance",
            Self::TerminatedInstance => "terminated-instance",
            Self::LaunchedInstance => "launched-instance",
            Self::CreatedImage => "created-image",
            Self::DeletedImage => "deleted-image",
            Self::CreatedSnapshot => "created-snapshot",
            Self::DeletedSnapshot => "deleted-snapshot",
            Self::CreatedVolume => "created-volume",
            Self::DeletedVolume => "deleted-volume",
            Self::AttachedVolume => "attached-volume",
            Self::DetachedVolume => "detached-volume",
            Self::CreatedSecurityGroup => "created-security-group",
            Self::DeletedSecurityGroup => "deleted-security-group",
            Self::CreatedKeyPair => "created-key-pair",
            Self::DeletedKeyPair => "deleted-key-pair",
            Self::ReplacedTags => "replaced-tags",
        }
    }
}

/// One recorded mutation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuditEntry {
    /// What happened.
    pub action: AuditAction,
    /// The resource it happened to.
    pub resource_id: String,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action.name(), self.resource_id)
    }
}

/// Ordered record of the mutations a workflow performed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    /// Creates an empty trail.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends an entry.
    pub fn record(&mut self, action: AuditAction, resource_id: impl Into<String>) {
        self.entries.push(AuditEntry {
            action,
            resource_id: resource_id.into(),
        });
    }

    /// Entries in the order they were performed.
    #[must_use]
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Returns true when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when an entry with the given action was recorded for the
    /// given resource.
    #[must_use]
    pub fn contains(&self, action: AuditAction, resource_id: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.action == action && entry.resource_id == resource_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trail_preserves_order_and_lookup() {
        let mut trail = AuditTrail::new();
        trail.record(AuditAction::CreatedSnapshot, "snap-1");
        trail.record(AuditAction::DeletedSnapshot, "snap-1");
        assert_eq!(trail.len(), 2);
        assert!(trail.contains(AuditAction::CreatedSnapshot, "snap-1"));
        assert!(!trail.contains(AuditAction::DeletedVolume, "vol-1"));
        let rendered: Vec<String> = trail.entries().iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["created-snapshot snap-1", "deleted-snapshot snap-1"]);
    }
}
