//! Historized copies of nodes and assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CountingCircleAssignment, Node};

/// Half-open validity interval `[valid_from, valid_to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    /// First instant at which the row is valid.
    pub valid_from: DateTime<Utc>,
    /// First instant at which the row is no longer valid, `None` while current.
    pub valid_to: Option<DateTime<Utc>>,
}

impl Validity {
    /// Creates an open-ended interval starting at `valid_from`.
    pub fn starting(valid_from: DateTime<Utc>) -> Self {
        Self {
            valid_from,
            valid_to: None,
        }
    }

    /// Returns `true` if the interval contains the instant.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && self.valid_to.is_none_or(|to| at < to)
    }

    /// Returns `true` while the interval is open.
    pub fn is_current(&self) -> bool {
        self.valid_to.is_none()
    }
}

/// A node as it was during its validity interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    /// The historized node.
    pub node: Node,
    /// When this version was valid.
    pub validity: Validity,
    /// Whether this version marks the node as deleted.
    pub deleted: bool,
}

impl SnapshotNode {
    /// Returns `true` if this version is visible at `at`.
    pub fn is_visible_at(&self, at: DateTime<Utc>, include_deleted: bool) -> bool {
        self.validity.contains(at) && (include_deleted || !self.deleted)
    }
}

/// An assignment as it was during its validity interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotAssignment {
    /// The historized assignment.
    pub assignment: CountingCircleAssignment,
    /// When this version was valid.
    pub validity: Validity,
    /// Whether this version marks the link as deleted.
    pub deleted: bool,
}

impl SnapshotAssignment {
    /// Returns `true` if this version is visible at `at`.
    pub fn is_visible_at(&self, at: DateTime<Utc>, include_deleted: bool) -> bool {
        self.validity.contains(at) && (include_deleted || !self.deleted)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_validity_is_half_open() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let validity = Validity {
            valid_from: from,
            valid_to: Some(to),
        };

        assert!(validity.contains(from));
        assert!(!validity.contains(to));
        assert!(!validity.contains(from - chrono::Duration::seconds(1)));
        assert!(!validity.is_current());
        assert!(Validity::starting(from).contains(to));
    }
}
