//! The append-only, versioned submission logbook.
//!
//! A logbook is born at version 1 and thereafter only grows. No version is
//! ever rewritten or deleted; `current_status` always equals the status of
//! the latest version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::submission::SubmissionSnapshot;

/// Lifecycle status of a submitted property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Draft,
    Incomplete,
    Submitted,
    UnderReview,
    Unevaluated,
    Evaluated,
    Approved,
    Rejected,
    Archived,
    Withdrawn,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::Archived | Self::Withdrawn
        )
    }

    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        if *self == next {
            return true;
        }
        // Any non-terminal status may be withdrawn.
        if next == Self::Withdrawn {
            return !self.is_terminal();
        }
        matches!(
            (*self, next),
            (Self::Draft, Self::Incomplete)
                | (Self::Incomplete, Self::Submitted)
                | (Self::Submitted, Self::UnderReview)
                | (Self::UnderReview, Self::Evaluated)
                | (Self::UnderReview, Self::Unevaluated)
                | (Self::Unevaluated, Self::UnderReview)
                | (Self::Unevaluated, Self::Archived)
                | (Self::Evaluated, Self::Approved)
                | (Self::Evaluated, Self::Rejected)
                | (Self::Evaluated, Self::Archived)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Incomplete => "INCOMPLETE",
            Self::Submitted => "SUBMITTED",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Unevaluated => "UNEVALUATED",
            Self::Evaluated => "EVALUATED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Archived => "ARCHIVED",
            Self::Withdrawn => "WITHDRAWN",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What produced a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VersionAction {
    InitialSubmission,
    DocumentAdded,
    DocumentReplaced,
    FieldUpdated,
    StatusChanged,
    AxisReview,
    Resubmission,
}

/// Errors from logbook operations.
#[derive(Debug, Error)]
pub enum LogbookError {
    #[error("illegal status transition from {from} to {to}")]
    IllegalStatusTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    #[error("unknown property: {0}")]
    UnknownProperty(String),

    #[error("version {version} not found for {property_id}")]
    VersionNotFound { property_id: String, version: u32 },

    #[error("could not allocate a unique identifier")]
    IdentifierExhausted,
}

impl LogbookError {
    /// Stable code for the API layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::IllegalStatusTransition { .. } => "ILLEGAL_STATUS_TRANSITION",
            Self::UnknownProperty(_) => "UNKNOWN_PROPERTY",
            Self::VersionNotFound { .. } => "VERSION_NOT_FOUND",
            Self::IdentifierExhausted => "IDENTIFIER_EXHAUSTED",
        }
    }
}

/// One immutable version of a submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmissionVersion {
    pub version_id: Uuid,
    /// 1-based, strictly increasing by one per append.
    pub version_number: u32,
    pub timestamp: DateTime<Utc>,
    pub action: VersionAction,
    pub action_by: String,
    /// Deep copy of the submission at this version; shares no state with
    /// the live record.
    pub submission_snapshot: SubmissionSnapshot,
    pub status_at_version: SubmissionStatus,
}

/// Version metadata without the snapshot payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VersionHeader {
    pub version_number: u32,
    pub timestamp: DateTime<Utc>,
    pub action: VersionAction,
    pub action_by: String,
    pub status_at_version: SubmissionStatus,
}

/// Append-only version log for one submitted property.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmissionLogbook {
    /// `PROP-` + 12 lowercase hex characters.
    pub property_id: String,
    pub created_at: DateTime<Utc>,
    pub current_status: SubmissionStatus,
    /// Ordered, non-empty version sequence.
    pub versions: Vec<SubmissionVersion>,
}

impl SubmissionLogbook {
    /// Open a logbook at version 1.
    pub fn open(
        property_id: String,
        snapshot: SubmissionSnapshot,
        status: SubmissionStatus,
        action_by: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            property_id,
            created_at: at,
            current_status: status,
            versions: vec![SubmissionVersion {
                version_id: Uuid::new_v4(),
                version_number: 1,
                timestamp: at,
                action: VersionAction::InitialSubmission,
                action_by: action_by.to_string(),
                submission_snapshot: snapshot,
                status_at_version: status,
            }],
        }
    }

    pub fn latest(&self) -> &SubmissionVersion {
        self.versions.last().expect("logbook is never empty")
    }

    /// Version `n` (1-based).
    pub fn version(&self, n: u32) -> Result<&SubmissionVersion, LogbookError> {
        self.versions
            .iter()
            .find(|v| v.version_number == n)
            .ok_or_else(|| LogbookError::VersionNotFound {
                property_id: self.property_id.clone(),
                version: n,
            })
    }

    pub fn history(&self) -> Vec<VersionHeader> {
        self.versions
            .iter()
            .map(|v| VersionHeader {
                version_number: v.version_number,
                timestamp: v.timestamp,
                action: v.action,
                action_by: v.action_by.clone(),
                status_at_version: v.status_at_version,
            })
            .collect()
    }

    /// Append a new version.
    ///
    /// The status transition is checked first; on failure nothing is
    /// recorded. Timestamps are clamped monotonic so a version never
    /// predates its predecessor.
    pub fn append(
        &mut self,
        action: VersionAction,
        action_by: &str,
        snapshot: SubmissionSnapshot,
        status: SubmissionStatus,
        at: DateTime<Utc>,
    ) -> Result<&SubmissionVersion, LogbookError> {
        if !self.current_status.can_transition_to(status) {
            return Err(LogbookError::IllegalStatusTransition {
                from: self.current_status,
                to: status,
            });
        }
        let timestamp = at.max(self.latest().timestamp);
        let version_number = self.latest().version_number + 1;
        self.versions.push(SubmissionVersion {
            version_id: Uuid::new_v4(),
            version_number,
            timestamp,
            action,
            action_by: action_by.to_string(),
            submission_snapshot: snapshot,
            status_at_version: status,
        });
        self.current_status = status;
        tracing::info!(
            property_id = %self.property_id,
            version = version_number,
            status = %status,
            "logbook version appended"
        );
        Ok(self.latest())
    }
}
