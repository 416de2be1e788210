//! Logbook store: identifier allocation, per-property append
//! serialisation, and the read API.

use chrono::Utc;
use common::FieldError;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use utoipa::ToSchema;

use crate::documents::{DocumentRecord, DocumentType};
use crate::logbook::{
    LogbookError, SubmissionLogbook, SubmissionStatus, SubmissionVersion, VersionAction,
    VersionHeader,
};
use crate::submission::{
    missing_documents, validate_submission, AgentSubmission, SubmissionSnapshot,
};

/// Attempts at drawing an unused identifier before giving up.
const ID_ALLOCATION_ATTEMPTS: u32 = 8;

/// Errors from submission intake.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("submission failed field validation")]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Logbook(#[from] LogbookError),
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedSubmission {
    pub property_id: String,
    pub submission_id: String,
    pub status: SubmissionStatus,
}

/// Draw `PROP-`/`SUB-` identifier material from the OS entropy source.
fn hex_id(prefix: &str) -> String {
    let mut bytes = [0u8; 6];
    OsRng.fill_bytes(&mut bytes);
    format!("{prefix}{}", hex::encode(bytes))
}

/// In-memory map of logbooks, many readers / single writer.
///
/// The write lock serialises appends, so version numbers within one
/// property are strictly sequential.
#[derive(Debug, Default)]
pub struct LogbookStore {
    logbooks: RwLock<HashMap<String, SubmissionLogbook>>,
}

impl LogbookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted logbooks.
    pub fn restore(logbooks: Vec<SubmissionLogbook>) -> Self {
        let map = logbooks
            .into_iter()
            .map(|logbook| (logbook.property_id.clone(), logbook))
            .collect();
        Self {
            logbooks: RwLock::new(map),
        }
    }

    /// Create a logbook for a validated submission.
    ///
    /// Version 1 is `initial_submission`; the status is SUBMITTED when all
    /// mandatory fields and documents are present, INCOMPLETE when
    /// documents are missing. Field validation failures reject outright.
    pub fn create(
        &self,
        submission: AgentSubmission,
        documents: Vec<DocumentRecord>,
        action_by: &str,
    ) -> Result<CreatedSubmission, SubmissionError> {
        validate_submission(&submission).map_err(SubmissionError::Validation)?;

        let missing = missing_documents(&submission, &documents);
        let status = if missing.is_empty() {
            SubmissionStatus::Submitted
        } else {
            tracing::info!(?missing, "submission incomplete: mandatory documents absent");
            SubmissionStatus::Incomplete
        };

        let mut logbooks = self.logbooks.write().expect("logbook map lock poisoned");
        let property_id = Self::allocate_id(&logbooks)?;
        let submission_id = hex_id("SUB-");

        let snapshot = SubmissionSnapshot {
            submission_id: submission_id.clone(),
            submission,
            documents,
        };
        let logbook = SubmissionLogbook::open(
            property_id.clone(),
            snapshot,
            status,
            action_by,
            Utc::now(),
        );
        logbooks.insert(property_id.clone(), logbook);
        tracing::info!(%property_id, %submission_id, %status, "logbook created");
        Ok(CreatedSubmission {
            property_id,
            submission_id,
            status,
        })
    }

    fn allocate_id(
        logbooks: &HashMap<String, SubmissionLogbook>,
    ) -> Result<String, LogbookError> {
        for _ in 0..ID_ALLOCATION_ATTEMPTS {
            let candidate = hex_id("PROP-");
            if !logbooks.contains_key(&candidate) {
                return Ok(candidate);
            }
            tracing::warn!(%candidate, "property id collision; retrying");
        }
        Err(LogbookError::IdentifierExhausted)
    }

    /// Attach a document, appending `document_added` or
    /// `document_replaced` depending on whether the type already had one.
    ///
    /// When the addition completes an INCOMPLETE submission it is promoted
    /// to SUBMITTED in the same version.
    pub fn attach_document(
        &self,
        property_id: &str,
        record: DocumentRecord,
        action_by: &str,
    ) -> Result<SubmissionVersion, LogbookError> {
        let mut logbooks = self.logbooks.write().expect("logbook map lock poisoned");
        let logbook = logbooks
            .get_mut(property_id)
            .ok_or_else(|| LogbookError::UnknownProperty(property_id.to_string()))?;

        let mut snapshot = logbook.latest().submission_snapshot.clone();
        let replacing = snapshot
            .documents
            .iter()
            .position(|d| d.document_type == record.document_type);
        let action = match replacing {
            Some(index) => {
                snapshot.documents.remove(index);
                VersionAction::DocumentReplaced
            }
            None => VersionAction::DocumentAdded,
        };
        snapshot.documents.push(record);

        let status = if logbook.current_status == SubmissionStatus::Incomplete
            && missing_documents(&snapshot.submission, &snapshot.documents).is_empty()
        {
            SubmissionStatus::Submitted
        } else {
            logbook.current_status
        };

        logbook
            .append(action, action_by, snapshot, status, Utc::now())
            .map(|version| version.clone())
    }

    /// Update submission fields, appending `field_updated`.
    pub fn update_fields(
        &self,
        property_id: &str,
        action_by: &str,
        apply: impl FnOnce(&mut AgentSubmission),
    ) -> Result<SubmissionVersion, LogbookError> {
        let mut logbooks = self.logbooks.write().expect("logbook map lock poisoned");
        let logbook = logbooks
            .get_mut(property_id)
            .ok_or_else(|| LogbookError::UnknownProperty(property_id.to_string()))?;

        let mut snapshot = logbook.latest().submission_snapshot.clone();
        apply(&mut snapshot.submission);
        let status = logbook.current_status;
        logbook
            .append(VersionAction::FieldUpdated, action_by, snapshot, status, Utc::now())
            .map(|version| version.clone())
    }

    /// Move a submission to a new status, appending the given action.
    pub fn change_status(
        &self,
        property_id: &str,
        status: SubmissionStatus,
        action: VersionAction,
        action_by: &str,
    ) -> Result<SubmissionVersion, LogbookError> {
        let mut logbooks = self.logbooks.write().expect("logbook map lock poisoned");
        let logbook = logbooks
            .get_mut(property_id)
            .ok_or_else(|| LogbookError::UnknownProperty(property_id.to_string()))?;

        let snapshot = logbook.latest().submission_snapshot.clone();
        logbook
            .append(action, action_by, snapshot, status, Utc::now())
            .map(|version| version.clone())
    }

    // Read API.

    /// Full current submission snapshot (latest version).
    pub fn current_snapshot(&self, property_id: &str) -> Result<SubmissionSnapshot, LogbookError> {
        let logbooks = self.logbooks.read().expect("logbook map lock poisoned");
        logbooks
            .get(property_id)
            .map(|logbook| logbook.latest().submission_snapshot.clone())
            .ok_or_else(|| LogbookError::UnknownProperty(property_id.to_string()))
    }

    /// Ordered version headers.
    pub fn history(&self, property_id: &str) -> Result<Vec<VersionHeader>, LogbookError> {
        let logbooks = self.logbooks.read().expect("logbook map lock poisoned");
        logbooks
            .get(property_id)
            .map(|logbook| logbook.history())
            .ok_or_else(|| LogbookError::UnknownProperty(property_id.to_string()))
    }

    /// Immutable snapshot of version `n`.
    pub fn version(
        &self,
        property_id: &str,
        n: u32,
    ) -> Result<SubmissionVersion, LogbookError> {
        let logbooks = self.logbooks.read().expect("logbook map lock poisoned");
        let logbook = logbooks
            .get(property_id)
            .ok_or_else(|| LogbookError::UnknownProperty(property_id.to_string()))?;
        logbook.version(n).cloned()
    }

    /// Whole logbook, cloned.
    pub fn logbook(&self, property_id: &str) -> Result<SubmissionLogbook, LogbookError> {
        let logbooks = self.logbooks.read().expect("logbook map lock poisoned");
        logbooks
            .get(property_id)
            .cloned()
            .ok_or_else(|| LogbookError::UnknownProperty(property_id.to_string()))
    }

    /// Every logbook, ordered by property id for deterministic output.
    pub fn all(&self) -> Vec<SubmissionLogbook> {
        let logbooks = self.logbooks.read().expect("logbook map lock poisoned");
        let mut all: Vec<SubmissionLogbook> = logbooks.values().cloned().collect();
        all.sort_by(|a, b| a.property_id.cmp(&b.property_id));
        all
    }

    pub fn len(&self) -> usize {
        self.logbooks.read().expect("logbook map lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The missing mandatory documents for a property's current snapshot.
    pub fn outstanding_documents(
        &self,
        property_id: &str,
    ) -> Result<Vec<DocumentType>, LogbookError> {
        let snapshot = self.current_snapshot(property_id)?;
        Ok(missing_documents(&snapshot.submission, &snapshot.documents))
    }
}
