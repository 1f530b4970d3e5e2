//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use tbs_core::model::{RequirementId, RequirementKind, TaskItemId};

/// Errors emitted by simulation sessions.
///
/// Data absence (an empty item pool) is not an error; it is reported through
/// `SessionPhase::Unavailable`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session has already been loaded")]
    AlreadyLoaded,
    #[error("session is not in progress")]
    NotInProgress,
    #[error("no requirement {requirement} in task item {item}")]
    UnknownRequirement {
        item: TaskItemId,
        requirement: RequirementId,
    },
    #[error("requirement {requirement} expects a {expected} answer, got {actual}")]
    AnswerKindMismatch {
        requirement: RequirementId,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("no async runtime available to drive the countdown")]
    NoRuntime,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    pub(crate) fn kind_mismatch(
        requirement: RequirementId,
        expected: RequirementKind,
        actual: RequirementKind,
    ) -> Self {
        Self::AnswerKindMismatch {
            requirement,
            expected: expected.as_str(),
            actual: actual.as_str(),
        }
    }
}
