use chrono::{DateTime, Utc};
use std::sync::Arc;

use storage::repository::{StudyProgressRepository, StudySessionRow};

use crate::error::SessionError;

/// Storage identifier for a recorded study session.
///
/// NOTE: This is currently `i64` to match `SQLite` row IDs.
pub type StudySessionId = i64;

/// Presentation-agnostic list item for a completed session.
///
/// No pre-formatted strings: callers format timestamps and durations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyHistoryItem {
    pub id: StudySessionId,
    pub label: String,
    pub area: String,
    pub score_percent: u32,
    pub elapsed_minutes: u32,
    pub earned_points: u32,
    pub total_points: u32,
    pub completed_at: DateTime<Utc>,
}

impl StudyHistoryItem {
    #[must_use]
    pub fn from_row(row: &StudySessionRow) -> Self {
        let session = &row.session;
        Self {
            id: row.id,
            label: session.label().to_owned(),
            area: session.area().to_owned(),
            score_percent: session.score_percent(),
            elapsed_minutes: session.elapsed_minutes(),
            earned_points: session.earned_points(),
            total_points: session.total_points(),
            completed_at: session.completed_at(),
        }
    }
}

/// Read-side facade over the study history.
#[derive(Clone)]
pub struct StudyHistoryService {
    progress: Arc<dyn StudyProgressRepository>,
}

impl StudyHistoryService {
    #[must_use]
    pub fn new(progress: Arc<dyn StudyProgressRepository>) -> Self {
        Self { progress }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(storage::repository::InMemoryRepository::new()))
    }

    /// Most recently completed sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<StudyHistoryItem>, SessionError> {
        let rows = self.progress.list_recent(limit).await?;
        Ok(rows.iter().map(StudyHistoryItem::from_row).collect())
    }
}
