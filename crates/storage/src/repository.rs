use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tbs_core::model::{CompletedSession, TaskItem};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A persisted completed session with its storage row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudySessionRow {
    pub id: i64,
    pub session: CompletedSession,
}

impl StudySessionRow {
    #[must_use]
    pub fn new(id: i64, session: CompletedSession) -> Self {
        Self { id, session }
    }
}

/// Read access to task items grouped by subject area.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Fetch every task item stored for an area, in insertion order.
    ///
    /// Unknown areas yield an empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read or a stored item is invalid.
    async fn task_items_for_area(&self, area: &str) -> Result<Vec<TaskItem>, StorageError>;

    /// Insert or replace a task item within an area.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the item cannot be stored.
    async fn upsert_task_item(&self, area: &str, item: &TaskItem) -> Result<(), StorageError>;

    /// List areas that contain at least one task item.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    async fn list_areas(&self) -> Result<Vec<String>, StorageError>;
}

/// Study history sink for completed sessions.
#[async_trait]
pub trait StudyProgressRepository: Send + Sync {
    /// Append a completed session and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn record_completed_session(
        &self,
        session: &CompletedSession,
    ) -> Result<i64, StorageError>;

    /// Most recently completed sessions first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    async fn list_recent(&self, limit: u32) -> Result<Vec<StudySessionRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    items: Arc<Mutex<BTreeMap<String, Vec<TaskItem>>>>,
    sessions: Arc<Mutex<Vec<StudySessionRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuestionBank for InMemoryRepository {
    async fn task_items_for_area(&self, area: &str) -> Result<Vec<TaskItem>, StorageError> {
        let guard = self
            .items
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(area).cloned().unwrap_or_default())
    }

    async fn upsert_task_item(&self, area: &str, item: &TaskItem) -> Result<(), StorageError> {
        let mut guard = self
            .items
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let bucket = guard.entry(area.to_owned()).or_default();
        match bucket.iter_mut().find(|existing| existing.id() == item.id()) {
            Some(existing) => *existing = item.clone(),
            None => bucket.push(item.clone()),
        }
        Ok(())
    }

    async fn list_areas(&self) -> Result<Vec<String>, StorageError> {
        let guard = self
            .items
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(area, _)| area.clone())
            .collect())
    }
}

#[async_trait]
impl StudyProgressRepository for InMemoryRepository {
    async fn record_completed_session(
        &self,
        session: &CompletedSession,
    ) -> Result<i64, StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = i64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("session id overflow".into()))?
            + 1;
        guard.push(StudySessionRow::new(id, session.clone()));
        Ok(id)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<StudySessionRow>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut rows: Vec<StudySessionRow> = guard.clone();
        rows.sort_by(|a, b| {
            b.session
                .completed_at()
                .cmp(&a.session.completed_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

/// Aggregates the collaborator repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub question_bank: Arc<dyn QuestionBank>,
    pub progress: Arc<dyn StudyProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let question_bank: Arc<dyn QuestionBank> = Arc::new(repo.clone());
        let progress: Arc<dyn StudyProgressRepository> = Arc::new(repo);
        Self {
            question_bank,
            progress,
        }
    }
}
