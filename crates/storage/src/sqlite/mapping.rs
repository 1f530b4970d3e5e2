use sqlx::Row;
use tbs_core::model::{CompletedSession, TaskItem};

use crate::repository::{StorageError, StudySessionRow};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn encode_task_item(item: &TaskItem) -> Result<String, StorageError> {
    serde_json::to_string(item).map_err(ser)
}

/// Decoding re-runs task item validation, so a corrupt payload surfaces as an error.
pub(crate) fn decode_task_item(payload: &str) -> Result<TaskItem, StorageError> {
    serde_json::from_str(payload).map_err(ser)
}

pub(crate) fn map_study_session_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<StudySessionRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let label: String = row.try_get("label").map_err(ser)?;
    let area: String = row.try_get("area").map_err(ser)?;
    let score_percent = u32_from_i64(
        "score_percent",
        row.try_get::<i64, _>("score_percent").map_err(ser)?,
    )?;
    let elapsed_minutes = u32_from_i64(
        "elapsed_minutes",
        row.try_get::<i64, _>("elapsed_minutes").map_err(ser)?,
    )?;
    let earned_points = u32_from_i64(
        "earned_points",
        row.try_get::<i64, _>("earned_points").map_err(ser)?,
    )?;
    let total_points = u32_from_i64(
        "total_points",
        row.try_get::<i64, _>("total_points").map_err(ser)?,
    )?;
    let completed_at = row.try_get("completed_at").map_err(ser)?;

    let session = CompletedSession::from_persisted(
        label,
        area,
        score_percent,
        elapsed_minutes,
        earned_points,
        total_points,
        completed_at,
    )
    .map_err(ser)?;
    Ok(StudySessionRow::new(id, session))
}
