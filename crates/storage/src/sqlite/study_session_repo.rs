use tbs_core::model::CompletedSession;

use super::SqliteRepository;
use super::mapping::{conn, map_study_session_row};
use crate::repository::{StorageError, StudyProgressRepository, StudySessionRow};

#[async_trait::async_trait]
impl StudyProgressRepository for SqliteRepository {
    async fn record_completed_session(
        &self,
        session: &CompletedSession,
    ) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO study_sessions (
                    label, area, score_percent, elapsed_minutes,
                    earned_points, total_points, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(session.label())
        .bind(session.area())
        .bind(i64::from(session.score_percent()))
        .bind(i64::from(session.elapsed_minutes()))
        .bind(i64::from(session.earned_points()))
        .bind(i64::from(session.total_points()))
        .bind(session.completed_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<StudySessionRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, label, area, score_percent, elapsed_minutes,
                    earned_points, total_points, completed_at
                FROM study_sessions
                ORDER BY completed_at DESC, id DESC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_study_session_row).collect()
    }
}
