use chrono::Utc;
use sqlx::Row;
use tbs_core::model::TaskItem;

use super::SqliteRepository;
use super::mapping::{conn, decode_task_item, encode_task_item, ser};
use crate::repository::{QuestionBank, StorageError};

#[async_trait::async_trait]
impl QuestionBank for SqliteRepository {
    async fn task_items_for_area(&self, area: &str) -> Result<Vec<TaskItem>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT payload
                FROM task_items
                WHERE area = ?1
                ORDER BY position ASC
            ",
        )
        .bind(area)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| {
                let payload: String = row.try_get("payload").map_err(ser)?;
                decode_task_item(&payload)
            })
            .collect()
    }

    async fn upsert_task_item(&self, area: &str, item: &TaskItem) -> Result<(), StorageError> {
        let payload = encode_task_item(item)?;

        // New items go to the end of the area; updates keep their position.
        sqlx::query(
            r"
                INSERT INTO task_items (area, id, position, payload, updated_at)
                VALUES (
                    ?1,
                    ?2,
                    (SELECT COALESCE(MAX(position), -1) + 1 FROM task_items WHERE area = ?1),
                    ?3,
                    ?4
                )
                ON CONFLICT(area, id) DO UPDATE SET
                    payload = excluded.payload,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(area)
        .bind(item.id().as_str())
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn list_areas(&self) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT DISTINCT area
                FROM task_items
                ORDER BY area ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("area").map_err(ser))
            .collect()
    }
}
