use quiz_core::model::{Topic, TopicId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_topic_row, ser, topic_id_from_i64, topic_id_to_i64, write_err};
use crate::repository::{NewTopicRecord, StorageError, TopicRepository, TopicWithCount};

#[async_trait::async_trait]
impl TopicRepository for SqliteRepository {
    async fn insert_new_topic(&self, topic: NewTopicRecord) -> Result<TopicId, StorageError> {
        let res = sqlx::query("INSERT INTO topics (name) VALUES (?1)")
            .bind(topic.name)
            .execute(&self.pool)
            .await
            .map_err(write_err)?;

        topic_id_from_i64(res.last_insert_rowid())
    }

    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO topics (id, name)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            ",
        )
        .bind(topic_id_to_i64(topic.id())?)
        .bind(topic.name().to_owned())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(())
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        let row = sqlx::query("SELECT id, name FROM topics WHERE id = ?1")
            .bind(topic_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_topic_row).transpose()
    }

    async fn list_topics(&self, limit: u32) -> Result<Vec<Topic>, StorageError> {
        let rows = sqlx::query("SELECT id, name FROM topics ORDER BY id ASC LIMIT ?1")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_topic_row).collect()
    }

    async fn list_topics_with_counts(&self) -> Result<Vec<TopicWithCount>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT t.id, t.name, COUNT(q.id) AS question_count
            FROM topics t
            LEFT JOIN questions q ON q.topic_id = t.id
            GROUP BY t.id, t.name
            ORDER BY t.id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let count: i64 = row.try_get("question_count").map_err(ser)?;
            out.push(TopicWithCount {
                topic: map_topic_row(&row)?,
                question_count: u32::try_from(count)
                    .map_err(|_| StorageError::Serialization("question_count overflow".into()))?,
            });
        }
        Ok(out)
    }

    async fn delete_topic(&self, id: TopicId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM topics WHERE id = ?1")
            .bind(topic_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
