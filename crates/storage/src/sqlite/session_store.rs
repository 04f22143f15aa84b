use chrono::Utc;
use quiz_core::model::{QuizSession, SessionKey};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, ser, topic_id_from_i64, topic_id_to_i64};
use crate::repository::{QuizSessionRecord, SessionStore, StorageError};

#[async_trait::async_trait]
impl SessionStore for SqliteRepository {
    async fn get_session(&self, key: SessionKey) -> Result<Option<QuizSession>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT topic_id, topic_name, question_ids, position, answers, report, started_at
            FROM quiz_sessions
            WHERE session_key = ?1
            ",
        )
        .bind(key.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => session_record_from_row(&row)?
                .into_session()
                .map(Some)
                .map_err(ser),
            None => Ok(None),
        }
    }

    async fn put_session(
        &self,
        key: SessionKey,
        session: &QuizSession,
    ) -> Result<(), StorageError> {
        let record = QuizSessionRecord::from_session(session);
        let report = record
            .report
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(ser)?;

        let result = sqlx::query(
            r"
            INSERT INTO quiz_sessions (
                session_key, topic_id, topic_name, question_ids, position, answers,
                report, started_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(session_key) DO UPDATE SET
                topic_id = excluded.topic_id,
                topic_name = excluded.topic_name,
                question_ids = excluded.question_ids,
                position = excluded.position,
                answers = excluded.answers,
                report = excluded.report,
                started_at = excluded.started_at,
                updated_at = excluded.updated_at
            WHERE quiz_sessions.report IS NULL
            ",
        )
        .bind(key.to_string())
        .bind(topic_id_to_i64(record.topic_id)?)
        .bind(&record.topic_name)
        .bind(serde_json::to_string(&record.question_ids).map_err(ser)?)
        .bind(i64::from(record.position))
        .bind(serde_json::to_string(&record.answers).map_err(ser)?)
        .bind(report)
        .bind(record.started_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn delete_session(&self, key: SessionKey) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM quiz_sessions WHERE session_key = ?1")
            .bind(key.to_string())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}

fn session_record_from_row(row: &SqliteRow) -> Result<QuizSessionRecord, StorageError> {
    let question_ids: String = row.try_get("question_ids").map_err(ser)?;
    let answers: String = row.try_get("answers").map_err(ser)?;
    let report: Option<String> = row.try_get("report").map_err(ser)?;
    let position: i64 = row.try_get("position").map_err(ser)?;

    Ok(QuizSessionRecord {
        topic_id: topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?,
        topic_name: row.try_get("topic_name").map_err(ser)?,
        question_ids: serde_json::from_str(&question_ids).map_err(ser)?,
        position: u32::try_from(position)
            .map_err(|_| StorageError::Serialization(format!("invalid position: {position}")))?,
        answers: serde_json::from_str(&answers).map_err(ser)?,
        report: report
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(ser)?,
        started_at: row.try_get("started_at").map_err(ser)?,
    })
}
