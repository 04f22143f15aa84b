use std::collections::HashMap;

use quiz_core::model::{
    Difficulty, Question, QuestionId, QuestionKind, TopicId, ValidatedQuestion,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    QUESTION_COLUMNS, conn, map_question_row, question_id_from_i64, question_id_to_i64, ser,
    topic_id_to_i64, write_err,
};
use crate::repository::{QuestionRepository, StorageError};

fn option_columns(kind: &QuestionKind) -> [Option<String>; 4] {
    match kind.options() {
        Some(options) => options.as_array().clone().map(Some),
        None => [None, None, None, None],
    }
}

fn difficulty_level(difficulty: Option<Difficulty>) -> Option<i64> {
    difficulty.map(|d| i64::from(d.level()))
}

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn insert_new_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        let [a, b, c, d] = option_columns(&question.kind);

        let res = sqlx::query(
            r"
            INSERT INTO questions (
                topic_id, text, question_type, difficulty,
                option_a, option_b, option_c, option_d,
                correct_answer, solution, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(topic_id_to_i64(question.topic_id)?)
        .bind(question.text.clone())
        .bind(question.kind.question_type().as_code())
        .bind(i64::from(question.difficulty.level()))
        .bind(a)
        .bind(b)
        .bind(c)
        .bind(d)
        .bind(question.correct_answer.clone())
        .bind(question.solution.clone())
        .bind(question.created_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        question_id_from_i64(res.last_insert_rowid())
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let [a, b, c, d] = option_columns(question.kind());

        sqlx::query(
            r"
            INSERT INTO questions (
                id, topic_id, text, question_type, difficulty,
                option_a, option_b, option_c, option_d,
                correct_answer, solution, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                -- created_at keeps its original value
                topic_id = excluded.topic_id,
                text = excluded.text,
                question_type = excluded.question_type,
                difficulty = excluded.difficulty,
                option_a = excluded.option_a,
                option_b = excluded.option_b,
                option_c = excluded.option_c,
                option_d = excluded.option_d,
                correct_answer = excluded.correct_answer,
                solution = excluded.solution
            ",
        )
        .bind(question_id_to_i64(question.id())?)
        .bind(topic_id_to_i64(question.topic_id())?)
        .bind(question.text().to_owned())
        .bind(question.question_type().as_code())
        .bind(i64::from(question.difficulty().level()))
        .bind(a)
        .bind(b)
        .bind(c)
        .bind(d)
        .bind(question.correct_answer().to_owned())
        .bind(question.solution().map(ToOwned::to_owned))
        .bind(question.created_at())
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(question_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_question_row).transpose()
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {QUESTION_COLUMNS} FROM questions WHERE id IN ({placeholders})");

        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(question_id_to_i64(*id)?);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(conn)?;

        let mut by_id: HashMap<QuestionId, Question> = HashMap::with_capacity(rows.len());
        for row in rows {
            let question = map_question_row(&row)?;
            by_id.insert(question.id(), question);
        }

        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn list_questions(
        &self,
        topic_id: TopicId,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE topic_id = ?1 ORDER BY id ASC LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(topic_id_to_i64(topic_id)?)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }

    async fn list_practice_questions(
        &self,
        topic_id: TopicId,
        difficulty: Option<Difficulty>,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let sql = format!(
            r"
            SELECT {QUESTION_COLUMNS}
            FROM questions
            WHERE topic_id = ?1
              AND (?2 IS NULL OR difficulty = ?2)
            ORDER BY difficulty ASC, created_at ASC, id ASC
            LIMIT ?3 OFFSET ?4
            "
        );
        let rows = sqlx::query(&sql)
            .bind(topic_id_to_i64(topic_id)?)
            .bind(difficulty_level(difficulty))
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }

    async fn count_questions(
        &self,
        topic_id: TopicId,
        difficulty: Option<Difficulty>,
    ) -> Result<u32, StorageError> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS n
            FROM questions
            WHERE topic_id = ?1
              AND (?2 IS NULL OR difficulty = ?2)
            ",
        )
        .bind(topic_id_to_i64(topic_id)?)
        .bind(difficulty_level(difficulty))
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        let n: i64 = row.try_get("n").map_err(ser)?;
        u32::try_from(n).map_err(|_| StorageError::Serialization("count overflow".into()))
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM questions WHERE id = ?1")
            .bind(question_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
