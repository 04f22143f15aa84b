use quiz_core::model::{Difficulty, Question, QuestionId, QuestionType, Topic, TopicId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Maps constraint violations on writes to the repository vocabulary.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    if let Some(db) = e.as_database_error() {
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
    }
    conn(e)
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn topic_id_from_i64(v: i64) -> Result<TopicId, StorageError> {
    Ok(TopicId::new(i64_to_u64("topic_id", v)?))
}

pub(crate) fn question_id_from_i64(v: i64) -> Result<QuestionId, StorageError> {
    Ok(QuestionId::new(i64_to_u64("question_id", v)?))
}

pub(crate) fn topic_id_to_i64(id: TopicId) -> Result<i64, StorageError> {
    u64_to_i64("topic_id", id.value())
}

pub(crate) fn question_id_to_i64(id: QuestionId) -> Result<i64, StorageError> {
    u64_to_i64("question_id", id.value())
}

pub(crate) fn difficulty_from_i64(v: i64) -> Result<Difficulty, StorageError> {
    let level = u8::try_from(v)
        .map_err(|_| StorageError::Serialization(format!("invalid difficulty: {v}")))?;
    Difficulty::from_level(level).map_err(ser)
}

pub(crate) fn map_topic_row(row: &SqliteRow) -> Result<Topic, StorageError> {
    Topic::new(
        topic_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("name").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let code: String = row.try_get("question_type").map_err(ser)?;
    let question_type = QuestionType::from_code(&code).map_err(ser)?;

    let options = match question_type {
        QuestionType::Mcq => Some([
            option_column(row, "option_a")?,
            option_column(row, "option_b")?,
            option_column(row, "option_c")?,
            option_column(row, "option_d")?,
        ]),
        QuestionType::TrueFalse | QuestionType::Numeric => None,
    };

    Question::from_persisted(
        question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        topic_id_from_i64(row.try_get::<i64, _>("topic_id").map_err(ser)?)?,
        row.try_get::<String, _>("text").map_err(ser)?,
        question_type,
        difficulty_from_i64(row.try_get::<i64, _>("difficulty").map_err(ser)?)?,
        options,
        row.try_get::<String, _>("correct_answer").map_err(ser)?,
        row.try_get::<Option<String>, _>("solution").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

fn option_column(row: &SqliteRow, column: &str) -> Result<String, StorageError> {
    Ok(row
        .try_get::<Option<String>, _>(column)
        .map_err(ser)?
        .unwrap_or_default())
}

/// Column list shared by every question query.
pub(crate) const QUESTION_COLUMNS: &str = "id, topic_id, text, question_type, difficulty, \
     option_a, option_b, option_c, option_d, correct_answer, solution, created_at";
