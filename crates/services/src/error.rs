//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{QuestionId, QuizSessionError, TopicId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `QuizSessionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("topic {topic_id} has no questions")]
    EmptyTopic { topic_id: TopicId },
    #[error("session already submitted")]
    AlreadySubmitted,
    #[error("session not found")]
    NotFound,
    #[error("topic {0} not found")]
    TopicNotFound(TopicId),
    #[error("question {0} not found")]
    QuestionNotFound(QuestionId),
    #[error(transparent)]
    Session(QuizSessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<QuizSessionError> for SessionError {
    fn from(err: QuizSessionError) -> Self {
        match err {
            QuizSessionError::EmptyTopic { topic_id } => Self::EmptyTopic { topic_id },
            QuizSessionError::AlreadySubmitted => Self::AlreadySubmitted,
            other => Self::Session(other),
        }
    }
}

/// Errors emitted by `PracticeService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("topic {0} not found")]
    TopicNotFound(TopicId),
    #[error("question {0} not found")]
    QuestionNotFound(QuestionId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error(transparent)]
    Invalid(#[from] quiz_core::Error),
    #[error("a topic with this name already exists")]
    DuplicateTopic,
    #[error("topic {0} not found")]
    TopicNotFound(TopicId),
    #[error("question {0} not found")]
    QuestionNotFound(QuestionId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
