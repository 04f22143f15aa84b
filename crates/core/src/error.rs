use thiserror::Error;

use crate::model::{QuestionError, QuizSessionError, SettingsError, TopicError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Session(#[from] QuizSessionError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}
