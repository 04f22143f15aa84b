use std::collections::HashMap;

use quiz_core::model::{Question, QuestionId, QuizSession, SessionKey};
use storage::repository::{QuestionRepository, SessionStore};

use crate::error::SessionError;

/// Storage-backed lookups shared by the session workflow.
pub(crate) struct SessionQueries;

impl SessionQueries {
    /// Load a session or fail with `SessionError::NotFound`.
    pub async fn load(
        store: &dyn SessionStore,
        key: SessionKey,
    ) -> Result<QuizSession, SessionError> {
        store
            .get_session(key)
            .await?
            .ok_or(SessionError::NotFound)
    }

    /// Current bank versions of the questions in `ids`, keyed by id.
    pub async fn question_bank(
        questions: &dyn QuestionRepository,
        ids: &[QuestionId],
    ) -> Result<HashMap<QuestionId, Question>, SessionError> {
        let found = questions.get_questions(ids).await?;
        Ok(found.into_iter().map(|q| (q.id(), q)).collect())
    }
}
