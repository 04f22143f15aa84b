use quiz_core::model::{Question, QuizSession};

/// What the request layer needs to render the active question.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub question: Question,
    /// 0-based position in the session's sequence.
    pub position: usize,
    pub total: usize,
    pub answer: Option<String>,
    pub answered: usize,
    pub is_first: bool,
    pub is_last: bool,
}

impl QuestionView {
    pub(crate) fn new(session: &QuizSession, question: Question) -> Self {
        Self {
            question,
            position: session.position(),
            total: session.total_questions(),
            answer: session.current_answer().map(ToOwned::to_owned),
            answered: session.answered_count(),
            is_first: session.is_first(),
            is_last: session.is_last(),
        }
    }

    /// 1-based question number for display.
    #[must_use]
    pub fn number(&self) -> usize {
        self.position + 1
    }
}
