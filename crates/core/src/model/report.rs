use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{QuestionId, TopicId};
use crate::model::question::{McqOptions, QuestionType};

/// Shown in place of an answer the student never gave.
pub const NO_ANSWER: &str = "No answer";

/// Scored outcome of one question in a finished attempt.
///
/// `question_type` is `None` when the question had been removed from the bank
/// before scoring; such entries are always incorrect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub question_id: QuestionId,
    pub question_text: String,
    pub question_type: Option<QuestionType>,
    /// Only set for multiple-choice questions.
    pub options: Option<McqOptions>,
    pub user_answer: Option<String>,
    pub correct_answer: String,
    pub correct_answer_display: String,
    pub solution: Option<String>,
    pub is_correct: bool,
}

impl ResultEntry {
    /// Student's answer, or [`NO_ANSWER`] when none was recorded.
    #[must_use]
    pub fn user_answer_display(&self) -> &str {
        self.user_answer.as_deref().unwrap_or(NO_ANSWER)
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.question_type.is_none()
    }
}

/// Immutable snapshot of a finished attempt.
///
/// Built once by [`crate::scoring::score`] and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsReport {
    topic_id: TopicId,
    topic_name: String,
    total: u32,
    score: u32,
    percentage: f64,
    submitted_at: DateTime<Utc>,
    entries: Vec<ResultEntry>,
}

impl ResultsReport {
    pub(crate) fn new(
        topic_id: TopicId,
        topic_name: String,
        total: u32,
        score: u32,
        percentage: f64,
        submitted_at: DateTime<Utc>,
        entries: Vec<ResultEntry>,
    ) -> Self {
        Self {
            topic_id,
            topic_name,
            total,
            score,
            percentage,
            submitted_at,
            entries,
        }
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    /// Number of questions in the attempt.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Count of correct answers.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Score as a percentage rounded to one decimal.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Entries in the attempt's question order.
    #[must_use]
    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }
}
