use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::model::settings::ResubmitPolicy;
use crate::model::{Question, QuestionId, ResultsReport, Topic, TopicId};
use crate::scoring;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizSessionError {
    #[error("topic {topic_id} has no questions")]
    EmptyTopic { topic_id: TopicId },

    #[error("quiz session already submitted")]
    AlreadySubmitted,

    #[error("question limit must be > 0")]
    InvalidQuestionLimit,

    #[error("position {position} is outside a {total}-question session")]
    InvalidPosition { position: usize, total: usize },

    #[error("quiz session has no questions")]
    EmptySequence,

    #[error("session belongs to topic {expected}, not {actual}")]
    TopicMismatch { expected: TopicId, actual: TopicId },
}

//
// ─── STATUS / DIRECTION ────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    InProgress,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// Lifecycle payload. Submission swaps the answer map for the report.
#[derive(Debug, Clone, PartialEq)]
enum SessionState {
    InProgress { answers: HashMap<QuestionId, String> },
    Submitted { report: ResultsReport },
}

/// Outcome of [`QuizSession::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// First submission: answers were scored.
    Scored {
        report: ResultsReport,
        missing: Vec<QuestionId>,
    },
    /// Repeated submission: the stored report, untouched.
    Replayed(ResultsReport),
}

impl Submission {
    #[must_use]
    pub fn report(&self) -> &ResultsReport {
        match self {
            Self::Scored { report, .. } | Self::Replayed(report) => report,
        }
    }

    #[must_use]
    pub fn into_report(self) -> ResultsReport {
        match self {
            Self::Scored { report, .. } | Self::Replayed(report) => report,
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One student's quiz attempt on a topic.
///
/// The question sequence is fixed when the session starts. All state lives in
/// this value; callers load it from and write it back to a session store.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSession {
    topic_id: TopicId,
    topic_name: String,
    question_ids: Vec<QuestionId>,
    position: usize,
    state: SessionState,
    started_at: DateTime<Utc>,
}

impl QuizSession {
    /// Start a session over the first `max_questions` of `questions`, in the
    /// order given.
    ///
    /// The topic's name is captured so the session can still be scored if the
    /// topic disappears later.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::EmptyTopic` if `questions` is empty and
    /// `QuizSessionError::InvalidQuestionLimit` if `max_questions` is zero.
    pub fn start(
        topic: &Topic,
        questions: &[Question],
        max_questions: usize,
        started_at: DateTime<Utc>,
    ) -> Result<Self, QuizSessionError> {
        let topic_id = topic.id();
        if max_questions == 0 {
            return Err(QuizSessionError::InvalidQuestionLimit);
        }
        if questions.is_empty() {
            return Err(QuizSessionError::EmptyTopic { topic_id });
        }

        let question_ids = questions
            .iter()
            .take(max_questions)
            .map(Question::id)
            .collect();

        Ok(Self {
            topic_id,
            topic_name: topic.name().to_owned(),
            question_ids,
            position: 0,
            state: SessionState::InProgress {
                answers: HashMap::new(),
            },
            started_at,
        })
    }

    /// Rehydrate a session from the session store.
    ///
    /// `answers` is ignored when `report` is present.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::EmptySequence` or
    /// `QuizSessionError::InvalidPosition` for inconsistent stored data.
    pub fn from_persisted(
        topic_id: TopicId,
        topic_name: String,
        question_ids: Vec<QuestionId>,
        position: usize,
        answers: HashMap<QuestionId, String>,
        report: Option<ResultsReport>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, QuizSessionError> {
        if question_ids.is_empty() {
            return Err(QuizSessionError::EmptySequence);
        }
        if position >= question_ids.len() {
            return Err(QuizSessionError::InvalidPosition {
                position,
                total: question_ids.len(),
            });
        }

        let state = match report {
            Some(report) => SessionState::Submitted { report },
            None => SessionState::InProgress { answers },
        };

        Ok(Self {
            topic_id,
            topic_name,
            question_ids,
            position,
            state,
            started_at,
        })
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    /// Topic name as of session start.
    #[must_use]
    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    #[must_use]
    pub fn question_ids(&self) -> &[QuestionId] {
        &self.question_ids
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.question_ids.len()
    }

    /// Zero-based index of the active question.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn current_question_id(&self) -> QuestionId {
        self.question_ids[self.position]
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.position == 0
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.position + 1 >= self.question_ids.len()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self.state {
            SessionState::InProgress { .. } => SessionStatus::InProgress,
            SessionState::Submitted { .. } => SessionStatus::Submitted,
        }
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.status() == SessionStatus::Submitted
    }

    /// Recorded answers; `None` once submitted.
    #[must_use]
    pub fn answers(&self) -> Option<&HashMap<QuestionId, String>> {
        match &self.state {
            SessionState::InProgress { answers } => Some(answers),
            SessionState::Submitted { .. } => None,
        }
    }

    #[must_use]
    pub fn answer_for(&self, id: QuestionId) -> Option<&str> {
        self.answers()?.get(&id).map(String::as_str)
    }

    #[must_use]
    pub fn current_answer(&self) -> Option<&str> {
        self.answer_for(self.current_question_id())
    }

    /// Number of questions with a recorded answer (including empty ones).
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers().map_or(0, HashMap::len)
    }

    #[must_use]
    pub fn report(&self) -> Option<&ResultsReport> {
        match &self.state {
            SessionState::Submitted { report } => Some(report),
            SessionState::InProgress { .. } => None,
        }
    }

    fn answers_mut(&mut self) -> Result<&mut HashMap<QuestionId, String>, QuizSessionError> {
        match &mut self.state {
            SessionState::InProgress { answers } => Ok(answers),
            SessionState::Submitted { .. } => Err(QuizSessionError::AlreadySubmitted),
        }
    }

    /// Store `text`, trimmed, as the answer to the current question.
    ///
    /// Overwrites a previous answer. An empty string is stored as-is.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::AlreadySubmitted` after submission.
    pub fn record_answer(&mut self, text: &str) -> Result<(), QuizSessionError> {
        let id = self.current_question_id();
        self.answers_mut()?.insert(id, text.trim().to_owned());
        Ok(())
    }

    /// Move one question forward or back, staying put at either end.
    ///
    /// Returns whether the position changed.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::AlreadySubmitted` after submission.
    pub fn navigate(&mut self, direction: Direction) -> Result<bool, QuizSessionError> {
        if self.is_submitted() {
            return Err(QuizSessionError::AlreadySubmitted);
        }
        let moved = match direction {
            Direction::Next if !self.is_last() => {
                self.position += 1;
                true
            }
            Direction::Prev if self.position > 0 => {
                self.position -= 1;
                true
            }
            Direction::Next | Direction::Prev => false,
        };
        Ok(moved)
    }

    /// Jump to `index`, clamped to the last question.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::AlreadySubmitted` after submission.
    pub fn go_to(&mut self, index: usize) -> Result<usize, QuizSessionError> {
        if self.is_submitted() {
            return Err(QuizSessionError::AlreadySubmitted);
        }
        self.position = index.min(self.question_ids.len() - 1);
        Ok(self.position)
    }

    /// Score the recorded answers and close the session.
    ///
    /// `topic` is the current state of the session's topic, or `None` if it
    /// has been deleted; the report then uses the name captured at start.
    /// `questions` should hold the bank's current version of every question in
    /// the sequence; absent ones are scored as incorrect. A second call returns
    /// the stored report under `ResubmitPolicy::Replay` without rescoring.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::AlreadySubmitted` on a second call under
    /// `ResubmitPolicy::Reject`, or `QuizSessionError::TopicMismatch` if
    /// `topic` is not this session's topic.
    pub fn submit(
        &mut self,
        topic: Option<&Topic>,
        questions: &HashMap<QuestionId, Question>,
        submitted_at: DateTime<Utc>,
        policy: ResubmitPolicy,
    ) -> Result<Submission, QuizSessionError> {
        let answers = match &self.state {
            SessionState::Submitted { report } => {
                return match policy {
                    ResubmitPolicy::Replay => Ok(Submission::Replayed(report.clone())),
                    ResubmitPolicy::Reject => Err(QuizSessionError::AlreadySubmitted),
                };
            }
            SessionState::InProgress { answers } => answers,
        };
        let topic_name = match topic {
            Some(topic) if topic.id() != self.topic_id => {
                return Err(QuizSessionError::TopicMismatch {
                    expected: self.topic_id,
                    actual: topic.id(),
                });
            }
            Some(topic) => topic.name(),
            None => self.topic_name.as_str(),
        };

        let scored = scoring::score(
            self.topic_id,
            topic_name,
            &self.question_ids,
            answers,
            questions,
            submitted_at,
        );
        self.state = SessionState::Submitted {
            report: scored.report.clone(),
        };

        Ok(Submission::Scored {
            report: scored.report,
            missing: scored.missing,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
