//! Scoring of finished quiz attempts.
//!
//! Correctness is decided per question type by an [`AnswerRule`]. There is no
//! partial credit: every question is worth exactly one point.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::model::{Question, QuestionId, QuestionType, ResultEntry, ResultsReport, TopicId};

//
// ─── ANSWER RULES ──────────────────────────────────────────────────────────────
//

/// How a student's answer is compared with the stored correct answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerRule {
    /// Trimmed, ASCII case-insensitive equality.
    CaseInsensitive,
    /// Trimmed, byte-for-byte equality.
    ///
    /// Numeric answers use this, so `42` does not match `42.0`. Known
    /// limitation, pinned by tests.
    ExactText,
}

impl AnswerRule {
    #[must_use]
    pub fn for_type(question_type: QuestionType) -> Self {
        match question_type {
            QuestionType::Mcq | QuestionType::TrueFalse => Self::CaseInsensitive,
            QuestionType::Numeric => Self::ExactText,
        }
    }

    /// Empty or missing answers never match.
    #[must_use]
    pub fn matches(self, expected: &str, given: Option<&str>) -> bool {
        let Some(given) = given.map(str::trim).filter(|g| !g.is_empty()) else {
            return false;
        };
        let expected = expected.trim();
        if expected.is_empty() {
            return false;
        }
        match self {
            Self::CaseInsensitive => given.eq_ignore_ascii_case(expected),
            Self::ExactText => given == expected,
        }
    }
}

/// Whether `given` is a correct answer to `question`.
#[must_use]
pub fn is_correct(question: &Question, given: Option<&str>) -> bool {
    AnswerRule::for_type(question.question_type()).matches(question.correct_answer(), given)
}

/// `score / total * 100`, rounded to one decimal; `0.0` for an empty attempt.
#[must_use]
pub fn percentage(score: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = f64::from(score) / f64::from(total) * 100.0;
    (raw * 10.0).round() / 10.0
}

//
// ─── SCORING PASS ──────────────────────────────────────────────────────────────
//

/// Report plus the question ids that could not be found while scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredReport {
    pub report: ResultsReport,
    pub missing: Vec<QuestionId>,
}

/// Scores an attempt in the order of `question_ids`.
///
/// Questions absent from `questions` are scored as incorrect and reported in
/// `ScoredReport::missing`; the pass itself never fails.
#[must_use]
pub fn score(
    topic_id: TopicId,
    topic_name: &str,
    question_ids: &[QuestionId],
    answers: &HashMap<QuestionId, String>,
    questions: &HashMap<QuestionId, Question>,
    submitted_at: DateTime<Utc>,
) -> ScoredReport {
    let mut entries = Vec::with_capacity(question_ids.len());
    let mut missing = Vec::new();
    let mut correct = 0_u32;

    for id in question_ids {
        let user_answer = answers.get(id).cloned();
        let entry = match questions.get(id) {
            Some(question) => {
                let is_correct = is_correct(question, user_answer.as_deref());
                ResultEntry {
                    question_id: *id,
                    question_text: question.text().to_owned(),
                    question_type: Some(question.question_type()),
                    options: question.options().cloned(),
                    user_answer,
                    correct_answer: question.correct_answer().to_owned(),
                    correct_answer_display: question.correct_answer_display(),
                    solution: question.solution().map(str::to_owned),
                    is_correct,
                }
            }
            None => {
                missing.push(*id);
                ResultEntry {
                    question_id: *id,
                    question_text: String::new(),
                    question_type: None,
                    options: None,
                    user_answer,
                    correct_answer: String::new(),
                    correct_answer_display: String::new(),
                    solution: None,
                    is_correct: false,
                }
            }
        };
        if entry.is_correct {
            correct = correct.saturating_add(1);
        }
        entries.push(entry);
    }

    let total = u32::try_from(entries.len()).unwrap_or(u32::MAX);
    let report = ResultsReport::new(
        topic_id,
        topic_name.to_owned(),
        total,
        correct,
        percentage(correct, total),
        submitted_at,
        entries,
    );

    ScoredReport { report, missing }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
