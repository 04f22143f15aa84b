use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{QuestionId, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("correct answer cannot be empty")]
    EmptyCorrectAnswer,

    #[error("multiple-choice questions need all four options")]
    MissingOptions,

    #[error("option {0} cannot be empty")]
    EmptyOption(OptionLabel),

    #[error("multiple-choice answer must be one of A, B, C or D, got {0:?}")]
    InvalidMcqAnswer(String),

    #[error("true/false answer must be True or False, got {0:?}")]
    InvalidTrueFalseAnswer(String),

    #[error("numeric answer must be a number, got {0:?}")]
    InvalidNumericAnswer(String),

    #[error("unknown question type code: {0}")]
    UnknownType(String),

    #[error("invalid difficulty level: {0}")]
    InvalidDifficulty(u8),
}

//
// ─── QUESTION TYPE ─────────────────────────────────────────────────────────────
//

/// Declared answer format of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    Mcq,
    TrueFalse,
    Numeric,
}

impl QuestionType {
    pub const ALL: [QuestionType; 3] = [Self::Mcq, Self::TrueFalse, Self::Numeric];

    /// Short code used in storage.
    #[must_use]
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Mcq => "MCQ",
            Self::TrueFalse => "TF",
            Self::Numeric => "NUM",
        }
    }

    /// Parses a storage code.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::UnknownType` for anything but `MCQ`, `TF` or `NUM`.
    pub fn from_code(code: &str) -> Result<Self, QuestionError> {
        match code {
            "MCQ" => Ok(Self::Mcq),
            "TF" => Ok(Self::TrueFalse),
            "NUM" => Ok(Self::Numeric),
            other => Err(QuestionError::UnknownType(other.to_owned())),
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Mcq => "Multiple Choice",
            Self::TrueFalse => "True/False",
            Self::Numeric => "Numeric",
        }
    }
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Medium, Self::Hard];

    /// Converts the 1-3 level used by authors and storage.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidDifficulty` outside 1..=3.
    pub fn from_level(level: u8) -> Result<Self, QuestionError> {
        match level {
            1 => Ok(Self::Easy),
            2 => Ok(Self::Medium),
            3 => Ok(Self::Hard),
            other => Err(QuestionError::InvalidDifficulty(other)),
        }
    }

    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::Easy => 1,
            Self::Medium => 2,
            Self::Hard => 3,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }
}

//
// ─── MCQ OPTIONS ───────────────────────────────────────────────────────────────
//

/// Label of one of the four multiple-choice options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    pub const ALL: [OptionLabel; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// Parses `a`..`d` in either case, ignoring surrounding whitespace.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            "D" => Some(Self::D),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four option texts of a multiple-choice question, all non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqOptions([String; 4]);

impl McqOptions {
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyOption` naming the first blank option.
    pub fn new(options: [String; 4]) -> Result<Self, QuestionError> {
        let options = options.map(|o| o.trim().to_owned());
        for label in OptionLabel::ALL {
            if options[label.index()].is_empty() {
                return Err(QuestionError::EmptyOption(label));
            }
        }
        Ok(Self(options))
    }

    #[must_use]
    pub fn get(&self, label: OptionLabel) -> &str {
        &self.0[label.index()]
    }

    /// Options paired with their labels, A first.
    pub fn labelled(&self) -> impl Iterator<Item = (OptionLabel, &str)> {
        OptionLabel::ALL
            .into_iter()
            .map(move |label| (label, self.get(label)))
    }

    #[must_use]
    pub fn as_array(&self) -> &[String; 4] {
        &self.0
    }
}

//
// ─── QUESTION KIND ─────────────────────────────────────────────────────────────
//

/// Question type together with the data only that type carries.
///
/// Only `Mcq` has options; the other kinds cannot hold any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionKind {
    Mcq { options: McqOptions },
    TrueFalse,
    Numeric,
}

impl QuestionKind {
    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::Mcq { .. } => QuestionType::Mcq,
            Self::TrueFalse => QuestionType::TrueFalse,
            Self::Numeric => QuestionType::Numeric,
        }
    }

    #[must_use]
    pub fn options(&self) -> Option<&McqOptions> {
        match self {
            Self::Mcq { options } => Some(options),
            Self::TrueFalse | Self::Numeric => None,
        }
    }
}

//
// ─── DRAFT / VALIDATED / QUESTION ──────────────────────────────────────────────
//

/// Unvalidated question as entered by an author.
///
/// `options` is ignored for non-MCQ types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub topic_id: TopicId,
    pub text: String,
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    pub options: Option<[String; 4]>,
    pub correct_answer: String,
    pub solution: Option<String>,
}

impl QuestionDraft {
    /// Validates and normalizes the draft.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when text, options or the correct answer do not
    /// fit the declared question type.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedQuestion, QuestionError> {
        let text = self.text.trim().to_owned();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let raw_answer = self.correct_answer.trim();
        if raw_answer.is_empty() {
            return Err(QuestionError::EmptyCorrectAnswer);
        }

        let (kind, correct_answer) = match self.question_type {
            QuestionType::Mcq => {
                let options = McqOptions::new(self.options.ok_or(QuestionError::MissingOptions)?)?;
                let label = OptionLabel::parse(raw_answer)
                    .ok_or_else(|| QuestionError::InvalidMcqAnswer(raw_answer.to_owned()))?;
                (QuestionKind::Mcq { options }, label.as_str().to_owned())
            }
            QuestionType::TrueFalse => {
                let answer = if raw_answer.eq_ignore_ascii_case("true") {
                    "True"
                } else if raw_answer.eq_ignore_ascii_case("false") {
                    "False"
                } else {
                    return Err(QuestionError::InvalidTrueFalseAnswer(raw_answer.to_owned()));
                };
                (QuestionKind::TrueFalse, answer.to_owned())
            }
            QuestionType::Numeric => {
                let parsed = raw_answer.parse::<f64>().ok().filter(|v| v.is_finite());
                if parsed.is_none() {
                    return Err(QuestionError::InvalidNumericAnswer(raw_answer.to_owned()));
                }
                // Kept verbatim: scoring compares text, not values.
                (QuestionKind::Numeric, raw_answer.to_owned())
            }
        };

        let solution = self
            .solution
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());

        Ok(ValidatedQuestion {
            topic_id: self.topic_id,
            text,
            kind,
            difficulty: self.difficulty,
            correct_answer,
            solution,
            created_at: now,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    pub topic_id: TopicId,
    pub text: String,
    pub kind: QuestionKind,
    pub difficulty: Difficulty,
    pub correct_answer: String,
    pub solution: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ValidatedQuestion {
    #[must_use]
    pub fn assign_id(self, id: QuestionId) -> Question {
        Question {
            id,
            topic_id: self.topic_id,
            text: self.text,
            kind: self.kind,
            difficulty: self.difficulty,
            correct_answer: self.correct_answer,
            solution: self.solution,
            created_at: self.created_at,
        }
    }
}

/// A scoreable question from the question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    topic_id: TopicId,
    text: String,
    kind: QuestionKind,
    difficulty: Difficulty,
    correct_answer: String,
    solution: Option<String>,
    created_at: DateTime<Utc>,
}

impl Question {
    /// Rehydrate a question from persisted columns, re-running validation.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the stored data violates question invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: QuestionId,
        topic_id: TopicId,
        text: String,
        question_type: QuestionType,
        difficulty: Difficulty,
        options: Option<[String; 4]>,
        correct_answer: String,
        solution: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, QuestionError> {
        let draft = QuestionDraft {
            topic_id,
            text,
            question_type,
            difficulty,
            options,
            correct_answer,
            solution,
        };
        Ok(draft.validate(created_at)?.assign_id(id))
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        self.kind.question_type()
    }

    #[must_use]
    pub fn options(&self) -> Option<&McqOptions> {
        self.kind.options()
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn solution(&self) -> Option<&str> {
        self.solution.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Human-readable correct answer, e.g. `B: 25%` for multiple choice.
    #[must_use]
    pub fn correct_answer_display(&self) -> String {
        match &self.kind {
            QuestionKind::Mcq { options } => match OptionLabel::parse(&self.correct_answer) {
                Some(label) => format!("{label}: {}", options.get(label)),
                None => self.correct_answer.clone(),
            },
            QuestionKind::TrueFalse | QuestionKind::Numeric => self.correct_answer.clone(),
        }
    }

    /// Draft carrying this question's current values, for editing.
    #[must_use]
    pub fn to_draft(&self) -> QuestionDraft {
        QuestionDraft {
            topic_id: self.topic_id,
            text: self.text.clone(),
            question_type: self.question_type(),
            difficulty: self.difficulty,
            options: self.options().map(|o| o.as_array().clone()),
            correct_answer: self.correct_answer.clone(),
            solution: self.solution.clone(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
