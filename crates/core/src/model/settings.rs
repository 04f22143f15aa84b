use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("max questions per quiz must be > 0")]
    InvalidMaxQuestions,

    #[error("practice page size must be > 0")]
    InvalidPracticePageSize,
}

//
// ─── RESUBMIT POLICY ───────────────────────────────────────────────────────────
//

/// What finishing an already-submitted session does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResubmitPolicy {
    /// Return the stored report unchanged.
    #[default]
    Replay,
    /// Fail with an already-submitted error.
    Reject,
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Tunables for quiz sessions and practice browsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSettings {
    max_questions: u32,
    practice_page_size: u32,
    related_questions: u32,
    resubmit_policy: ResubmitPolicy,
}

impl Default for QuizSettings {
    /// Ten questions per quiz, five practice questions per page and five
    /// related questions on a detail view.
    fn default() -> Self {
        Self {
            max_questions: 10,
            practice_page_size: 5,
            related_questions: 5,
            resubmit_policy: ResubmitPolicy::Replay,
        }
    }
}

impl QuizSettings {
    /// Creates custom settings.
    ///
    /// `related_questions` may be zero to hide related questions.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if `max_questions` or `practice_page_size` is zero.
    pub fn new(
        max_questions: u32,
        practice_page_size: u32,
        related_questions: u32,
        resubmit_policy: ResubmitPolicy,
    ) -> Result<Self, SettingsError> {
        if max_questions == 0 {
            return Err(SettingsError::InvalidMaxQuestions);
        }
        if practice_page_size == 0 {
            return Err(SettingsError::InvalidPracticePageSize);
        }
        Ok(Self {
            max_questions,
            practice_page_size,
            related_questions,
            resubmit_policy,
        })
    }

    /// Copy of these settings with a different question cap.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidMaxQuestions` for zero.
    pub fn with_max_questions(&self, max_questions: u32) -> Result<Self, SettingsError> {
        Self::new(
            max_questions,
            self.practice_page_size,
            self.related_questions,
            self.resubmit_policy,
        )
    }

    #[must_use]
    pub fn max_questions(&self) -> u32 {
        self.max_questions
    }

    #[must_use]
    pub fn practice_page_size(&self) -> u32 {
        self.practice_page_size
    }

    #[must_use]
    pub fn related_questions(&self) -> u32 {
        self.related_questions
    }

    #[must_use]
    pub fn resubmit_policy(&self) -> ResubmitPolicy {
        self.resubmit_policy
    }
}
