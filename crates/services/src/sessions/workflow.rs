use std::sync::Arc;

use quiz_core::model::{
    Direction, QuizSession, QuizSettings, ResubmitPolicy, ResultsReport, SessionKey, Submission,
    TopicId,
};
use storage::repository::{QuestionRepository, SessionStore, StorageError, TopicRepository};

use super::queries::SessionQueries;
use super::view::QuestionView;
use crate::Clock;
use crate::error::SessionError;

/// Drives quiz sessions through the session store.
///
/// Every operation is one load, mutate, put cycle keyed by `SessionKey`; the
/// service itself keeps no per-session state.
#[derive(Clone)]
pub struct QuizSessionService {
    clock: Clock,
    settings: QuizSettings,
    topics: Arc<dyn TopicRepository>,
    questions: Arc<dyn QuestionRepository>,
    sessions: Arc<dyn SessionStore>,
}

impl QuizSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: QuizSettings,
        topics: Arc<dyn TopicRepository>,
        questions: Arc<dyn QuestionRepository>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            clock,
            settings,
            topics,
            questions,
            sessions,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    /// Start a quiz over the first `max_questions` questions of a topic.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::TopicNotFound` for an unknown topic,
    /// `SessionError::EmptyTopic` if it has no questions, and
    /// `SessionError::Storage` on persistence failures.
    pub async fn create_session(
        &self,
        topic_id: TopicId,
    ) -> Result<(SessionKey, QuizSession), SessionError> {
        let topic = self
            .topics
            .get_topic(topic_id)
            .await?
            .ok_or(SessionError::TopicNotFound(topic_id))?;

        let max = self.settings.max_questions();
        let questions = self.questions.list_questions(topic_id, max).await?;
        let session = QuizSession::start(
            &topic,
            &questions,
            usize::try_from(max).unwrap_or(usize::MAX),
            self.clock.now(),
        )?;

        let key = SessionKey::generate();
        self.store(key, &session).await?;
        tracing::info!(
            session = %key,
            topic = %topic_id,
            questions = session.total_questions(),
            "quiz session created"
        );
        Ok((key, session))
    }

    /// Resolve the question at the session's current position.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` for an unknown key,
    /// `SessionError::AlreadySubmitted` once the quiz is finished, and
    /// `SessionError::QuestionNotFound` if the question was removed from the bank.
    pub async fn current_question(&self, key: SessionKey) -> Result<QuestionView, SessionError> {
        let session = SessionQueries::load(self.sessions.as_ref(), key).await?;
        if session.is_submitted() {
            return Err(SessionError::AlreadySubmitted);
        }

        let id = session.current_question_id();
        let question = self
            .questions
            .get_question(id)
            .await?
            .ok_or(SessionError::QuestionNotFound(id))?;
        Ok(QuestionView::new(&session, question))
    }

    /// Record an answer for the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound`, `SessionError::AlreadySubmitted`, or
    /// `SessionError::Storage`.
    pub async fn submit_answer(
        &self,
        key: SessionKey,
        text: &str,
    ) -> Result<QuizSession, SessionError> {
        let mut session = SessionQueries::load(self.sessions.as_ref(), key).await?;
        session.record_answer(text)?;
        self.store(key, &session).await?;
        tracing::debug!(
            session = %key,
            question = %session.current_question_id(),
            "answer recorded"
        );
        Ok(session)
    }

    /// Move to the next or previous question. Moving past either end is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound`, `SessionError::AlreadySubmitted`, or
    /// `SessionError::Storage`.
    pub async fn navigate(
        &self,
        key: SessionKey,
        direction: Direction,
    ) -> Result<QuizSession, SessionError> {
        let mut session = SessionQueries::load(self.sessions.as_ref(), key).await?;
        if session.navigate(direction)? {
            self.store(key, &session).await?;
        }
        tracing::debug!(
            session = %key,
            ?direction,
            position = session.position(),
            "navigated"
        );
        Ok(session)
    }

    /// Jump to a 0-based question index, clamped to the last question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound`, `SessionError::AlreadySubmitted`, or
    /// `SessionError::Storage`.
    pub async fn go_to(&self, key: SessionKey, index: usize) -> Result<QuizSession, SessionError> {
        let mut session = SessionQueries::load(self.sessions.as_ref(), key).await?;
        let position = session.go_to(index)?;
        self.store(key, &session).await?;
        tracing::debug!(session = %key, requested = index, position, "jumped");
        Ok(session)
    }

    /// Score the session and store the report in its place.
    ///
    /// A finished session is never rescored: depending on the configured
    /// `ResubmitPolicy` the stored report is returned again or the call fails.
    /// This also holds when two submissions race; the first one stored wins.
    /// Questions removed from the bank since the quiz started score as
    /// incorrect, and a deleted topic is reported under its name at start.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` for an unknown key,
    /// `SessionError::AlreadySubmitted` on a repeat call under
    /// `ResubmitPolicy::Reject`, and `SessionError::Storage` on persistence
    /// failures.
    pub async fn finish_session(&self, key: SessionKey) -> Result<ResultsReport, SessionError> {
        let mut session = SessionQueries::load(self.sessions.as_ref(), key).await?;
        if let Some(report) = session.report() {
            return self.replay(key, report);
        }

        let topic_id = session.topic_id();
        let topic = self.topics.get_topic(topic_id).await?;
        if topic.is_none() {
            tracing::warn!(
                session = %key,
                topic = %topic_id,
                name = session.topic_name(),
                "topic deleted since the quiz started"
            );
        }
        let bank =
            SessionQueries::question_bank(self.questions.as_ref(), session.question_ids()).await?;

        let submission = session.submit(
            topic.as_ref(),
            &bank,
            self.clock.now(),
            self.settings.resubmit_policy(),
        )?;
        let report = match submission {
            Submission::Scored { report, missing } => {
                for question in &missing {
                    tracing::warn!(
                        session = %key,
                        question = %question,
                        "question missing from bank; scored as incorrect"
                    );
                }
                report
            }
            Submission::Replayed(report) => report,
        };

        match self.store(key, &session).await {
            Ok(()) => {}
            Err(SessionError::AlreadySubmitted) => {
                let stored = SessionQueries::load(self.sessions.as_ref(), key).await?;
                let report = stored.report().ok_or(SessionError::AlreadySubmitted)?;
                tracing::info!(session = %key, "concurrent submission stored first");
                return self.replay(key, report);
            }
            Err(e) => return Err(e),
        }
        tracing::info!(
            session = %key,
            topic = %topic_id,
            score = report.score(),
            total = report.total(),
            percentage = report.percentage(),
            "quiz submitted"
        );
        Ok(report)
    }

    /// Read the stored report of a finished session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if the session is unknown or not yet
    /// submitted.
    pub async fn get_report(&self, key: SessionKey) -> Result<ResultsReport, SessionError> {
        let session = SessionQueries::load(self.sessions.as_ref(), key).await?;
        session.report().cloned().ok_or(SessionError::NotFound)
    }

    /// Clear a session and start a fresh attempt on the same topic.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` for an unknown key, plus any error of
    /// `create_session`.
    pub async fn retake(&self, key: SessionKey) -> Result<(SessionKey, QuizSession), SessionError> {
        let old = SessionQueries::load(self.sessions.as_ref(), key).await?;
        self.sessions.delete_session(key).await?;
        tracing::info!(session = %key, topic = %old.topic_id(), "retaking quiz");
        self.create_session(old.topic_id()).await
    }

    fn replay(
        &self,
        key: SessionKey,
        report: &ResultsReport,
    ) -> Result<ResultsReport, SessionError> {
        match self.settings.resubmit_policy() {
            ResubmitPolicy::Replay => {
                tracing::info!(session = %key, "replaying stored report");
                Ok(report.clone())
            }
            ResubmitPolicy::Reject => Err(SessionError::AlreadySubmitted),
        }
    }

    /// Write a session back; a submitted copy already in the store wins.
    async fn store(&self, key: SessionKey, session: &QuizSession) -> Result<(), SessionError> {
        self.sessions
            .put_session(key, session)
            .await
            .map_err(|e| match e {
                StorageError::Conflict => SessionError::AlreadySubmitted,
                other => SessionError::Storage(other),
            })
    }

    /// Drop a session and any report it holds. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the store fails.
    pub async fn discard(&self, key: SessionKey) -> Result<(), SessionError> {
        self.sessions.delete_session(key).await?;
        tracing::debug!(session = %key, "session discarded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{
        Difficulty, NO_ANSWER, QuestionDraft, QuestionId, QuestionType, ResultEntry, SessionStatus,
    };
    use quiz_core::time::fixed_now;
    use std::sync::Mutex;
    use storage::repository::{InMemoryRepository, NewTopicRecord};

    /// Session store that hands out one snapshot taken before another writer
    /// submitted, the way an overlapping request would see it.
    struct StaleRead {
        inner: InMemoryRepository,
        stale: Mutex<Option<QuizSession>>,
    }

    #[async_trait::async_trait]
    impl SessionStore for StaleRead {
        async fn get_session(
            &self,
            key: SessionKey,
        ) -> Result<Option<QuizSession>, StorageError> {
            if let Some(stale) = self.stale.lock().unwrap().take() {
                return Ok(Some(stale));
            }
            self.inner.get_session(key).await
        }

        async fn put_session(
            &self,
            key: SessionKey,
            session: &QuizSession,
        ) -> Result<(), StorageError> {
            self.inner.put_session(key, session).await
        }

        async fn delete_session(&self, key: SessionKey) -> Result<(), StorageError> {
            self.inner.delete_session(key).await
        }
    }

    fn service(repo: &InMemoryRepository, settings: QuizSettings) -> QuizSessionService {
        QuizSessionService::new(
            Clock::fixed(fixed_now()),
            settings,
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    async fn topic_with_mcq(repo: &InMemoryRepository, answers: &[&str]) -> TopicId {
        let topic_id = repo
            .insert_new_topic(NewTopicRecord::new("Percentages").unwrap())
            .await
            .unwrap();
        for (i, answer) in answers.iter().enumerate() {
            let draft = QuestionDraft {
                topic_id,
                text: format!("Question {}", i + 1),
                question_type: QuestionType::Mcq,
                difficulty: Difficulty::Easy,
                options: Some(["a".into(), "b".into(), "c".into(), "d".into()]),
                correct_answer: (*answer).into(),
                solution: None,
            };
            repo.insert_new_question(&draft.validate(fixed_now()).unwrap())
                .await
                .unwrap();
        }
        topic_id
    }

    #[tokio::test]
    async fn create_session_caps_at_max_questions() {
        let repo = InMemoryRepository::new();
        let topic_id = topic_with_mcq(&repo, &["A"; 12]).await;
        let svc = service(&repo, QuizSettings::default());

        let (key, session) = svc.create_session(topic_id).await.unwrap();
        assert_eq!(session.total_questions(), 10);
        assert_eq!(
            repo.get_session(key).await.unwrap().unwrap(),
            session
        );
    }

    #[tokio::test]
    async fn create_session_rejects_empty_and_unknown_topics() {
        let repo = InMemoryRepository::new();
        let topic_id = topic_with_mcq(&repo, &[]).await;
        let svc = service(&repo, QuizSettings::default());

        assert!(matches!(
            svc.create_session(topic_id).await.unwrap_err(),
            SessionError::EmptyTopic { topic_id: t } if t == topic_id
        ));
        assert!(matches!(
            svc.create_session(TopicId::new(77)).await.unwrap_err(),
            SessionError::TopicNotFound(_)
        ));
    }

    #[tokio::test]
    async fn answers_survive_navigation() {
        let repo = InMemoryRepository::new();
        let topic_id = topic_with_mcq(&repo, &["A", "B", "C"]).await;
        let svc = service(&repo, QuizSettings::default());
        let (key, _) = svc.create_session(topic_id).await.unwrap();

        svc.submit_answer(key, "  b ").await.unwrap();
        svc.navigate(key, Direction::Next).await.unwrap();
        let view = svc.current_question(key).await.unwrap();
        assert_eq!(view.number(), 2);
        assert_eq!(view.answer, None);

        svc.navigate(key, Direction::Prev).await.unwrap();
        let view = svc.current_question(key).await.unwrap();
        assert!(view.is_first);
        assert_eq!(view.answer.as_deref(), Some("b"));
        assert_eq!(view.answered, 1);
    }

    #[tokio::test]
    async fn go_to_clamps_out_of_range_index() {
        let repo = InMemoryRepository::new();
        let topic_id = topic_with_mcq(&repo, &["A", "B", "C"]).await;
        let svc = service(&repo, QuizSettings::default());
        let (key, _) = svc.create_session(topic_id).await.unwrap();

        let session = svc.go_to(key, 99).await.unwrap();
        assert_eq!(session.position(), 2);
        assert!(svc.current_question(key).await.unwrap().is_last);
    }

    #[tokio::test]
    async fn finish_scores_and_replays_identical_report() {
        let repo = InMemoryRepository::new();
        let topic_id = topic_with_mcq(&repo, &["A", "B", "C"]).await;
        let svc = service(&repo, QuizSettings::default());
        let (key, _) = svc.create_session(topic_id).await.unwrap();

        svc.submit_answer(key, "A").await.unwrap();
        svc.navigate(key, Direction::Next).await.unwrap();
        svc.submit_answer(key, "B").await.unwrap();

        let first = svc.finish_session(key).await.unwrap();
        assert_eq!(first.score(), 2);
        assert!((first.percentage() - 66.7).abs() < f64::EPSILON);
        assert_eq!(first.entries()[2].user_answer_display(), NO_ANSWER);

        // Editing the bank afterwards must not change the stored report.
        let q3 = repo.get_question(QuestionId::new(3)).await.unwrap().unwrap();
        let mut draft = q3.to_draft();
        draft.correct_answer = "D".into();
        repo.upsert_question(&draft.validate(fixed_now()).unwrap().assign_id(q3.id()))
            .await
            .unwrap();

        let second = svc.finish_session(key).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(svc.get_report(key).await.unwrap(), first);
        assert!(matches!(
            svc.submit_answer(key, "C").await.unwrap_err(),
            SessionError::AlreadySubmitted
        ));
    }

    #[tokio::test]
    async fn reject_policy_fails_second_finish() {
        let repo = InMemoryRepository::new();
        let topic_id = topic_with_mcq(&repo, &["A"]).await;
        let settings = QuizSettings::new(10, 5, 5, ResubmitPolicy::Reject).unwrap();
        let svc = service(&repo, settings);
        let (key, _) = svc.create_session(topic_id).await.unwrap();

        svc.finish_session(key).await.unwrap();
        assert!(matches!(
            svc.finish_session(key).await.unwrap_err(),
            SessionError::AlreadySubmitted
        ));
    }

    #[tokio::test]
    async fn deleted_question_scores_incorrect_without_aborting() {
        let repo = InMemoryRepository::new();
        let topic_id = topic_with_mcq(&repo, &["A", "B"]).await;
        let svc = service(&repo, QuizSettings::default());
        let (key, _) = svc.create_session(topic_id).await.unwrap();

        svc.submit_answer(key, "A").await.unwrap();
        svc.navigate(key, Direction::Next).await.unwrap();
        svc.submit_answer(key, "B").await.unwrap();
        repo.delete_question(QuestionId::new(2)).await.unwrap();

        assert!(matches!(
            svc.current_question(key).await.unwrap_err(),
            SessionError::QuestionNotFound(_)
        ));

        let report = svc.finish_session(key).await.unwrap();
        assert_eq!(report.total(), 2);
        assert_eq!(report.score(), 1);
        assert!(report.entries()[1].is_missing());
        assert_eq!(report.entries()[1].user_answer.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn get_report_requires_submission() {
        let repo = InMemoryRepository::new();
        let topic_id = topic_with_mcq(&repo, &["A"]).await;
        let svc = service(&repo, QuizSettings::default());
        let (key, _) = svc.create_session(topic_id).await.unwrap();

        assert!(matches!(
            svc.get_report(key).await.unwrap_err(),
            SessionError::NotFound
        ));
        assert!(matches!(
            svc.get_report(SessionKey::generate()).await.unwrap_err(),
            SessionError::NotFound
        ));
    }

    #[tokio::test]
    async fn retake_clears_report_and_starts_fresh() {
        let repo = InMemoryRepository::new();
        let topic_id = topic_with_mcq(&repo, &["A", "B"]).await;
        let svc = service(&repo, QuizSettings::default());
        let (key, _) = svc.create_session(topic_id).await.unwrap();
        svc.submit_answer(key, "A").await.unwrap();
        svc.finish_session(key).await.unwrap();

        let (new_key, fresh) = svc.retake(key).await.unwrap();
        assert_ne!(new_key, key);
        assert_eq!(fresh.status(), SessionStatus::InProgress);
        assert_eq!(fresh.answered_count(), 0);
        assert!(repo.get_session(key).await.unwrap().is_none());

        svc.discard(new_key).await.unwrap();
        assert!(matches!(
            svc.current_question(new_key).await.unwrap_err(),
            SessionError::NotFound
        ));
    }

    #[tokio::test]
    async fn finish_after_topic_delete_scores_everything_missing() {
        let repo = InMemoryRepository::new();
        let topic_id = topic_with_mcq(&repo, &["A", "B"]).await;
        let svc = service(&repo, QuizSettings::default());
        let (key, _) = svc.create_session(topic_id).await.unwrap();
        svc.submit_answer(key, "A").await.unwrap();

        repo.delete_topic(topic_id).await.unwrap();

        let report = svc.finish_session(key).await.unwrap();
        assert_eq!(report.topic_name(), "Percentages");
        assert_eq!(report.topic_id(), topic_id);
        assert_eq!(report.total(), 2);
        assert_eq!(report.score(), 0);
        assert!(report.entries().iter().all(ResultEntry::is_missing));
        assert_eq!(report.entries()[0].user_answer.as_deref(), Some("A"));
        assert_eq!(svc.get_report(key).await.unwrap(), report);
    }

    #[tokio::test]
    async fn overlapping_finish_returns_first_stored_report() {
        for policy in [ResubmitPolicy::Replay, ResubmitPolicy::Reject] {
            let repo = InMemoryRepository::new();
            let topic_id = topic_with_mcq(&repo, &["A", "B"]).await;
            let settings = QuizSettings::new(10, 5, 5, policy).unwrap();
            let svc = service(&repo, settings.clone());
            let (key, _) = svc.create_session(topic_id).await.unwrap();
            svc.submit_answer(key, "A").await.unwrap();
            let snapshot = repo.get_session(key).await.unwrap();

            let first = svc.finish_session(key).await.unwrap();

            let late = QuizSessionService::new(
                Clock::system(),
                settings,
                Arc::new(repo.clone()),
                Arc::new(repo.clone()),
                Arc::new(StaleRead {
                    inner: repo.clone(),
                    stale: Mutex::new(snapshot),
                }),
            );
            match policy {
                ResubmitPolicy::Replay => {
                    assert_eq!(late.finish_session(key).await.unwrap(), first);
                }
                ResubmitPolicy::Reject => assert!(matches!(
                    late.finish_session(key).await.unwrap_err(),
                    SessionError::AlreadySubmitted
                )),
            }
            assert_eq!(svc.get_report(key).await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn stale_answer_cannot_reopen_submitted_session() {
        let repo = InMemoryRepository::new();
        let topic_id = topic_with_mcq(&repo, &["A"]).await;
        let svc = service(&repo, QuizSettings::default());
        let (key, _) = svc.create_session(topic_id).await.unwrap();
        let snapshot = repo.get_session(key).await.unwrap();
        let first = svc.finish_session(key).await.unwrap();

        let late = QuizSessionService::new(
            Clock::fixed(fixed_now()),
            QuizSettings::default(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(StaleRead {
                inner: repo.clone(),
                stale: Mutex::new(snapshot),
            }),
        );
        assert!(matches!(
            late.submit_answer(key, "A").await.unwrap_err(),
            SessionError::AlreadySubmitted
        ));
        assert_eq!(svc.get_report(key).await.unwrap(), first);
    }
}
