use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    Difficulty, Question, QuestionId, QuizSession, QuizSessionError, ResultsReport, SessionKey,
    Topic, TopicError, TopicId, ValidatedQuestion, validate_topic_name,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Validated name for a topic that has no id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTopicRecord {
    pub name: String,
}

impl NewTopicRecord {
    /// # Errors
    ///
    /// Returns `TopicError` if the name is blank or too long.
    pub fn new(name: impl Into<String>) -> Result<Self, TopicError> {
        Ok(Self {
            name: validate_topic_name(name)?,
        })
    }
}

/// Topic together with how many questions it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicWithCount {
    pub topic: Topic,
    pub question_count: u32,
}

/// One recorded answer in a persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub answer: String,
}

/// Persisted shape for a quiz session.
///
/// Mirrors the domain `QuizSession` so adapters can serialize it without
/// reaching into session internals. Answers are sorted by question id so the
/// stored form is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSessionRecord {
    pub topic_id: TopicId,
    pub topic_name: String,
    pub question_ids: Vec<QuestionId>,
    pub position: u32,
    pub answers: Vec<AnswerRecord>,
    pub report: Option<ResultsReport>,
    pub started_at: DateTime<Utc>,
}

impl QuizSessionRecord {
    #[must_use]
    pub fn from_session(session: &QuizSession) -> Self {
        let mut answers: Vec<AnswerRecord> = session
            .answers()
            .map(|answers| {
                answers
                    .iter()
                    .map(|(id, answer)| AnswerRecord {
                        question_id: *id,
                        answer: answer.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        answers.sort_by_key(|a| a.question_id);

        Self {
            topic_id: session.topic_id(),
            topic_name: session.topic_name().to_owned(),
            question_ids: session.question_ids().to_vec(),
            position: u32::try_from(session.position()).unwrap_or(u32::MAX),
            answers,
            report: session.report().cloned(),
            started_at: session.started_at(),
        }
    }

    /// Convert the record back into a domain `QuizSession`.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError` if the stored sequence or position is inconsistent.
    pub fn into_session(self) -> Result<QuizSession, QuizSessionError> {
        let answers: HashMap<QuestionId, String> = self
            .answers
            .into_iter()
            .map(|a| (a.question_id, a.answer))
            .collect();
        let position = usize::try_from(self.position).unwrap_or(usize::MAX);
        QuizSession::from_persisted(
            self.topic_id,
            self.topic_name,
            self.question_ids,
            position,
            answers,
            self.report,
            self.started_at,
        )
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Repository contract for topics.
#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Insert a topic and return its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the name is taken.
    async fn insert_new_topic(&self, topic: NewTopicRecord) -> Result<TopicId, StorageError>;

    /// Persist or update a topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the topic cannot be stored.
    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError>;

    /// Fetch a topic by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError>;

    /// List topics ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_topics(&self, limit: u32) -> Result<Vec<Topic>, StorageError>;

    /// List every topic with its question count, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_topics_with_counts(&self) -> Result<Vec<TopicWithCount>, StorageError>;

    /// Delete a topic and its questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the topic does not exist.
    async fn delete_topic(&self, id: TopicId) -> Result<(), StorageError>;
}

/// The question bank.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert a question and return its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the question's topic does not exist.
    async fn insert_new_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError>;

    /// Persist or update a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the question's topic does not exist.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Fetch a question by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError>;

    /// Fetch the questions that still exist among `ids`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError>;

    /// First `limit` questions of a topic, ordered by ID.
    ///
    /// The order is stable for a given bank so a quiz's question sequence can
    /// be derived from it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_questions(
        &self,
        topic_id: TopicId,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError>;

    /// Page of a topic's questions ordered by difficulty, creation time and ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_practice_questions(
        &self,
        topic_id: TopicId,
        difficulty: Option<Difficulty>,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError>;

    /// Number of questions in a topic, optionally of one difficulty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn count_questions(
        &self,
        topic_id: TopicId,
        difficulty: Option<Difficulty>,
    ) -> Result<u32, StorageError>;

    /// Delete a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the question does not exist.
    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError>;
}

/// Key-value store holding quiz sessions between requests.
///
/// Implementations only need per-key atomicity of `get`/`put`. A stored
/// session that has been submitted is never overwritten.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored session is corrupt.
    async fn get_session(&self, key: SessionKey) -> Result<Option<QuizSession>, StorageError>;

    /// Insert or replace the session under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the stored session under `key` is
    /// already submitted, or another `StorageError` if it cannot be stored.
    async fn put_session(&self, key: SessionKey, session: &QuizSession)
    -> Result<(), StorageError>;

    /// Remove the session under `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn delete_session(&self, key: SessionKey) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

fn lock_err<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn practice_order(q: &Question) -> (Difficulty, DateTime<Utc>, QuestionId) {
    (q.difficulty(), q.created_at(), q.id())
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// New IDs follow `SQLite` rowid behaviour: one past the current maximum.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    topics: Arc<Mutex<BTreeMap<TopicId, Topic>>>,
    questions: Arc<Mutex<BTreeMap<QuestionId, Question>>>,
    sessions: Arc<Mutex<HashMap<SessionKey, QuizSession>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TopicRepository for InMemoryRepository {
    async fn insert_new_topic(&self, topic: NewTopicRecord) -> Result<TopicId, StorageError> {
        let mut guard = self.topics.lock().map_err(lock_err)?;
        if guard.values().any(|t| t.name() == topic.name) {
            return Err(StorageError::Conflict);
        }
        let next = guard.keys().next_back().map_or(1, |id| id.value() + 1);
        let id = TopicId::new(next);
        let topic = Topic::new(id, topic.name).map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.insert(id, topic);
        Ok(id)
    }

    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        let mut guard = self.topics.lock().map_err(lock_err)?;
        if guard
            .values()
            .any(|t| t.name() == topic.name() && t.id() != topic.id())
        {
            return Err(StorageError::Conflict);
        }
        guard.insert(topic.id(), topic.clone());
        Ok(())
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        let guard = self.topics.lock().map_err(lock_err)?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_topics(&self, limit: u32) -> Result<Vec<Topic>, StorageError> {
        let guard = self.topics.lock().map_err(lock_err)?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(guard.values().take(limit).cloned().collect())
    }

    async fn list_topics_with_counts(&self) -> Result<Vec<TopicWithCount>, StorageError> {
        let topics = self.topics.lock().map_err(lock_err)?;
        let questions = self.questions.lock().map_err(lock_err)?;
        Ok(topics
            .values()
            .map(|topic| {
                let count = questions
                    .values()
                    .filter(|q| q.topic_id() == topic.id())
                    .count();
                TopicWithCount {
                    topic: topic.clone(),
                    question_count: u32::try_from(count).unwrap_or(u32::MAX),
                }
            })
            .collect())
    }

    async fn delete_topic(&self, id: TopicId) -> Result<(), StorageError> {
        let mut topics = self.topics.lock().map_err(lock_err)?;
        if topics.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        let mut questions = self.questions.lock().map_err(lock_err)?;
        questions.retain(|_, q| q.topic_id() != id);
        Ok(())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn insert_new_question(
        &self,
        question: &ValidatedQuestion,
    ) -> Result<QuestionId, StorageError> {
        if !self
            .topics
            .lock()
            .map_err(lock_err)?
            .contains_key(&question.topic_id)
        {
            return Err(StorageError::NotFound);
        }
        let mut guard = self.questions.lock().map_err(lock_err)?;
        let next = guard.keys().next_back().map_or(1, |id| id.value() + 1);
        let id = QuestionId::new(next);
        guard.insert(id, question.clone().assign_id(id));
        Ok(id)
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        if !self
            .topics
            .lock()
            .map_err(lock_err)?
            .contains_key(&question.topic_id())
        {
            return Err(StorageError::NotFound);
        }
        let mut guard = self.questions.lock().map_err(lock_err)?;
        guard.insert(question.id(), question.clone());
        Ok(())
    }

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        let guard = self.questions.lock().map_err(lock_err)?;
        Ok(guard.get(&id).cloned())
    }

    async fn get_questions(&self, ids: &[QuestionId]) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(lock_err)?;
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }

    async fn list_questions(
        &self,
        topic_id: TopicId,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(lock_err)?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(guard
            .values()
            .filter(|q| q.topic_id() == topic_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_practice_questions(
        &self,
        topic_id: TopicId,
        difficulty: Option<Difficulty>,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(lock_err)?;
        let mut matching: Vec<Question> = guard
            .values()
            .filter(|q| q.topic_id() == topic_id)
            .filter(|q| difficulty.is_none_or(|d| q.difficulty() == d))
            .cloned()
            .collect();
        matching.sort_by_key(practice_order);
        Ok(matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    async fn count_questions(
        &self,
        topic_id: TopicId,
        difficulty: Option<Difficulty>,
    ) -> Result<u32, StorageError> {
        let guard = self.questions.lock().map_err(lock_err)?;
        let count = guard
            .values()
            .filter(|q| q.topic_id() == topic_id)
            .filter(|q| difficulty.is_none_or(|d| q.difficulty() == d))
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(lock_err)?;
        guard.remove(&id).map(|_| ()).ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl SessionStore for InMemoryRepository {
    async fn get_session(&self, key: SessionKey) -> Result<Option<QuizSession>, StorageError> {
        let guard = self.sessions.lock().map_err(lock_err)?;
        Ok(guard.get(&key).cloned())
    }

    async fn put_session(
        &self,
        key: SessionKey,
        session: &QuizSession,
    ) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(lock_err)?;
        if guard.get(&key).is_some_and(QuizSession::is_submitted) {
            return Err(StorageError::Conflict);
        }
        guard.insert(key, session.clone());
        Ok(())
    }

    async fn delete_session(&self, key: SessionKey) -> Result<(), StorageError> {
        let mut guard = self.sessions.lock().map_err(lock_err)?;
        guard.remove(&key);
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub topics: Arc<dyn TopicRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub sessions: Arc<dyn SessionStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let topics: Arc<dyn TopicRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let sessions: Arc<dyn SessionStore> = Arc::new(repo);
        Self {
            topics,
            questions,
            sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Direction, QuestionDraft, QuestionType, ResubmitPolicy};
    use quiz_core::time::fixed_now;

    fn draft(topic_id: TopicId, text: &str, difficulty: Difficulty) -> ValidatedQuestion {
        QuestionDraft {
            topic_id,
            text: text.into(),
            question_type: QuestionType::Numeric,
            difficulty,
            options: None,
            correct_answer: "1".into(),
            solution: None,
        }
        .validate(fixed_now())
        .unwrap()
    }

    async fn seeded() -> (InMemoryRepository, TopicId) {
        let repo = InMemoryRepository::new();
        let topic_id = repo
            .insert_new_topic(NewTopicRecord::new("Percentages").unwrap())
            .await
            .unwrap();
        (repo, topic_id)
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially() {
        let (repo, topic_id) = seeded().await;
        let a = repo
            .insert_new_question(&draft(topic_id, "a", Difficulty::Easy))
            .await
            .unwrap();
        let b = repo
            .insert_new_question(&draft(topic_id, "b", Difficulty::Easy))
            .await
            .unwrap();
        assert_eq!(topic_id, TopicId::new(1));
        assert_eq!((a, b), (QuestionId::new(1), QuestionId::new(2)));
    }

    #[tokio::test]
    async fn duplicate_topic_name_conflicts() {
        let (repo, _) = seeded().await;
        let err = repo
            .insert_new_topic(NewTopicRecord::new("Percentages").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn question_needs_existing_topic() {
        let repo = InMemoryRepository::new();
        let err = repo
            .insert_new_question(&draft(TopicId::new(9), "orphan", Difficulty::Easy))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn get_questions_skips_missing_ids() {
        let (repo, topic_id) = seeded().await;
        let id = repo
            .insert_new_question(&draft(topic_id, "a", Difficulty::Easy))
            .await
            .unwrap();
        let found = repo
            .get_questions(&[id, QuestionId::new(404)])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), id);
    }

    #[tokio::test]
    async fn practice_listing_orders_by_difficulty_and_filters() {
        let (repo, topic_id) = seeded().await;
        for (text, difficulty) in [
            ("hard", Difficulty::Hard),
            ("easy", Difficulty::Easy),
            ("medium", Difficulty::Medium),
            ("easy-2", Difficulty::Easy),
        ] {
            repo.insert_new_question(&draft(topic_id, text, difficulty))
                .await
                .unwrap();
        }

        let all = repo
            .list_practice_questions(topic_id, None, 0, 10)
            .await
            .unwrap();
        let texts: Vec<_> = all.iter().map(Question::text).collect();
        assert_eq!(texts, ["easy", "easy-2", "medium", "hard"]);

        let easy = repo
            .list_practice_questions(topic_id, Some(Difficulty::Easy), 1, 10)
            .await
            .unwrap();
        assert_eq!(easy.len(), 1);
        assert_eq!(easy[0].text(), "easy-2");
        assert_eq!(
            repo.count_questions(topic_id, Some(Difficulty::Easy))
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn deleting_topic_removes_its_questions() {
        let (repo, topic_id) = seeded().await;
        let id = repo
            .insert_new_question(&draft(topic_id, "a", Difficulty::Easy))
            .await
            .unwrap();
        repo.delete_topic(topic_id).await.unwrap();
        assert!(repo.get_question(id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete_topic(topic_id).await.unwrap_err(),
            StorageError::NotFound
        ));
    }

    #[tokio::test]
    async fn session_store_round_trips_sessions() {
        let (repo, topic_id) = seeded().await;
        let id = repo
            .insert_new_question(&draft(topic_id, "a", Difficulty::Easy))
            .await
            .unwrap();
        let questions = repo.list_questions(topic_id, 10).await.unwrap();
        let topic = repo.get_topic(topic_id).await.unwrap().unwrap();
        let mut session = QuizSession::start(&topic, &questions, 10, fixed_now()).unwrap();
        session.record_answer("1").unwrap();

        let key = SessionKey::generate();
        repo.put_session(key, &session).await.unwrap();
        let loaded = repo.get_session(key).await.unwrap().unwrap();
        assert_eq!(loaded.answer_for(id), Some("1"));

        repo.delete_session(key).await.unwrap();
        assert!(repo.get_session(key).await.unwrap().is_none());
        repo.delete_session(key).await.unwrap();
    }

    #[tokio::test]
    async fn submitted_session_is_never_overwritten() {
        let (repo, topic_id) = seeded().await;
        repo.insert_new_question(&draft(topic_id, "a", Difficulty::Easy))
            .await
            .unwrap();
        let topic = repo.get_topic(topic_id).await.unwrap().unwrap();
        let questions = repo.list_questions(topic_id, 10).await.unwrap();
        let bank: HashMap<_, _> = questions.iter().map(|q| (q.id(), q.clone())).collect();

        let key = SessionKey::generate();
        let mut first = QuizSession::start(&topic, &questions, 10, fixed_now()).unwrap();
        repo.put_session(key, &first).await.unwrap();
        let mut stale = first.clone();

        first.record_answer("1").unwrap();
        first
            .submit(Some(&topic), &bank, fixed_now(), ResubmitPolicy::Replay)
            .unwrap();
        repo.put_session(key, &first).await.unwrap();

        // A concurrent writer still holding the in-progress copy loses.
        assert!(matches!(
            repo.put_session(key, &stale).await.unwrap_err(),
            StorageError::Conflict
        ));
        let later = fixed_now() + chrono::Duration::minutes(1);
        stale
            .submit(Some(&topic), &bank, later, ResubmitPolicy::Replay)
            .unwrap();
        assert!(matches!(
            repo.put_session(key, &stale).await.unwrap_err(),
            StorageError::Conflict
        ));
        assert_eq!(repo.get_session(key).await.unwrap().unwrap(), first);
    }

    #[test]
    fn session_record_round_trips_in_progress_and_submitted() {
        let topic = Topic::new(TopicId::new(1), "Percentages").unwrap();
        let questions = vec![
            draft(topic.id(), "a", Difficulty::Easy).assign_id(QuestionId::new(1)),
            draft(topic.id(), "b", Difficulty::Easy).assign_id(QuestionId::new(2)),
        ];
        let mut session = QuizSession::start(&topic, &questions, 10, fixed_now()).unwrap();
        session.record_answer("1").unwrap();
        session.navigate(Direction::Next).unwrap();
        session.record_answer("").unwrap();

        let record = QuizSessionRecord::from_session(&session);
        assert_eq!(record.position, 1);
        assert_eq!(record.answers.len(), 2);
        assert_eq!(record.answers[0].question_id, QuestionId::new(1));
        assert_eq!(record.clone().into_session().unwrap(), session);

        let bank: HashMap<_, _> = questions.iter().map(|q| (q.id(), q.clone())).collect();
        session
            .submit(Some(&topic), &bank, fixed_now(), ResubmitPolicy::Replay)
            .unwrap();
        let record = QuizSessionRecord::from_session(&session);
        assert_eq!(record.topic_name, "Percentages");
        assert!(record.answers.is_empty());
        assert!(record.report.is_some());
        assert_eq!(record.into_session().unwrap(), session);
    }
}
