use std::sync::Arc;

use quiz_core::model::{Question, QuestionDraft, QuestionId, Topic, TopicId};
use storage::repository::{NewTopicRecord, QuestionRepository, StorageError, TopicRepository};

use crate::Clock;
use crate::error::CatalogError;

/// Authoring operations that keep the question bank populated.
#[derive(Clone)]
pub struct CatalogService {
    clock: Clock,
    topics: Arc<dyn TopicRepository>,
    questions: Arc<dyn QuestionRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(
        clock: Clock,
        topics: Arc<dyn TopicRepository>,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self {
            clock,
            topics,
            questions,
        }
    }

    /// Create a topic with a unique name.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` for a blank or overlong name,
    /// `CatalogError::DuplicateTopic` if the name is taken, and
    /// `CatalogError::Storage` if persistence fails.
    pub async fn create_topic(&self, name: &str) -> Result<TopicId, CatalogError> {
        let record = NewTopicRecord::new(name).map_err(quiz_core::Error::from)?;
        let id = self
            .topics
            .insert_new_topic(record)
            .await
            .map_err(|e| match e {
                StorageError::Conflict => CatalogError::DuplicateTopic,
                other => CatalogError::Storage(other),
            })?;
        tracing::info!(topic = %id, "topic created");
        Ok(id)
    }

    /// Give an existing topic a new unique name.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::TopicNotFound` for an unknown topic,
    /// `CatalogError::Invalid` for a blank or overlong name, and
    /// `CatalogError::DuplicateTopic` if another topic has the name.
    pub async fn rename_topic(&self, id: TopicId, name: &str) -> Result<Topic, CatalogError> {
        if self.topics.get_topic(id).await?.is_none() {
            return Err(CatalogError::TopicNotFound(id));
        }
        let topic = Topic::new(id, name).map_err(quiz_core::Error::from)?;
        self.topics
            .upsert_topic(&topic)
            .await
            .map_err(|e| match e {
                StorageError::Conflict => CatalogError::DuplicateTopic,
                other => CatalogError::Storage(other),
            })?;
        tracing::info!(topic = %id, "topic renamed");
        Ok(topic)
    }

    /// Delete a topic together with its questions.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::TopicNotFound` for an unknown topic.
    pub async fn delete_topic(&self, id: TopicId) -> Result<(), CatalogError> {
        self.topics.delete_topic(id).await.map_err(|e| match e {
            StorageError::NotFound => CatalogError::TopicNotFound(id),
            other => CatalogError::Storage(other),
        })?;
        tracing::info!(topic = %id, "topic deleted");
        Ok(())
    }

    /// List topics ordered by ID, up to the given limit.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn list_topics(&self, limit: u32) -> Result<Vec<Topic>, CatalogError> {
        Ok(self.topics.list_topics(limit).await?)
    }

    /// Validate and store a new question.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` if the draft does not fit its question
    /// type, `CatalogError::TopicNotFound` for an unknown topic, and
    /// `CatalogError::Storage` if persistence fails.
    pub async fn create_question(&self, draft: QuestionDraft) -> Result<QuestionId, CatalogError> {
        let topic_id = draft.topic_id;
        let question = draft
            .validate(self.clock.now())
            .map_err(quiz_core::Error::from)?;
        let id = self
            .questions
            .insert_new_question(&question)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => CatalogError::TopicNotFound(topic_id),
                other => CatalogError::Storage(other),
            })?;
        tracing::info!(question = %id, topic = %topic_id, "question created");
        Ok(id)
    }

    /// Replace a question's content, re-running normalization.
    ///
    /// The creation time is kept.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::QuestionNotFound` for an unknown question,
    /// `CatalogError::Invalid` for an invalid draft, and
    /// `CatalogError::TopicNotFound` if the draft moves it to an unknown topic.
    pub async fn update_question(
        &self,
        id: QuestionId,
        draft: QuestionDraft,
    ) -> Result<Question, CatalogError> {
        let existing = self
            .questions
            .get_question(id)
            .await?
            .ok_or(CatalogError::QuestionNotFound(id))?;

        let topic_id = draft.topic_id;
        let updated = draft
            .validate(existing.created_at())
            .map_err(quiz_core::Error::from)?
            .assign_id(id);
        self.questions
            .upsert_question(&updated)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => CatalogError::TopicNotFound(topic_id),
                other => CatalogError::Storage(other),
            })?;
        tracing::info!(question = %id, "question updated");
        Ok(updated)
    }

    /// Delete a question from the bank.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::QuestionNotFound` for an unknown question.
    pub async fn delete_question(&self, id: QuestionId) -> Result<(), CatalogError> {
        self.questions
            .delete_question(id)
            .await
            .map_err(|e| match e {
                StorageError::NotFound => CatalogError::QuestionNotFound(id),
                other => CatalogError::Storage(other),
            })?;
        tracing::info!(question = %id, "question deleted");
        Ok(())
    }
}
