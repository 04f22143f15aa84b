use std::sync::Arc;

use quiz_core::model::{Difficulty, Question, QuestionId, QuizSettings, Topic, TopicId};
use storage::repository::{QuestionRepository, TopicRepository, TopicWithCount};

use crate::error::PracticeError;

/// One page of practice questions for a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct PracticePage {
    pub topic: Topic,
    pub difficulty: Option<Difficulty>,
    /// 1-based page number after clamping.
    pub page: u32,
    pub total_pages: u32,
    pub total_questions: u32,
    pub questions: Vec<Question>,
}

impl PracticePage {
    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// A practice question with its topic and a few neighbours from the same topic.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionDetail {
    pub topic: Topic,
    pub question: Question,
    pub related: Vec<Question>,
}

/// Read-only browsing of the question bank with solutions.
#[derive(Clone)]
pub struct PracticeService {
    settings: QuizSettings,
    topics: Arc<dyn TopicRepository>,
    questions: Arc<dyn QuestionRepository>,
}

impl PracticeService {
    #[must_use]
    pub fn new(
        settings: QuizSettings,
        topics: Arc<dyn TopicRepository>,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self {
            settings,
            topics,
            questions,
        }
    }

    /// Topics that have at least one question, with their counts.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Storage` if repository access fails.
    pub async fn list_topics(&self) -> Result<Vec<TopicWithCount>, PracticeError> {
        let mut topics = self.topics.list_topics_with_counts().await?;
        topics.retain(|t| t.question_count > 0);
        Ok(topics)
    }

    /// Fetch a page of a topic's questions, easiest first.
    ///
    /// `page` is 1-based; values outside `1..=total_pages` are clamped. The
    /// difficulty filter is applied before paging.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::TopicNotFound` for an unknown topic and
    /// `PracticeError::Storage` if repository access fails.
    pub async fn practice_page(
        &self,
        topic_id: TopicId,
        difficulty: Option<Difficulty>,
        page: u32,
    ) -> Result<PracticePage, PracticeError> {
        let topic = self
            .topics
            .get_topic(topic_id)
            .await?
            .ok_or(PracticeError::TopicNotFound(topic_id))?;

        let page_size = self.settings.practice_page_size();
        let total_questions = self.questions.count_questions(topic_id, difficulty).await?;
        let total_pages = total_questions.div_ceil(page_size).max(1);
        let page = page.clamp(1, total_pages);

        let questions = self
            .questions
            .list_practice_questions(topic_id, difficulty, (page - 1) * page_size, page_size)
            .await?;

        tracing::debug!(
            topic = %topic_id,
            ?difficulty,
            page,
            total_pages,
            "practice page loaded"
        );

        Ok(PracticePage {
            topic,
            difficulty,
            page,
            total_pages,
            total_questions,
            questions,
        })
    }

    /// Fetch one question with up to `related_questions` others from its topic.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::QuestionNotFound` for an unknown question and
    /// `PracticeError::Storage` if repository access fails.
    pub async fn question_detail(
        &self,
        question_id: QuestionId,
    ) -> Result<QuestionDetail, PracticeError> {
        let question = self
            .questions
            .get_question(question_id)
            .await?
            .ok_or(PracticeError::QuestionNotFound(question_id))?;
        let topic_id = question.topic_id();
        let topic = self
            .topics
            .get_topic(topic_id)
            .await?
            .ok_or(PracticeError::TopicNotFound(topic_id))?;

        let wanted = self.settings.related_questions();
        let related = if wanted == 0 {
            Vec::new()
        } else {
            self.questions
                .list_practice_questions(topic_id, None, 0, wanted.saturating_add(1))
                .await?
                .into_iter()
                .filter(|q| q.id() != question_id)
                .take(usize::try_from(wanted).unwrap_or(usize::MAX))
                .collect()
        };

        Ok(QuestionDetail {
            topic,
            question,
            related,
        })
    }
}
