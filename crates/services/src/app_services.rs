use std::sync::Arc;

use quiz_core::model::QuizSettings;
use storage::repository::Storage;

use crate::Clock;
use crate::catalog_service::CatalogService;
use crate::error::AppServicesError;
use crate::practice_service::PracticeService;
use crate::sessions::QuizSessionService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    settings: QuizSettings,
    quiz: Arc<QuizSessionService>,
    practice: Arc<PracticeService>,
    catalog: Arc<CatalogService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: QuizSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, settings))
    }

    /// Build services over an existing `Storage`, e.g. `Storage::in_memory()`.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, settings: QuizSettings) -> Self {
        let quiz = Arc::new(QuizSessionService::new(
            clock,
            settings.clone(),
            Arc::clone(&storage.topics),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.sessions),
        ));
        let practice = Arc::new(PracticeService::new(
            settings.clone(),
            Arc::clone(&storage.topics),
            Arc::clone(&storage.questions),
        ));
        let catalog = Arc::new(CatalogService::new(
            clock,
            Arc::clone(&storage.topics),
            Arc::clone(&storage.questions),
        ));

        Self {
            settings,
            quiz,
            practice,
            catalog,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizSessionService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn practice(&self) -> Arc<PracticeService> {
        Arc::clone(&self.practice)
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }
}
