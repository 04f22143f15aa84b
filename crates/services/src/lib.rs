#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_service;
pub mod error;
pub mod practice_service;
pub mod sessions;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use catalog_service::CatalogService;
pub use error::{AppServicesError, CatalogError, PracticeError, SessionError};
pub use practice_service::{PracticePage, PracticeService, QuestionDetail};
pub use sessions::{QuestionView, QuizSessionService};
