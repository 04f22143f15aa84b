mod queries;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use view::QuestionView;
pub use workflow::QuizSessionService;
