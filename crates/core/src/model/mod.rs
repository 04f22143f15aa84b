mod ids;
mod question;
mod report;
mod session;
mod settings;
mod topic;

pub use ids::{ParseIdError, QuestionId, SessionKey, TopicId};

pub use question::{
    Difficulty, McqOptions, OptionLabel, Question, QuestionDraft, QuestionError, QuestionKind,
    QuestionType, ValidatedQuestion,
};
pub use report::{NO_ANSWER, ResultEntry, ResultsReport};
pub use session::{Direction, QuizSession, QuizSessionError, SessionStatus, Submission};
pub use settings::{QuizSettings, ResubmitPolicy, SettingsError};
pub use topic::{MAX_TOPIC_NAME_LEN, Topic, TopicError, validate_topic_name};
