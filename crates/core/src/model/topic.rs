use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::TopicId;

/// Longest topic name accepted, in characters.
pub const MAX_TOPIC_NAME_LEN: usize = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopicError {
    #[error("topic name cannot be empty")]
    EmptyName,

    #[error("topic name is longer than {max} characters")]
    NameTooLong { max: usize },
}

/// Subject category grouping questions, e.g. "Percentages".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    id: TopicId,
    name: String,
}

impl Topic {
    /// Creates a topic, trimming the name.
    ///
    /// # Errors
    ///
    /// Returns `TopicError::EmptyName` for blank names and
    /// `TopicError::NameTooLong` past `MAX_TOPIC_NAME_LEN`.
    pub fn new(id: TopicId, name: impl Into<String>) -> Result<Self, TopicError> {
        let name = validate_topic_name(name)?;
        Ok(Self { id, name })
    }

    #[must_use]
    pub fn id(&self) -> TopicId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Trims and checks a topic name before it is stored.
///
/// # Errors
///
/// Same rules as [`Topic::new`].
pub fn validate_topic_name(name: impl Into<String>) -> Result<String, TopicError> {
    let name = name.into().trim().to_owned();
    if name.is_empty() {
        return Err(TopicError::EmptyName);
    }
    if name.chars().count() > MAX_TOPIC_NAME_LEN {
        return Err(TopicError::NameTooLong {
            max: MAX_TOPIC_NAME_LEN,
        });
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_trimmed() {
        let topic = Topic::new(TopicId::new(1), "  Percentages ").unwrap();
        assert_eq!(topic.name(), "Percentages");
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = Topic::new(TopicId::new(1), "   ").unwrap_err();
        assert_eq!(err, TopicError::EmptyName);
    }

    #[test]
    fn overlong_name_is_rejected() {
        let err = Topic::new(TopicId::new(1), "x".repeat(101)).unwrap_err();
        assert!(matches!(err, TopicError::NameTooLong { max: 100 }));
    }
}
