//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{CursorError, QuestionNumber};

use crate::attempts::AttemptPhase;

/// Errors emitted by `ExamApi` implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("exam api is not configured: {0}")]
    NotConfigured(&'static str),
    #[error("invalid exam api url: {0}")]
    InvalidUrl(String),
    #[error("exam api request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("exam api rejected the request: {0}")]
    Rejected(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `AttemptCoordinator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("insufficient credits: {required} required, {current} available")]
    InsufficientCredits { required: u32, current: u32 },
    #[error("cannot {action} while the attempt is {phase}")]
    InvalidTransition {
        phase: AttemptPhase,
        action: &'static str,
    },
    #[error("no question left to answer")]
    NoCurrentQuestion,
    #[error("question index {index} is past the end of the test ({total} questions)")]
    QuestionOutOfRange { index: usize, total: usize },
    #[error("question {question} expects a {expected} answer")]
    AnswerMismatch {
        question: QuestionNumber,
        expected: &'static str,
    },
    #[error("attempt has no server-side identifier")]
    MissingAttemptId,
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AttemptError {
    /// True for failures the user can retry without losing progress.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AttemptError::Api(
                ApiError::HttpStatus(_) | ApiError::Rejected(_) | ApiError::Http(_)
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_failures_are_retryable() {
        let err = AttemptError::from(ApiError::HttpStatus(reqwest::StatusCode::BAD_GATEWAY));
        assert!(err.is_retryable());

        let err = AttemptError::InsufficientCredits {
            required: 5,
            current: 2,
        };
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "insufficient credits: 5 required, 2 available");
    }
}
