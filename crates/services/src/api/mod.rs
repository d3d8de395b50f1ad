//! Backend operations consumed by an attempt.
//!
//! The coordinator only sees the [`ExamApi`] trait; [`HttpExamApi`] is the
//! REST implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use exam_core::model::{AttemptId, AudioClip, FeatureType, QuestionNumber, TestId};

use crate::error::ApiError;

mod http;

pub use http::{ApiConfig, HttpExamApi};

/// Result of the pre-flight credit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affordability {
    pub can_afford: bool,
    pub required_credits: u32,
    pub current_credits: u32,
}

/// Identifier of the scored result produced by a batched submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReceipt {
    pub result_id: String,
}

#[async_trait]
pub trait ExamApi: Send + Sync {
    /// Ask whether the user can pay for `feature`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the request fails.
    async fn check_affordability(&self, feature: FeatureType) -> Result<Affordability, ApiError>;

    /// Open a server-side attempt for `test_id`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the request fails.
    async fn start_attempt(&self, test_id: &TestId) -> Result<AttemptId, ApiError>;

    /// Upload the recorded answer for one speaking question.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the request fails or the server reports no success.
    async fn submit_question(
        &self,
        attempt_id: &AttemptId,
        question: QuestionNumber,
        audio: &AudioClip,
    ) -> Result<(), ApiError>;

    /// Signal the end of an incrementally submitted attempt.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the request fails or the server reports no success.
    async fn finish_attempt(&self, attempt_id: &AttemptId) -> Result<(), ApiError>;

    /// Send every answer of a batched attempt and have it scored.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` when the request fails.
    async fn submit_and_score(
        &self,
        test_id: &TestId,
        answers: &BTreeMap<String, String>,
    ) -> Result<ScoreReceipt, ApiError>;
}
