//! How answers reach the backend.
//!
//! Speaking attempts upload every answer as soon as it is given and close the
//! attempt with a bare finish signal. Writing attempts keep answers in the
//! ledger and send them all at once when the attempt finishes.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use exam_core::model::{
    Answer, AnswerLedger, AttemptId, QuestionNumber, SubmissionShape, TestId, TestKind,
};

use crate::api::ExamApi;
use crate::error::AttemptError;

/// Everything a strategy may need when the attempt ends.
#[derive(Debug, Clone, Copy)]
pub struct FinishContext<'a> {
    pub test_id: &'a TestId,
    pub attempt_id: &'a AttemptId,
    pub answers: &'a AnswerLedger,
}

/// What the backend handed back for a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReceipt {
    /// Incremental attempt closed; scoring happens server-side later.
    Finished,
    /// Batched attempt submitted and scored.
    Scored { result_id: String },
}

#[async_trait]
pub trait SubmissionStrategy: Send + Sync {
    fn shape(&self) -> SubmissionShape;

    /// Called once per answered question, before the answer is recorded.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::AnswerMismatch` for an answer of the wrong type,
    /// or `AttemptError::Api` if an upload fails.
    async fn on_answer(
        &self,
        api: &dyn ExamApi,
        attempt_id: &AttemptId,
        question: QuestionNumber,
        answer: &Answer,
    ) -> Result<(), AttemptError>;

    /// Called once when the attempt finishes.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Api` if the finish request fails.
    async fn on_finish(
        &self,
        api: &dyn ExamApi,
        finish: FinishContext<'_>,
    ) -> Result<FinishReceipt, AttemptError>;
}

/// Per-question audio upload, then a finish signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncrementalSubmission;

#[async_trait]
impl SubmissionStrategy for IncrementalSubmission {
    fn shape(&self) -> SubmissionShape {
        SubmissionShape::Incremental
    }

    async fn on_answer(
        &self,
        api: &dyn ExamApi,
        attempt_id: &AttemptId,
        question: QuestionNumber,
        answer: &Answer,
    ) -> Result<(), AttemptError> {
        let clip = answer.as_audio().ok_or(AttemptError::AnswerMismatch {
            question,
            expected: "recorded audio",
        })?;
        api.submit_question(attempt_id, question, clip).await?;
        tracing::debug!(%attempt_id, %question, bytes = clip.len(), "uploaded answer");
        Ok(())
    }

    async fn on_finish(
        &self,
        api: &dyn ExamApi,
        finish: FinishContext<'_>,
    ) -> Result<FinishReceipt, AttemptError> {
        api.finish_attempt(finish.attempt_id).await?;
        Ok(FinishReceipt::Finished)
    }
}

/// Answers stay in the ledger until a single submit-and-score request.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchedSubmission;

impl BatchedSubmission {
    /// Request body keyed by `question_<n>`.
    #[must_use]
    pub fn payload(answers: &AnswerLedger) -> BTreeMap<String, String> {
        answers
            .iter()
            .filter_map(|(question, answer)| {
                answer
                    .as_text()
                    .map(|text| (question.submission_key(), text.to_owned()))
            })
            .collect()
    }
}

#[async_trait]
impl SubmissionStrategy for BatchedSubmission {
    fn shape(&self) -> SubmissionShape {
        SubmissionShape::Batched
    }

    async fn on_answer(
        &self,
        _api: &dyn ExamApi,
        _attempt_id: &AttemptId,
        question: QuestionNumber,
        answer: &Answer,
    ) -> Result<(), AttemptError> {
        if answer.as_text().is_none() {
            return Err(AttemptError::AnswerMismatch {
                question,
                expected: "text",
            });
        }
        Ok(())
    }

    async fn on_finish(
        &self,
        api: &dyn ExamApi,
        finish: FinishContext<'_>,
    ) -> Result<FinishReceipt, AttemptError> {
        let payload = Self::payload(finish.answers);
        tracing::debug!(
            test_id = %finish.test_id,
            answers = payload.len(),
            "submitting batched answers"
        );
        let receipt = api.submit_and_score(finish.test_id, &payload).await?;
        Ok(FinishReceipt::Scored {
            result_id: receipt.result_id,
        })
    }
}

/// Strategy for attempts of `kind`.
#[must_use]
pub fn strategy_for(kind: TestKind) -> Arc<dyn SubmissionStrategy> {
    match kind.submission_shape() {
        SubmissionShape::Incremental => Arc::new(IncrementalSubmission),
        SubmissionShape::Batched => Arc::new(BatchedSubmission),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_their_shape() {
        assert_eq!(
            strategy_for(TestKind::Speaking).shape(),
            SubmissionShape::Incremental
        );
        assert_eq!(
            strategy_for(TestKind::Writing).shape(),
            SubmissionShape::Batched
        );
    }

    #[test]
    fn batched_payload_uses_question_keys() {
        let mut ledger = AnswerLedger::new();
        ledger.set_answer(QuestionNumber::new(1), Answer::text("first"));
        ledger.set_answer(QuestionNumber::new(8), Answer::text("essay"));
        ledger.set_answer(QuestionNumber::new(8), Answer::text("revised essay"));

        let payload = BatchedSubmission::payload(&ledger);

        assert_eq!(payload.len(), 2);
        assert_eq!(payload["question_1"], "first");
        assert_eq!(payload["question_8"], "revised essay");
    }
}
