use std::sync::Arc;

use exam_core::Clock;
use exam_core::model::{
    Answer, AttemptId, QuestionNumber, RecoveryCheckpoint, StoredRecoveryData, TestPlan,
    TestSession,
};
use exam_core::timer::{ClockEvent, ClockStatus};
use storage::repository::RecoverySlotRepository;

use crate::api::ExamApi;
use crate::attempts::phase::{
    AnswerReceipt, AttemptPhase, FinishReason, FinishStatus, MountOutcome, RecoveryChoice,
    TickOutcome,
};
use crate::attempts::snapshot::AttemptSnapshot;
use crate::attempts::submission::{
    FinishContext, FinishReceipt, SubmissionStrategy, strategy_for,
};
use crate::checkpoint::CheckpointWriter;
use crate::error::AttemptError;
use crate::recovery_store::RecoveryStore;

/// Ticks between periodic checkpoints, so remaining time survives a reload
/// even when the user sits on one question.
pub const CHECKPOINT_EVERY_TICKS: u32 = 15;

/// Drives one timed attempt from mount to finish.
///
/// The coordinator is the only writer of its session, ledger and recovery
/// slot. Every operation takes `&mut self`; share it between the UI and a
/// [`SessionTicker`](crate::SessionTicker) through `Arc<tokio::sync::Mutex<_>>`,
/// which also serialises concurrent finish requests.
pub struct AttemptCoordinator {
    plan: TestPlan,
    api: Arc<dyn ExamApi>,
    clock: Clock,
    recovery: RecoveryStore,
    writer: CheckpointWriter,
    phase: AttemptPhase,
    session: TestSession,
    strategy: Option<Arc<dyn SubmissionStrategy>>,
    attempt_id: Option<AttemptId>,
    pending_recovery: Option<StoredRecoveryData>,
    finish_reason: Option<FinishReason>,
    receipt: Option<FinishReceipt>,
    ticks_since_checkpoint: u32,
}

impl AttemptCoordinator {
    /// Build a coordinator for `plan`. Must be called inside a tokio runtime
    /// (checkpoint writes run on a background task).
    #[must_use]
    pub fn new(
        plan: TestPlan,
        api: Arc<dyn ExamApi>,
        slots: Arc<dyn RecoverySlotRepository>,
        clock: Clock,
    ) -> Self {
        let recovery = RecoveryStore::new(clock, slots, plan.kind());
        let writer = CheckpointWriter::spawn(recovery.clone());
        let session = TestSession::new(plan.test_id().clone(), clock.now());
        Self {
            plan,
            api,
            clock,
            recovery,
            writer,
            phase: AttemptPhase::NotStarted,
            session,
            strategy: None,
            attempt_id: None,
            pending_recovery: None,
            finish_reason: None,
            receipt: None,
            ticks_since_checkpoint: 0,
        }
    }

    // ─── Accessors ─────────────────────────────────────────────────────────────

    #[must_use]
    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    #[must_use]
    pub fn plan(&self) -> &TestPlan {
        &self.plan
    }

    #[must_use]
    pub fn session(&self) -> &TestSession {
        &self.session
    }

    #[must_use]
    pub fn attempt_id(&self) -> Option<&AttemptId> {
        self.attempt_id.as_ref()
    }

    #[must_use]
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    #[must_use]
    pub fn receipt(&self) -> Option<&FinishReceipt> {
        self.receipt.as_ref()
    }

    /// Recovery data offered to the user while the resume dialog is open.
    #[must_use]
    pub fn pending_recovery(&self) -> Option<&StoredRecoveryData> {
        self.pending_recovery.as_ref()
    }

    /// The clock is held at the stored reading while the resume dialog is
    /// open.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.session.is_paused()
    }

    #[must_use]
    pub fn recovery_key(&self) -> &str {
        self.recovery.key()
    }

    #[must_use]
    pub fn snapshot(&self) -> AttemptSnapshot {
        let clock = self.session.clock();
        let index = self.session.current_question_index();
        AttemptSnapshot {
            phase: self.phase,
            attempt_id: self.attempt_id.clone(),
            current_question_index: index,
            current_part_index: self.session.current_part_index(),
            current_question: self.plan.question_number(index),
            total_questions: self.plan.total_questions(),
            answered: self.session.answers().len(),
            remaining_ms: clock.remaining_ms(),
            threshold: clock.threshold(),
            is_paused: self.is_paused(),
        }
    }

    // ─── Lifecycle ─────────────────────────────────────────────────────────────

    /// Look for an interrupted attempt of this test.
    ///
    /// When one is found the session takes the stored start time and a
    /// paused clock showing the stored remaining time, and the coordinator
    /// waits for [`resolve_recovery`](Self::resolve_recovery) before anything
    /// else.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTransition` unless the attempt has not
    /// started yet.
    pub async fn mount(&mut self) -> Result<MountOutcome, AttemptError> {
        self.expect_phase(&[AttemptPhase::NotStarted], "mount")?;

        match self.recovery.load_for(self.plan.test_id()).await {
            Some(stored) => {
                tracing::info!(
                    test_id = %self.plan.test_id(),
                    question_index = stored.checkpoint.current_question_index,
                    "found interrupted attempt"
                );
                let remaining = stored
                    .checkpoint
                    .remaining_ms
                    .unwrap_or_else(|| self.plan.duration_ms());
                self.session.restart(stored.checkpoint.started_at);
                self.session.clock_mut().start(remaining);
                self.session.clock_mut().pause();
                self.pending_recovery = Some(stored.clone());
                self.transition(AttemptPhase::AwaitingRecoveryDecision);
                Ok(MountOutcome::RecoveryAvailable(stored))
            }
            None => Ok(MountOutcome::Fresh),
        }
    }

    /// Apply the user's answer to the resume dialog.
    ///
    /// Resuming keeps the stored server attempt, cursor and start time.
    /// Starting fresh checks credits first; only then are the stored
    /// checkpoint and any answers dropped and a new server attempt opened.
    /// A record without a server attempt cannot be resumed and is treated as
    /// a fresh start.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTransition` when no decision is pending,
    /// `AttemptError::InsufficientCredits` (the decision stays pending and the
    /// checkpoint is kept), or `AttemptError::Api` from the backend.
    pub async fn resolve_recovery(
        &mut self,
        choice: RecoveryChoice,
    ) -> Result<AttemptId, AttemptError> {
        self.expect_phase(
            &[AttemptPhase::AwaitingRecoveryDecision],
            "resolve recovery",
        )?;
        let stored = self.pending_recovery.take();

        if choice == RecoveryChoice::Resume {
            if let Some(StoredRecoveryData {
                checkpoint:
                    RecoveryCheckpoint {
                        current_question_index,
                        current_part_index,
                        test_attempt_id: Some(attempt_id),
                        ..
                    },
                ..
            }) = &stored
            {
                let attempt_id = attempt_id.clone();
                self.resume(attempt_id.clone(), *current_question_index, *current_part_index)?;
                return Ok(attempt_id);
            }
            tracing::warn!(
                test_id = %self.plan.test_id(),
                "checkpoint has no server attempt; starting fresh"
            );
        }

        if let Err(err) = self.ensure_affordable().await {
            self.pending_recovery = stored;
            return Err(err);
        }
        self.writer.clear();
        self.session.restart(self.clock.now());
        self.open_attempt().await
    }

    fn resume(
        &mut self,
        attempt_id: AttemptId,
        question_index: usize,
        part_index: usize,
    ) -> Result<(), AttemptError> {
        let index = question_index.min(self.plan.total_questions());
        let part = part_index.min(self.plan.parts().len().saturating_sub(1));

        self.session.advance_to(index, part)?;
        self.session.clock_mut().resume();
        let remaining = self.session.time_remaining_ms();
        self.strategy = Some(strategy_for(self.plan.kind()));
        tracing::info!(
            test_id = %self.plan.test_id(),
            %attempt_id,
            question_index = index,
            remaining_ms = remaining,
            "resuming attempt"
        );
        self.attempt_id = Some(attempt_id);
        self.transition(AttemptPhase::InProgress);
        self.checkpoint();
        Ok(())
    }

    /// Check credits, open a server attempt and start the clock.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InsufficientCredits` (phase stays
    /// `NotStarted`), `AttemptError::Api` (phase stays where the failing call
    /// left it, ready for a retry), or `AttemptError::InvalidTransition`.
    pub async fn start(&mut self) -> Result<AttemptId, AttemptError> {
        self.expect_phase(&[AttemptPhase::NotStarted, AttemptPhase::Starting], "start")?;

        if let Err(err) = self.ensure_affordable().await {
            if matches!(err, AttemptError::InsufficientCredits { .. }) {
                self.transition(AttemptPhase::NotStarted);
            }
            return Err(err);
        }
        self.open_attempt().await
    }

    async fn ensure_affordable(&self) -> Result<(), AttemptError> {
        let affordability = self
            .api
            .check_affordability(self.plan.kind().feature())
            .await?;
        if !affordability.can_afford {
            tracing::info!(
                test_id = %self.plan.test_id(),
                required = affordability.required_credits,
                current = affordability.current_credits,
                "cannot afford attempt"
            );
            return Err(AttemptError::InsufficientCredits {
                required: affordability.required_credits,
                current: affordability.current_credits,
            });
        }
        Ok(())
    }

    async fn open_attempt(&mut self) -> Result<AttemptId, AttemptError> {
        self.transition(AttemptPhase::Starting);
        self.strategy = Some(strategy_for(self.plan.kind()));
        let attempt_id = self.api.start_attempt(self.plan.test_id()).await?;

        self.session.restart(self.clock.now());
        self.session.clock_mut().start(self.plan.duration_ms());
        self.attempt_id = Some(attempt_id.clone());
        tracing::info!(test_id = %self.plan.test_id(), %attempt_id, "attempt started");
        self.transition(AttemptPhase::InProgress);
        self.checkpoint();
        Ok(attempt_id)
    }

    /// Record the answer to the current question and move to the next one.
    ///
    /// Speaking answers are uploaded before they are recorded; if the upload
    /// fails nothing changes and the answer can be submitted again.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NoCurrentQuestion` after the last question,
    /// `AttemptError::AnswerMismatch` for the wrong answer type, or
    /// `AttemptError::Api` when the upload fails.
    pub async fn submit_answer(&mut self, answer: Answer) -> Result<AnswerReceipt, AttemptError> {
        self.expect_phase(&[AttemptPhase::InProgress], "submit an answer")?;
        let index = self.session.current_question_index();
        let question = self
            .plan
            .question_number(index)
            .ok_or(AttemptError::NoCurrentQuestion)?;

        self.upload(question, &answer).await?;
        self.session.answers_mut().set_answer(question, answer);

        let next_index = index + 1;
        self.session
            .advance_to(next_index, self.plan.part_index_for(next_index))?;
        self.checkpoint();

        Ok(AnswerReceipt {
            question,
            next_index,
            is_last: next_index >= self.plan.total_questions(),
        })
    }

    /// Replace the answer to an earlier question without moving the cursor.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::QuestionOutOfRange` for a question not reached
    /// yet, plus the errors of [`submit_answer`](Self::submit_answer).
    pub async fn revise_answer(&mut self, index: usize, answer: Answer) -> Result<(), AttemptError> {
        self.expect_phase(&[AttemptPhase::InProgress], "revise an answer")?;
        let reached = self.session.current_question_index();
        let question = self
            .plan
            .question_number(index)
            .filter(|_| index < reached)
            .ok_or(AttemptError::QuestionOutOfRange {
                index,
                total: reached,
            })?;

        self.upload(question, &answer).await?;
        self.session.answers_mut().set_answer(question, answer);
        Ok(())
    }

    /// Skip forward to `index`. Moving backwards is rejected.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::QuestionOutOfRange` past the end of the test,
    /// or `AttemptError::Cursor` when moving backwards.
    pub fn advance_to(&mut self, index: usize) -> Result<(), AttemptError> {
        self.expect_phase(&[AttemptPhase::InProgress], "move to another question")?;
        let total = self.plan.total_questions();
        if index > total {
            return Err(AttemptError::QuestionOutOfRange { index, total });
        }
        self.session
            .advance_to(index, self.plan.part_index_for(index))?;
        self.checkpoint();
        Ok(())
    }

    /// Advance the clock by one quantum.
    ///
    /// Only counts down while the attempt is in progress. The tick that
    /// reaches zero runs the forced finish.
    pub async fn on_tick(&mut self) -> TickOutcome {
        match self.phase {
            AttemptPhase::InProgress => {}
            AttemptPhase::NotStarted
            | AttemptPhase::AwaitingRecoveryDecision
            | AttemptPhase::Starting => return TickOutcome::Idle,
            AttemptPhase::Finishing | AttemptPhase::Finished => return TickOutcome::Stopped,
        }

        match self.session.clock_mut().tick() {
            Some(ClockEvent::Tick { remaining_ms }) => {
                self.ticks_since_checkpoint += 1;
                if self.ticks_since_checkpoint >= CHECKPOINT_EVERY_TICKS {
                    self.checkpoint();
                }
                TickOutcome::Ticked { remaining_ms }
            }
            Some(ClockEvent::Expired) => {
                tracing::info!(
                    test_id = %self.plan.test_id(),
                    question_index = self.session.current_question_index(),
                    "attempt time expired"
                );
                TickOutcome::Expired(self.finish_with(FinishReason::Expired).await)
            }
            None => match self.session.clock().status() {
                ClockStatus::Stopped | ClockStatus::Expired => TickOutcome::Stopped,
                ClockStatus::Idle | ClockStatus::Running | ClockStatus::Paused => {
                    TickOutcome::Idle
                }
            },
        }
    }

    /// Finish on the user's request.
    ///
    /// # Errors
    ///
    /// See [`finish_with`](Self::finish_with).
    pub async fn finish(&mut self) -> Result<FinishStatus, AttemptError> {
        self.finish_with(FinishReason::Submitted).await
    }

    /// Close the attempt with the backend.
    ///
    /// A second call after success is a no-op returning
    /// `FinishStatus::AlreadyFinished`. A failed call leaves the attempt in
    /// `Finishing` with the clock stopped; calling again retries it.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Api` when the finish request fails, or
    /// `AttemptError::InvalidTransition` before the attempt has started.
    pub async fn finish_with(&mut self, reason: FinishReason) -> Result<FinishStatus, AttemptError> {
        match self.phase {
            AttemptPhase::Finished => {
                tracing::debug!(test_id = %self.plan.test_id(), "finish ignored; already finished");
                return Ok(FinishStatus::AlreadyFinished);
            }
            AttemptPhase::InProgress => {
                self.session.clock_mut().stop();
                self.finish_reason = Some(reason);
                self.transition(AttemptPhase::Finishing);
            }
            AttemptPhase::Finishing => {
                tracing::info!(test_id = %self.plan.test_id(), "retrying finish");
            }
            phase => {
                return Err(AttemptError::InvalidTransition {
                    phase,
                    action: "finish",
                });
            }
        }

        let attempt_id = self.attempt_id.clone().ok_or(AttemptError::MissingAttemptId)?;
        let strategy = self
            .strategy
            .clone()
            .unwrap_or_else(|| strategy_for(self.plan.kind()));
        let receipt = strategy
            .on_finish(
                self.api.as_ref(),
                FinishContext {
                    test_id: self.plan.test_id(),
                    attempt_id: &attempt_id,
                    answers: self.session.answers(),
                },
            )
            .await?;

        self.writer.clear();
        self.writer.flush().await;
        self.session.clock_mut().stop();
        self.receipt = Some(receipt.clone());
        tracing::info!(
            test_id = %self.plan.test_id(),
            %attempt_id,
            reason = ?self.finish_reason,
            "attempt finished"
        );
        self.transition(AttemptPhase::Finished);
        Ok(FinishStatus::Completed(receipt))
    }

    /// Stop counting down, e.g. when the session view goes away. The stored
    /// checkpoint stays for a later resume.
    pub fn stop_clock(&mut self) {
        self.session.clock_mut().stop();
    }

    /// Wait until every queued checkpoint write has reached storage.
    pub async fn flush_checkpoints(&mut self) {
        self.writer.flush().await;
    }

    /// Leave the attempt, keeping its checkpoint for a later resume.
    pub async fn abandon(mut self) {
        if self.phase == AttemptPhase::InProgress {
            self.checkpoint();
        }
        self.session.clock_mut().stop();
        self.writer.flush().await;
        tracing::info!(test_id = %self.plan.test_id(), phase = %self.phase, "attempt abandoned");
    }

    /// Leave the attempt and delete its checkpoint. Before the attempt has
    /// started the slot holds nothing of this test and is left alone.
    pub async fn discard(mut self) {
        self.session.clock_mut().stop();
        if self.phase != AttemptPhase::NotStarted {
            self.writer.clear();
        }
        self.writer.flush().await;
        tracing::info!(test_id = %self.plan.test_id(), phase = %self.phase, "attempt discarded");
    }

    // ─── Internals ─────────────────────────────────────────────────────────────

    fn expect_phase(
        &self,
        allowed: &[AttemptPhase],
        action: &'static str,
    ) -> Result<(), AttemptError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(AttemptError::InvalidTransition {
                phase: self.phase,
                action,
            })
        }
    }

    fn transition(&mut self, next: AttemptPhase) {
        if self.phase != next {
            tracing::info!(
                test_id = %self.plan.test_id(),
                from = %self.phase,
                to = %next,
                "attempt phase changed"
            );
            self.phase = next;
        }
    }

    async fn upload(&self, question: QuestionNumber, answer: &Answer) -> Result<(), AttemptError> {
        let attempt_id = self.attempt_id.as_ref().ok_or(AttemptError::MissingAttemptId)?;
        let strategy = self.strategy.as_ref().ok_or(AttemptError::MissingAttemptId)?;
        strategy
            .on_answer(self.api.as_ref(), attempt_id, question, answer)
            .await
    }

    fn checkpoint(&mut self) {
        self.ticks_since_checkpoint = 0;
        self.writer.save(RecoveryCheckpoint {
            test_id: self.plan.test_id().clone(),
            started_at: self.session.started_at(),
            current_question_index: self.session.current_question_index(),
            current_part_index: self.session.current_part_index(),
            test_attempt_id: self.attempt_id.clone(),
            remaining_ms: Some(self.session.time_remaining_ms()),
        });
    }
}
