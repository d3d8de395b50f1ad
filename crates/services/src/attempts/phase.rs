use std::fmt;

use exam_core::model::{QuestionNumber, StoredRecoveryData};

use crate::attempts::submission::FinishReceipt;
use crate::error::AttemptError;

/// Lifecycle of one attempt.
///
/// Expiry is not a separate phase: it enters `Finishing` with
/// [`FinishReason::Expired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptPhase {
    NotStarted,
    AwaitingRecoveryDecision,
    Starting,
    InProgress,
    Finishing,
    Finished,
}

impl AttemptPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptPhase::NotStarted => "not started",
            AttemptPhase::AwaitingRecoveryDecision => "awaiting a recovery decision",
            AttemptPhase::Starting => "starting",
            AttemptPhase::InProgress => "in progress",
            AttemptPhase::Finishing => "finishing",
            AttemptPhase::Finished => "finished",
        }
    }
}

impl fmt::Display for AttemptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an attempt entered `Finishing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Submitted,
    Expired,
}

/// Outcome of the resume dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryChoice {
    Resume,
    StartFresh,
}

/// What mounting found in recovery storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountOutcome {
    Fresh,
    RecoveryAvailable(StoredRecoveryData),
}

/// Result of a finish request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishStatus {
    Completed(FinishReceipt),
    /// The attempt had already finished; nothing was sent.
    AlreadyFinished,
}

/// Result of one timer tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing to count down yet (not started, or waiting on the resume dialog).
    Idle,
    /// The clock is no longer running; the ticker should exit.
    Stopped,
    Ticked { remaining_ms: u64 },
    /// The clock reached zero and the forced finish ran.
    Expired(Result<FinishStatus, AttemptError>),
}

impl TickOutcome {
    /// True when no further ticks can have any effect.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TickOutcome::Stopped | TickOutcome::Expired(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerReceipt {
    pub question: QuestionNumber,
    /// Cursor after the answer was recorded.
    pub next_index: usize,
    pub is_last: bool,
}
