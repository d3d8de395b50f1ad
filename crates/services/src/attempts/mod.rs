mod coordinator;
mod phase;
mod snapshot;
mod submission;
mod ticker;

// Public API of the attempt subsystem.
pub use coordinator::{AttemptCoordinator, CHECKPOINT_EVERY_TICKS};
pub use phase::{
    AnswerReceipt, AttemptPhase, FinishReason, FinishStatus, MountOutcome, RecoveryChoice,
    TickOutcome,
};
pub use snapshot::AttemptSnapshot;
pub use submission::{
    BatchedSubmission, FinishContext, FinishReceipt, IncrementalSubmission, SubmissionStrategy,
    strategy_for,
};
pub use ticker::SessionTicker;
