#![forbid(unsafe_code)]

pub mod api;
pub mod attempts;
pub mod checkpoint;
pub mod error;
pub mod recovery_store;

pub use exam_core::Clock;

pub use api::{Affordability, ExamApi, ScoreReceipt};
pub use attempts::{
    AnswerReceipt, AttemptCoordinator, AttemptPhase, AttemptSnapshot, FinishReason,
    FinishReceipt, FinishStatus, MountOutcome, RecoveryChoice, SessionTicker, TickOutcome,
};
pub use checkpoint::CheckpointWriter;
pub use error::{ApiError, AttemptError};
pub use recovery_store::{RecoveryStore, recovery_key};
