mod answer;
mod ids;
mod ledger;
mod plan;
mod recovery;
mod session;

pub use ids::{AttemptId, ParseIdError, QuestionNumber, TestId};

pub use answer::{Answer, AudioClip};
pub use ledger::AnswerLedger;
pub use plan::{FeatureType, PlanError, SubmissionShape, TestKind, TestPlan};
pub use recovery::{RECOVERY_TTL_HOURS, RecoveryCheckpoint, StoredRecoveryData, recovery_ttl};
pub use session::{CursorError, TestSession};
