use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AttemptId, TestId};

/// Hours a stored checkpoint stays usable after its last write.
pub const RECOVERY_TTL_HOURS: i64 = 24;

/// Freshness window for stored checkpoints.
#[must_use]
pub fn recovery_ttl() -> Duration {
    Duration::hours(RECOVERY_TTL_HOURS)
}

/// Minimal resume position written on every checkpoint.
///
/// Slots are shared by every test of one kind, so the record names the test
/// it belongs to. Records without `testId` or `startedAt` do not decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryCheckpoint {
    pub test_id: TestId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    pub current_question_index: usize,
    pub current_part_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_attempt_id: Option<AttemptId>,
    /// Clock reading at the time of the write; absent in records written
    /// before the attempt clock was started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<u64>,
}

/// A checkpoint as it sits in durable storage, stamped with its write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecoveryData {
    #[serde(flatten)]
    pub checkpoint: RecoveryCheckpoint,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_saved_at: DateTime<Utc>,
}

impl StoredRecoveryData {
    #[must_use]
    pub fn stamp(checkpoint: RecoveryCheckpoint, saved_at: DateTime<Utc>) -> Self {
        Self {
            checkpoint,
            last_saved_at: saved_at,
        }
    }

    /// True when more than [`RECOVERY_TTL_HOURS`] have passed since the write.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_saved_at) > recovery_ttl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn checkpoint() -> RecoveryCheckpoint {
        RecoveryCheckpoint {
            test_id: TestId::new("writing-1"),
            started_at: fixed_now() - Duration::minutes(5),
            current_question_index: 2,
            current_part_index: 1,
            test_attempt_id: Some(AttemptId::new("att-1")),
            remaining_ms: None,
        }
    }

    #[test]
    fn staleness_boundary_is_exclusive() {
        let stored = StoredRecoveryData::stamp(checkpoint(), fixed_now());
        assert!(!stored.is_stale(fixed_now() + Duration::hours(24)));
        assert!(stored.is_stale(fixed_now() + Duration::hours(24) + Duration::milliseconds(1)));
        assert!(stored.is_stale(fixed_now() + Duration::hours(25)));
    }

    #[test]
    fn encodes_camel_case_with_millisecond_timestamp() {
        let stored = StoredRecoveryData::stamp(checkpoint(), fixed_now());
        let value = serde_json::to_value(&stored).unwrap();

        assert_eq!(value["currentQuestionIndex"], 2);
        assert_eq!(value["currentPartIndex"], 1);
        assert_eq!(value["testAttemptId"], "att-1");
        assert_eq!(value["testId"], "writing-1");
        assert_eq!(value["startedAt"], 1_700_000_000_000_i64 - 300_000);
        assert_eq!(value["lastSavedAt"], 1_700_000_000_000_i64);
        assert!(value.get("remainingMs").is_none());
    }

    #[test]
    fn decodes_record_without_attempt_id() {
        let raw = r#"{"testId":"writing-1","startedAt":1700000000000,"currentQuestionIndex":0,"currentPartIndex":0,"lastSavedAt":1700000000000}"#;
        let stored: StoredRecoveryData = serde_json::from_str(raw).unwrap();
        assert!(stored.checkpoint.test_attempt_id.is_none());
        assert_eq!(stored.checkpoint.test_id, TestId::new("writing-1"));
        assert_eq!(stored.last_saved_at, fixed_now());
    }

    #[test]
    fn record_without_test_id_does_not_decode() {
        let raw = r#"{"startedAt":1700000000000,"currentQuestionIndex":3,"currentPartIndex":0,"testAttemptId":"att-1","lastSavedAt":1700000000000}"#;
        assert!(serde_json::from_str::<StoredRecoveryData>(raw).is_err());
    }
}
