use std::sync::Arc;

use exam_core::Clock;
use exam_core::model::{RecoveryCheckpoint, StoredRecoveryData, TestId, TestKind};
use storage::repository::RecoverySlotRepository;

/// Prefix of every recovery slot key.
pub const RECOVERY_KEY_PREFIX: &str = "exam_recovery";

/// Slot key for attempts of `kind`. Each kind gets its own slot so an
/// interrupted speaking attempt never shadows an interrupted writing one.
#[must_use]
pub fn recovery_key(kind: TestKind) -> String {
    format!("{RECOVERY_KEY_PREFIX}:{}", kind.as_str())
}

/// Best-effort, expiring checkpoint storage for one test kind.
///
/// Nothing here returns an error. Storage, encoding and decoding failures are
/// logged and read back as "no checkpoint"; the attempt itself keeps running
/// from memory.
#[derive(Clone)]
pub struct RecoveryStore {
    clock: Clock,
    slots: Arc<dyn RecoverySlotRepository>,
    key: String,
}

impl RecoveryStore {
    #[must_use]
    pub fn new(clock: Clock, slots: Arc<dyn RecoverySlotRepository>, kind: TestKind) -> Self {
        Self {
            clock,
            slots,
            key: recovery_key(kind),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stamp `checkpoint` with the current time and persist it.
    pub async fn save(&self, checkpoint: &RecoveryCheckpoint) {
        let stored = StoredRecoveryData::stamp(checkpoint.clone(), self.clock.now());
        let encoded = match serde_json::to_string(&stored) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "failed to encode recovery checkpoint");
                return;
            }
        };
        if let Err(err) = self.slots.write_slot(&self.key, &encoded).await {
            tracing::warn!(key = %self.key, error = %err, "failed to persist recovery checkpoint");
        }
    }

    /// Read the stored checkpoint.
    ///
    /// Returns `None` when nothing is stored, the slot cannot be read or
    /// decoded, or the record is older than the freshness window. Stale
    /// records are deleted on the way out.
    pub async fn load(&self) -> Option<StoredRecoveryData> {
        let raw = match self.slots.read_slot(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "failed to read recovery checkpoint");
                return None;
            }
        };

        let stored: StoredRecoveryData = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(key = %self.key, error = %err, "ignoring unreadable recovery checkpoint");
                return None;
            }
        };

        if stored.is_stale(self.clock.now()) {
            tracing::info!(
                key = %self.key,
                last_saved_at = %stored.last_saved_at,
                "discarding stale recovery checkpoint"
            );
            self.clear().await;
            return None;
        }

        Some(stored)
    }

    /// Like [`load`](Self::load), but only returns a checkpoint written for
    /// `test_id`. Another test's record is left in place; the next attempt
    /// of this kind overwrites it.
    pub async fn load_for(&self, test_id: &TestId) -> Option<StoredRecoveryData> {
        let stored = self.load().await?;
        if stored.checkpoint.test_id != *test_id {
            tracing::info!(
                key = %self.key,
                stored_test_id = %stored.checkpoint.test_id,
                %test_id,
                "ignoring recovery checkpoint of another test"
            );
            return None;
        }
        Some(stored)
    }

    pub async fn clear(&self) {
        if let Err(err) = self.slots.delete_slot(&self.key).await {
            tracing::warn!(key = %self.key, error = %err, "failed to clear recovery checkpoint");
        }
    }
}
