use exam_core::model::RecoveryCheckpoint;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::recovery_store::RecoveryStore;

#[derive(Debug, Clone)]
enum Command {
    Save(RecoveryCheckpoint),
    Clear,
}

#[derive(Debug, Clone, Default)]
struct Pending {
    version: u64,
    command: Option<Command>,
}

/// Fire-and-forget front end for a [`RecoveryStore`].
///
/// Writes are handed to a background task and never block the caller.
/// Only the newest request matters: a burst of saves collapses into the last
/// one, and a clear always lands after any save issued before it.
pub struct CheckpointWriter {
    requests: watch::Sender<Pending>,
    processed: watch::Receiver<u64>,
    version: u64,
    worker: JoinHandle<()>,
}

impl CheckpointWriter {
    /// Start the background writer. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(store: RecoveryStore) -> Self {
        let (requests, mut inbox) = watch::channel(Pending::default());
        let (done, processed) = watch::channel(0_u64);

        let worker = tokio::spawn(async move {
            // `changed` keeps yielding an unseen value after the sender is
            // gone, so the last request still lands.
            while inbox.changed().await.is_ok() {
                let pending = inbox.borrow_and_update().clone();
                match pending.command {
                    Some(Command::Save(checkpoint)) => store.save(&checkpoint).await,
                    Some(Command::Clear) => store.clear().await,
                    None => {}
                }
                let _ = done.send(pending.version);
            }
            tracing::trace!(key = %store.key(), "checkpoint writer stopped");
        });

        Self {
            requests,
            processed,
            version: 0,
            worker,
        }
    }

    /// Queue `checkpoint` for persistence, replacing any queued request.
    pub fn save(&mut self, checkpoint: RecoveryCheckpoint) {
        self.submit(Command::Save(checkpoint));
    }

    /// Queue removal of the stored checkpoint, replacing any queued request.
    pub fn clear(&mut self) {
        self.submit(Command::Clear);
    }

    fn submit(&mut self, command: Command) {
        self.version += 1;
        let version = self.version;
        self.requests.send_replace(Pending {
            version,
            command: Some(command),
        });
    }

    /// Wait until every request issued so far has reached storage.
    pub async fn flush(&mut self) {
        let target = self.version;
        if self.processed.wait_for(|done| *done >= target).await.is_err() {
            tracing::warn!("checkpoint writer exited before flushing");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AttemptId, TestId, TestKind};
    use exam_core::time::{fixed_clock, fixed_now};
    use std::sync::Arc;
    use storage::repository::{InMemoryRepository, RecoverySlotRepository};

    fn checkpoint(index: usize) -> RecoveryCheckpoint {
        RecoveryCheckpoint {
            test_id: TestId::new("speaking-1"),
            started_at: fixed_now(),
            current_question_index: index,
            current_part_index: 0,
            test_attempt_id: Some(AttemptId::new("att-1")),
            remaining_ms: None,
        }
    }

    fn store(repo: &InMemoryRepository) -> RecoveryStore {
        RecoveryStore::new(fixed_clock(), Arc::new(repo.clone()), TestKind::Speaking)
    }

    #[tokio::test]
    async fn burst_of_saves_lands_last_value() {
        let repo = InMemoryRepository::new();
        let mut writer = CheckpointWriter::spawn(store(&repo));
        for index in 0..10 {
            writer.save(checkpoint(index));
        }
        writer.flush().await;

        let loaded = store(&repo).load().await.expect("checkpoint saved");
        assert_eq!(loaded.checkpoint.current_question_index, 9);
    }

    #[tokio::test]
    async fn clear_after_save_wins() {
        let repo = InMemoryRepository::new();
        let mut writer = CheckpointWriter::spawn(store(&repo));
        writer.save(checkpoint(3));
        writer.clear();
        writer.flush().await;

        assert!(repo.read_slot(store(&repo).key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn flush_without_requests_returns_immediately() {
        let repo = InMemoryRepository::new();
        let mut writer = CheckpointWriter::spawn(store(&repo));
        writer.flush().await;
        assert!(writer.is_running());
        assert_eq!(repo.slot_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn pending_write_lands_after_writer_is_dropped() {
        let repo = InMemoryRepository::new();
        let mut writer = CheckpointWriter::spawn(store(&repo));
        writer.save(checkpoint(5));
        let CheckpointWriter {
            requests,
            processed,
            worker,
            ..
        } = writer;
        drop(requests);
        drop(processed);
        worker.await.unwrap();

        let loaded = store(&repo).load().await.expect("write survived drop");
        assert_eq!(loaded.checkpoint.current_question_index, 5);
    }
}
