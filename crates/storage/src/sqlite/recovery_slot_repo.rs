use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use crate::repository::{RecoverySlotRepository, StorageError};

use super::SqliteRepository;

#[async_trait]
impl RecoverySlotRepository for SqliteRepository {
    async fn read_slot(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT payload FROM recovery_slots WHERE slot_key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        row.try_get::<String, _>("payload")
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    async fn write_slot(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO recovery_slots (slot_key, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(slot_key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        tracing::debug!(key, bytes = value.len(), "recovery slot written");
        Ok(())
    }

    async fn delete_slot(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM recovery_slots WHERE slot_key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        tracing::debug!(key, "recovery slot deleted");
        Ok(())
    }
}
