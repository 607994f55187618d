//! Sample repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::Sample;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};
use tracing::debug;

#[async_trait]
pub trait SampleRepository: Send + Sync {
    /// Samples assigned to a kit, ordered by voice then slot.
    async fn find_by_kit(&self, kit_name: &str) -> Result<Vec<Sample>>;

    /// Assign a sample to a slot, replacing whatever was there, and flag the
    /// kit as modified. Returns the new row id.
    async fn assign(&self, sample: &Sample) -> Result<i64>;

    /// Clear a slot and flag the kit as modified.
    ///
    /// Returns `false` when the slot was already empty.
    async fn remove(&self, kit_name: &str, voice_number: i64, slot_number: i64) -> Result<bool>;
}

pub struct SqliteSampleRepository {
    pool: SqlitePool,
}

impl SqliteSampleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SampleRepository for SqliteSampleRepository {
    async fn find_by_kit(&self, kit_name: &str) -> Result<Vec<Sample>> {
        let samples = query_as::<_, Sample>(
            "SELECT * FROM samples WHERE kit_name = ? ORDER BY voice_number, slot_number",
        )
        .bind(kit_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(samples)
    }

    async fn assign(&self, sample: &Sample) -> Result<i64> {
        sample.validate().map_err(|e| LibraryError::InvalidInput {
            field: "Sample".to_string(),
            message: e,
        })?;

        let mut tx = self.pool.begin().await?;

        let result = query(
            r#"
            INSERT INTO samples (
                kit_name, voice_number, slot_number, filename, source_path,
                is_stereo, wav_bit_depth, wav_sample_rate
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(kit_name, voice_number, slot_number) DO UPDATE SET
                filename = excluded.filename,
                source_path = excluded.source_path,
                is_stereo = excluded.is_stereo,
                wav_bit_depth = excluded.wav_bit_depth,
                wav_sample_rate = excluded.wav_sample_rate
            "#,
        )
        .bind(&sample.kit_name)
        .bind(sample.voice_number)
        .bind(sample.slot_number)
        .bind(&sample.filename)
        .bind(&sample.source_path)
        .bind(sample.is_stereo)
        .bind(sample.wav_bit_depth)
        .bind(sample.wav_sample_rate)
        .execute(&mut *tx)
        .await?;

        let flagged = query("UPDATE kits SET modified_since_sync = 1, updated_at = ? WHERE name = ?")
            .bind(chrono::Utc::now().timestamp())
            .bind(&sample.kit_name)
            .execute(&mut *tx)
            .await?;
        if flagged.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Kit".to_string(),
                id: sample.kit_name.clone(),
            });
        }

        tx.commit().await?;
        debug!(
            kit = %sample.kit_name,
            voice = sample.voice_number,
            slot = sample.slot_number,
            "Assigned sample"
        );
        Ok(result.last_insert_rowid())
    }

    async fn remove(&self, kit_name: &str, voice_number: i64, slot_number: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let deleted = query(
            "DELETE FROM samples WHERE kit_name = ? AND voice_number = ? AND slot_number = ?",
        )
        .bind(kit_name)
        .bind(voice_number)
        .bind(slot_number)
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            return Ok(false);
        }

        query("UPDATE kits SET modified_since_sync = 1, updated_at = ? WHERE name = ?")
            .bind(chrono::Utc::now().timestamp())
            .bind(kit_name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
