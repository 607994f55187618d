//! Kit repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::Kit;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};
use tracing::debug;

#[async_trait]
pub trait KitRepository: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<Kit>>;

    /// Insert a kit along with its four empty voices.
    async fn insert(&self, kit: &Kit) -> Result<()>;

    /// All kits ordered by name.
    async fn list(&self) -> Result<Vec<Kit>>;

    /// Kits whose samples changed since the last successful sync.
    async fn find_modified(&self) -> Result<Vec<Kit>>;

    /// Flag a kit as needing a sync.
    async fn mark_modified(&self, name: &str) -> Result<()>;

    /// Clear `modified_since_sync` for every named kit in one transaction.
    ///
    /// Unknown names are ignored; returns the number of kits updated.
    /// Calling it again with the same names is harmless.
    async fn mark_kits_synced(&self, names: &[String]) -> Result<u64>;

    async fn set_voice_alias(&self, kit_name: &str, voice_number: i64, alias: &str)
        -> Result<()>;
}

pub struct SqliteKitRepository {
    pool: SqlitePool,
}

impl SqliteKitRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KitRepository for SqliteKitRepository {
    async fn find_by_name(&self, name: &str) -> Result<Option<Kit>> {
        let kit = query_as::<_, Kit>("SELECT * FROM kits WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(kit)
    }

    async fn insert(&self, kit: &Kit) -> Result<()> {
        kit.validate().map_err(|e| LibraryError::InvalidInput {
            field: "Kit".to_string(),
            message: e,
        })?;

        let mut tx = self.pool.begin().await?;

        query(
            r#"
            INSERT INTO kits (
                name, bank_letter, alias, artist, editable, locked,
                modified_since_sync, bpm, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&kit.name)
        .bind(&kit.bank_letter)
        .bind(&kit.alias)
        .bind(&kit.artist)
        .bind(kit.editable)
        .bind(kit.locked)
        .bind(kit.modified_since_sync)
        .bind(kit.bpm)
        .bind(kit.created_at)
        .bind(kit.updated_at)
        .execute(&mut *tx)
        .await?;

        for voice_number in 1..=crate::models::VOICES_PER_KIT {
            query("INSERT INTO voices (kit_name, voice_number) VALUES (?, ?)")
                .bind(&kit.name)
                .bind(voice_number)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(kit = %kit.name, "Inserted kit");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Kit>> {
        let kits = query_as::<_, Kit>("SELECT * FROM kits ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(kits)
    }

    async fn find_modified(&self) -> Result<Vec<Kit>> {
        let kits =
            query_as::<_, Kit>("SELECT * FROM kits WHERE modified_since_sync = 1 ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(kits)
    }

    async fn mark_modified(&self, name: &str) -> Result<()> {
        let result =
            query("UPDATE kits SET modified_since_sync = 1, updated_at = ? WHERE name = ?")
                .bind(chrono::Utc::now().timestamp())
                .bind(name)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Kit".to_string(),
                id: name.to_string(),
            });
        }
        Ok(())
    }

    async fn mark_kits_synced(&self, names: &[String]) -> Result<u64> {
        if names.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut updated = 0;
        for name in names {
            let result = query("UPDATE kits SET modified_since_sync = 0 WHERE name = ?")
                .bind(name)
                .execute(&mut *tx)
                .await?;
            updated += result.rows_affected();
        }
        tx.commit().await?;

        debug!(requested = names.len(), updated, "Marked kits as synced");
        Ok(updated)
    }

    async fn set_voice_alias(
        &self,
        kit_name: &str,
        voice_number: i64,
        alias: &str,
    ) -> Result<()> {
        let result =
            query("UPDATE voices SET voice_alias = ? WHERE kit_name = ? AND voice_number = ?")
                .bind(alias)
                .bind(kit_name)
                .bind(voice_number)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "Voice".to_string(),
                id: format!("{}/{}", kit_name, voice_number),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn setup() -> SqliteKitRepository {
        SqliteKitRepository::new(create_test_pool().await.unwrap())
    }

    fn modified_kit(name: &str) -> Kit {
        let mut kit = Kit::new(name);
        kit.modified_since_sync = true;
        kit
    }

    #[tokio::test]
    async fn test_insert_and_find_kit() {
        let repo = setup().await;
        let mut kit = Kit::new("A0");
        kit.alias = Some("808 Basics".to_string());
        repo.insert(&kit).await.unwrap();

        let found = repo.find_by_name("A0").await.unwrap().unwrap();
        assert_eq!(found.alias.as_deref(), Some("808 Basics"));
        assert_eq!(found.bank_letter, "A");
        assert!(repo.find_by_name("B1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid_name() {
        let repo = setup().await;
        let err = repo.insert(&Kit::new("kit one")).await.unwrap_err();
        assert!(matches!(err, LibraryError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_find_modified_only_returns_flagged_kits() {
        let repo = setup().await;
        repo.insert(&modified_kit("B2")).await.unwrap();
        repo.insert(&Kit::new("A1")).await.unwrap();
        repo.insert(&modified_kit("A0")).await.unwrap();

        let names: Vec<_> = repo
            .find_modified()
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.name)
            .collect();
        assert_eq!(names, vec!["A0", "B2"]);
    }

    #[tokio::test]
    async fn test_mark_kits_synced_clears_flag_and_is_idempotent() {
        let repo = setup().await;
        repo.insert(&modified_kit("A0")).await.unwrap();
        repo.insert(&modified_kit("A1")).await.unwrap();

        let names = vec!["A0".to_string(), "Z9".to_string()];
        assert_eq!(repo.mark_kits_synced(&names).await.unwrap(), 1);
        assert_eq!(repo.mark_kits_synced(&names).await.unwrap(), 1);

        assert!(!repo.find_by_name("A0").await.unwrap().unwrap().modified_since_sync);
        assert!(repo.find_by_name("A1").await.unwrap().unwrap().modified_since_sync);
        assert_eq!(repo.mark_kits_synced(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_modified_unknown_kit() {
        let repo = setup().await;
        let err = repo.mark_modified("Q5").await.unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_voice_alias() {
        let repo = setup().await;
        repo.insert(&Kit::new("C3")).await.unwrap();
        repo.set_voice_alias("C3", 2, "Snare").await.unwrap();
        assert!(repo.set_voice_alias("C3", 7, "Nope").await.is_err());
    }
}
