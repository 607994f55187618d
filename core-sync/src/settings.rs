//! User settings the sync engine reads before every request.

use crate::{Result, SyncError};
use bridge_traits::storage::SettingsStore;
use core_runtime::config::{SyncErrorPolicy, SyncOptions};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const LOCAL_STORE_PATH_KEY: &str = "localStorePath";
pub const SD_CARD_PATH_KEY: &str = "sdCardPath";
pub const DEFAULT_TO_MONO_KEY: &str = "defaultToMonoSamples";
pub const SYNC_ERROR_POLICY_KEY: &str = "syncErrorPolicy";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSettings {
    pub local_store_path: Option<PathBuf>,
    pub sd_card_path: Option<PathBuf>,
    /// Convert stereo samples to mono while syncing
    pub default_to_mono_samples: bool,
    pub error_policy: SyncErrorPolicy,
}

impl SyncSettings {
    /// Read settings from `store`, falling back to `defaults` for anything
    /// not stored. Blank paths count as unset.
    pub async fn load(store: &dyn SettingsStore, defaults: SyncOptions) -> Result<Self> {
        let local_store_path = non_blank_path(store.get_string(LOCAL_STORE_PATH_KEY).await?);
        let sd_card_path = non_blank_path(store.get_string(SD_CARD_PATH_KEY).await?);
        let default_to_mono_samples = store
            .get_bool(DEFAULT_TO_MONO_KEY)
            .await?
            .unwrap_or(defaults.default_to_mono);
        let error_policy = match store.get_string(SYNC_ERROR_POLICY_KEY).await? {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(error = %e, "Ignoring stored sync error policy");
                defaults.error_policy
            }),
            None => defaults.error_policy,
        };

        Ok(Self {
            local_store_path,
            sd_card_path,
            default_to_mono_samples,
            error_policy,
        })
    }

    /// Persist every field back to `store`.
    pub async fn save(&self, store: &dyn SettingsStore) -> Result<()> {
        save_path(store, LOCAL_STORE_PATH_KEY, self.local_store_path.as_deref()).await?;
        save_path(store, SD_CARD_PATH_KEY, self.sd_card_path.as_deref()).await?;
        store
            .set_bool(DEFAULT_TO_MONO_KEY, self.default_to_mono_samples)
            .await?;
        store
            .set_string(SYNC_ERROR_POLICY_KEY, self.error_policy.as_str())
            .await?;
        Ok(())
    }

    pub fn sd_card_path(&self) -> Result<&Path> {
        self.sd_card_path.as_deref().ok_or(SyncError::NoSdCardPath)
    }

    pub fn local_store_path(&self) -> Result<&Path> {
        self.local_store_path
            .as_deref()
            .ok_or(SyncError::NoLocalStorePath)
    }
}

fn non_blank_path(value: Option<String>) -> Option<PathBuf> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

async fn save_path(store: &dyn SettingsStore, key: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => store.set_string(key, &path.to_string_lossy()).await?,
        None => store.delete(key).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SqliteSettingsStore;

    async fn store() -> SqliteSettingsStore {
        SqliteSettingsStore::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_load_defaults_when_empty() {
        let store = store().await;
        let defaults = SyncOptions {
            error_policy: SyncErrorPolicy::AbortOnError,
            default_to_mono: true,
        };
        let settings = SyncSettings::load(&store, defaults).await.unwrap();
        assert_eq!(settings.local_store_path, None);
        assert!(settings.default_to_mono_samples);
        assert_eq!(settings.error_policy, SyncErrorPolicy::AbortOnError);
        assert!(matches!(settings.sd_card_path(), Err(SyncError::NoSdCardPath)));
        assert!(matches!(
            settings.local_store_path(),
            Err(SyncError::NoLocalStorePath)
        ));
    }

    #[tokio::test]
    async fn test_stored_values_win() {
        let store = store().await;
        store.set_string(SD_CARD_PATH_KEY, "/Volumes/RAMPLE").await.unwrap();
        store.set_string(LOCAL_STORE_PATH_KEY, "/home/u/samples").await.unwrap();
        store.set_bool(DEFAULT_TO_MONO_KEY, false).await.unwrap();
        store.set_string(SYNC_ERROR_POLICY_KEY, "abort").await.unwrap();

        let defaults = SyncOptions {
            error_policy: SyncErrorPolicy::ContinueOnError,
            default_to_mono: true,
        };
        let settings = SyncSettings::load(&store, defaults).await.unwrap();
        assert_eq!(settings.sd_card_path().unwrap(), Path::new("/Volumes/RAMPLE"));
        assert!(!settings.default_to_mono_samples);
        assert_eq!(settings.error_policy, SyncErrorPolicy::AbortOnError);
    }

    #[tokio::test]
    async fn test_blank_path_and_bad_policy_fall_back() {
        let store = store().await;
        store.set_string(SD_CARD_PATH_KEY, "   ").await.unwrap();
        store.set_string(SYNC_ERROR_POLICY_KEY, "sometimes").await.unwrap();

        let settings = SyncSettings::load(&store, SyncOptions::default()).await.unwrap();
        assert_eq!(settings.sd_card_path, None);
        assert_eq!(settings.error_policy, SyncErrorPolicy::ContinueOnError);
    }

    #[tokio::test]
    async fn test_save_round_trip() {
        let store = store().await;
        let settings = SyncSettings {
            local_store_path: Some(PathBuf::from("/store")),
            sd_card_path: Some(PathBuf::from("/sd")),
            default_to_mono_samples: true,
            error_policy: SyncErrorPolicy::AbortOnError,
        };
        settings.save(&store).await.unwrap();
        let loaded = SyncSettings::load(&store, SyncOptions::default()).await.unwrap();
        assert_eq!(loaded, settings);
    }
}
