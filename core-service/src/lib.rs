//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridges (filesystem, settings) and the
//! sample library database into the kit sync engine, and exposes the
//! handful of calls a host UI needs: plan a sync, run it, cancel it, and
//! watch its progress. Desktop apps typically enable the `desktop-shims`
//! feature and call [`CoreService::bootstrap_desktop`].

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::storage::SettingsStore;
use core_audio::FormatConverter;
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{KitRepository, SampleRepository, SqliteKitRepository, SqliteSampleRepository};
use core_runtime::config::{CoreConfig, SyncOptions};
use core_runtime::events::{CoreEvent, EventBus, EventStream};
use core_sync::{SyncChangeSummary, SyncData, SyncReport, SyncService, SyncSettings};
use tracing::instrument;

#[cfg(feature = "desktop-shims")]
use std::path::Path;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    sync: Arc<SyncService>,
    kits: Arc<dyn KitRepository>,
    samples: Arc<dyn SampleRepository>,
    settings_store: Arc<dyn SettingsStore>,
    event_bus: EventBus,
    options: SyncOptions,
}

impl CoreService {
    /// Open the library database named in `config` and build the service.
    ///
    /// # Errors
    ///
    /// `Library` if the database cannot be opened or migrated.
    pub async fn new(config: CoreConfig, converter: Arc<dyn FormatConverter>) -> Result<Self> {
        let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;
        let kits: Arc<dyn KitRepository> = Arc::new(SqliteKitRepository::new(pool.clone()));
        let samples: Arc<dyn SampleRepository> = Arc::new(SqliteSampleRepository::new(pool));
        Ok(Self::with_repositories(config, kits, samples, converter))
    }

    /// Build the service over repositories the caller already owns.
    pub fn with_repositories(
        config: CoreConfig,
        kits: Arc<dyn KitRepository>,
        samples: Arc<dyn SampleRepository>,
        converter: Arc<dyn FormatConverter>,
    ) -> Self {
        let event_bus = EventBus::new(config.event_buffer_size);
        let sync = SyncService::new(
            kits.clone(),
            samples.clone(),
            config.file_system.clone(),
            converter,
            event_bus.clone(),
            config.clock.clone(),
        );
        Self {
            sync: Arc::new(sync),
            kits,
            samples,
            settings_store: config.settings_store,
            event_bus,
            options: config.sync,
        }
    }

    /// Desktop wiring: library database and settings under `data_dir`,
    /// local filesystem, default WAV converter.
    ///
    /// ```no_run
    /// # async fn example() -> core_service::Result<()> {
    /// let dir = bridge_desktop::default_data_dir();
    /// let core = core_service::CoreService::bootstrap_desktop(&dir).await?;
    /// let summary = core.generate_sync_change_summary().await?;
    /// # Ok(())
    /// # }
    /// ```
    #[cfg(feature = "desktop-shims")]
    pub async fn bootstrap_desktop(data_dir: &Path) -> Result<Self> {
        use bridge_desktop::SqliteSettingsStore;
        use core_audio::WavConverter;

        tokio::fs::create_dir_all(data_dir).await.map_err(|e| {
            CoreError::InitializationFailed(format!(
                "cannot create {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        let settings = SqliteSettingsStore::new(data_dir.join("settings.db")).await?;
        let config = CoreConfig::builder()
            .database_path(data_dir.join("romper.sqlite"))
            .settings_store(Arc::new(settings))
            .build()?;

        tracing::info!(data_dir = %data_dir.display(), "Bootstrapping desktop core");
        Self::new(config, Arc::new(WavConverter::new())).await
    }

    /// Current sync settings, falling back to the configured defaults.
    pub async fn sync_settings(&self) -> Result<SyncSettings> {
        Ok(SyncSettings::load(self.settings_store.as_ref(), self.options).await?)
    }

    pub async fn update_sync_settings(&self, settings: &SyncSettings) -> Result<()> {
        settings.save(self.settings_store.as_ref()).await?;
        Ok(())
    }

    /// What a sync of every modified kit would do, without touching the card.
    #[instrument(skip(self))]
    pub async fn generate_sync_change_summary(&self) -> Result<SyncChangeSummary> {
        let settings = self.sync_settings().await?;
        Ok(self.sync.generate_change_summary(&settings).await?)
    }

    /// Summary limited to the named kits.
    #[instrument(skip(self))]
    pub async fn plan_kit_sync(&self, kit_names: &[String]) -> Result<SyncChangeSummary> {
        let settings = self.sync_settings().await?;
        Ok(self.sync.plan_kits(&settings, kit_names).await?)
    }

    /// Run a sync and wait for it to finish. Progress goes to
    /// [`subscribe_sync_progress`](Self::subscribe_sync_progress) streams.
    #[instrument(skip(self, data), fields(files = data.len()))]
    pub async fn start_kit_sync(&self, data: SyncData) -> Result<SyncReport> {
        let settings = self.sync_settings().await?;
        Ok(self.sync.start_kit_sync(&settings, data).await?)
    }

    /// Stop the running sync at the next file boundary. `false` when idle.
    pub fn cancel_kit_sync(&self) -> bool {
        self.sync.cancel_sync()
    }

    pub fn is_syncing(&self) -> bool {
        self.sync.has_active_job()
    }

    /// Stream of sync progress snapshots only.
    pub fn subscribe_sync_progress(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe()).filter(|e| matches!(e, CoreEvent::Sync(_)))
    }

    /// Every core event, including library notifications.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn kits(&self) -> Arc<dyn KitRepository> {
        Arc::clone(&self.kits)
    }

    pub fn samples(&self) -> Arc<dyn SampleRepository> {
        Arc::clone(&self.samples)
    }
}
