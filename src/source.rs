//! A configured random media source
//!
//! One source bundles the operator settings with its own catalog, registry
//! and coordinator. Activation and remote requests both end up in
//! [`RandomMediaSource::spawn`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::config::SourceSettings;
use crate::host::Host;
use crate::media::MediaCatalog;
use crate::spawn::{ActiveItemRegistry, SpawnCoordinator, SpawnResult};

/// Unique id of a source instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for InstanceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Point-in-time status of a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub id: InstanceId,
    pub name: String,
    pub folder: PathBuf,
    pub file_count: usize,
    pub active_count: usize,
    pub max_active: u32,
    /// Spawn time of the longest-running live item
    pub oldest_active_since: Option<DateTime<Utc>>,
}

pub struct RandomMediaSource {
    id: InstanceId,
    name: String,
    settings: RwLock<SourceSettings>,
    coordinator: SpawnCoordinator,
}

impl RandomMediaSource {
    /// Create a source scanning the real filesystem
    pub fn new(name: impl Into<String>, host: Arc<dyn Host>, settings: SourceSettings) -> Self {
        Self::with_catalog(name, host, MediaCatalog::new(), settings)
    }

    /// Create a source around an existing catalog
    pub fn with_catalog(
        name: impl Into<String>,
        host: Arc<dyn Host>,
        catalog: MediaCatalog,
        settings: SourceSettings,
    ) -> Self {
        let catalog = Arc::new(catalog);
        if settings.has_folder() {
            catalog.refresh(&settings.folder);
        }

        let source = Self {
            id: InstanceId::new(),
            name: name.into(),
            settings: RwLock::new(settings),
            coordinator: SpawnCoordinator::new(host, catalog, Arc::new(ActiveItemRegistry::new())),
        };
        info!("Created random media source '{}' ({})", source.name, source.id);
        source
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current settings
    pub fn settings(&self) -> SourceSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply new settings. The catalog is rescanned only when the folder
    /// changed; returns whether that happened.
    pub fn update(&self, settings: SourceSettings) -> bool {
        let folder_changed = {
            let mut current = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            let changed = current.folder != settings.folder;
            *current = settings;
            changed
        };

        if folder_changed {
            let folder = self.settings().folder;
            self.coordinator.catalog().refresh(&folder);
        }
        folder_changed
    }

    /// Activation trigger (source shown / manual test)
    pub fn activate(&self) -> SpawnResult {
        info!("Source '{}' activated (manual/fallback trigger)", self.name);
        self.spawn()
    }

    /// Run one spawn batch with a fresh settings snapshot
    pub fn spawn(&self) -> SpawnResult {
        let settings = self.settings();
        let catalog = self.coordinator.catalog();
        if !catalog.is_populated() {
            catalog.refresh(&settings.folder);
        }
        self.coordinator.spawn(&settings.snapshot())
    }

    /// Rescan the configured folder; returns the number of eligible files
    pub fn reload_files(&self) -> usize {
        let folder = self.settings().folder;
        self.coordinator.catalog().refresh(&folder)
    }

    pub fn active_count(&self) -> usize {
        self.coordinator.registry().count()
    }

    pub fn file_count(&self) -> usize {
        self.coordinator.catalog().len()
    }

    pub fn status(&self) -> SourceStatus {
        let settings = self.settings();
        SourceStatus {
            id: self.id,
            name: self.name.clone(),
            folder: settings.folder.clone(),
            file_count: self.file_count(),
            active_count: self.active_count(),
            max_active: settings.snapshot().max_active,
            oldest_active_since: self.coordinator.registry().oldest_spawned_at(),
        }
    }

    pub fn coordinator(&self) -> &SpawnCoordinator {
        &self.coordinator
    }
}

impl Drop for RandomMediaSource {
    fn drop(&mut self) {
        // Items belong to the host; only our subscriptions go away.
        let abandoned = self.coordinator.registry().clear();
        info!(
            "Source '{}' destroyed, {} active items left to the host",
            self.name,
            abandoned.len()
        );
    }
}
