//! Configuration management for the random media spawner
//!
//! `Config` is the operator-facing TOML file. Spawn calls never read it
//! directly: they take a `SpawnConfig` snapshot, which is where the
//! operator ranges get clamped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source settings (folder, transform ranges, limits)
    #[serde(default)]
    pub source: SourceSettings,

    /// Simulated host used by the headless runner
    #[serde(default)]
    pub host: HostConfig,

    /// Remote control (vendor request) configuration
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Runner behaviour
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

/// Settings of one random media source, as the operator edits them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Folder scanned for media files. Empty means "not configured".
    #[serde(default)]
    pub folder: PathBuf,

    /// Whether spawned items get a random placement
    #[serde(default)]
    pub random_transform: bool,

    /// Remove an item from the scene once its playback ends
    #[serde(default = "default_true")]
    pub remove_on_end: bool,

    /// Items spawned per trigger
    #[serde(default = "default_spawn_count")]
    pub spawn_count: u32,

    /// Spawning is skipped while this many items are active
    #[serde(default = "default_max_active")]
    pub max_active: u32,

    /// Linear gain applied to every spawned item (1.0 = unity)
    #[serde(default = "default_volume")]
    pub volume: f32,

    /// Audio monitoring routing applied to spawned items
    #[serde(default)]
    pub monitoring: MonitoringType,

    /// Random transform ranges
    #[serde(default)]
    pub transform: TransformSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSettings {
    /// Minimum scale in percent
    #[serde(default = "default_min_scale")]
    pub min_scale: f32,

    /// Maximum scale in percent
    #[serde(default = "default_max_scale")]
    pub max_scale: f32,

    /// What the scale percentage is relative to
    #[serde(default)]
    pub scale_mode: ScaleMode,

    /// Use one scale draw for both axes
    #[serde(default = "default_true")]
    pub preserve_aspect: bool,

    /// Minimum rotation in degrees
    #[serde(default = "default_min_rotation")]
    pub min_rotation: f32,

    /// Maximum rotation in degrees
    #[serde(default = "default_max_rotation")]
    pub max_rotation: f32,

    /// Leave rotation untouched
    #[serde(default)]
    pub disable_rotation: bool,

    /// Position bounds in canvas pixels. Zero means "canvas edge".
    #[serde(default)]
    pub min_x: i32,
    #[serde(default)]
    pub min_y: i32,
    #[serde(default)]
    pub max_x: i32,
    #[serde(default)]
    pub max_y: i32,
}

/// Reference the scale percentage is measured against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Percent of the item's natural size
    #[default]
    Native,
    /// Percent of the canvas width
    Canvas,
}

/// Audio monitoring routing for spawned items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringType {
    #[default]
    None,
    MonitorOnly,
    MonitorAndOutput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Simulated canvas width in pixels
    #[serde(default = "default_canvas_width")]
    pub canvas_width: u32,

    /// Simulated canvas height in pixels
    #[serde(default = "default_canvas_height")]
    pub canvas_height: u32,

    /// Simulated playback length; 0 means playback never ends
    #[serde(default = "default_playback_ms")]
    pub playback_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Whether to serve vendor requests
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Vendor name requests are addressed to
    #[serde(default = "default_vendor_name")]
    pub vendor_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Fire the activation trigger once after startup
    #[serde(default)]
    pub activate_on_start: bool,

    /// Re-apply `[source]` settings when the config file changes
    #[serde(default = "default_true")]
    pub watch_config: bool,
}

// Operator ranges of the property panel
const SCALE_RANGE: (f32, f32) = (10.0, 1000.0);
const ROTATION_RANGE: (f32, f32) = (-360.0, 360.0);
const MAX_X: i32 = 7680;
const MAX_Y: i32 = 4320;
const SPAWN_COUNT_RANGE: (u32, u32) = (1, 10);
const MAX_ACTIVE_RANGE: (u32, u32) = (1, 20);

pub const DEFAULT_VENDOR_NAME: &str = "random_media_source";

// Default value functions
fn default_true() -> bool {
    true
}

fn default_spawn_count() -> u32 {
    1
}

fn default_max_active() -> u32 {
    5
}

fn default_volume() -> f32 {
    1.0
}

fn default_min_scale() -> f32 {
    50.0
}

fn default_max_scale() -> f32 {
    150.0
}

fn default_min_rotation() -> f32 {
    -180.0
}

fn default_max_rotation() -> f32 {
    180.0
}

fn default_canvas_width() -> u32 {
    1920
}

fn default_canvas_height() -> u32 {
    1080
}

fn default_playback_ms() -> u64 {
    5000
}

fn default_vendor_name() -> String {
    DEFAULT_VENDOR_NAME.to_string()
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            folder: PathBuf::new(),
            random_transform: false,
            remove_on_end: true,
            spawn_count: default_spawn_count(),
            max_active: default_max_active(),
            volume: default_volume(),
            monitoring: MonitoringType::default(),
            transform: TransformSettings::default(),
        }
    }
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            scale_mode: ScaleMode::default(),
            preserve_aspect: true,
            min_rotation: default_min_rotation(),
            max_rotation: default_max_rotation(),
            disable_rotation: false,
            min_x: 0,
            min_y: 0,
            max_x: 0,
            max_y: 0,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            canvas_width: default_canvas_width(),
            canvas_height: default_canvas_height(),
            playback_ms: default_playback_ms(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vendor_name: default_vendor_name(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            activate_on_start: false,
            watch_config: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceSettings::default(),
            host: HostConfig::default(),
            remote: RemoteConfig::default(),
            runner: RunnerConfig::default(),
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, writing defaults if it is missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let mut config = Self::parse(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            config.config_path = Some(config_path.to_path_buf());
            Ok(config)
        } else {
            let config = Config {
                config_path: Some(config_path.to_path_buf()),
                ..Config::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    /// Parse configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "random-media", "spawner")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}

/// Immutable snapshot of the settings one spawn call works with.
///
/// Every field is already clamped to the operator ranges. Inverted
/// min/max pairs are left as configured; the sampler swaps them.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnConfig {
    pub random_transform: bool,
    pub remove_on_end: bool,
    pub spawn_count: u32,
    pub max_active: u32,
    pub volume: f32,
    pub monitoring: MonitoringType,
    pub transform: TransformSettings,
}

impl SourceSettings {
    /// Take a clamped snapshot for one spawn call
    pub fn snapshot(&self) -> SpawnConfig {
        let t = &self.transform;
        let transform = TransformSettings {
            min_scale: clamp_f32(t.min_scale, SCALE_RANGE, default_min_scale()),
            max_scale: clamp_f32(t.max_scale, SCALE_RANGE, default_max_scale()),
            scale_mode: t.scale_mode,
            preserve_aspect: t.preserve_aspect,
            min_rotation: clamp_f32(t.min_rotation, ROTATION_RANGE, default_min_rotation()),
            max_rotation: clamp_f32(t.max_rotation, ROTATION_RANGE, default_max_rotation()),
            disable_rotation: t.disable_rotation,
            min_x: t.min_x.clamp(0, MAX_X),
            min_y: t.min_y.clamp(0, MAX_Y),
            max_x: t.max_x.clamp(0, MAX_X),
            max_y: t.max_y.clamp(0, MAX_Y),
        };

        SpawnConfig {
            random_transform: self.random_transform,
            remove_on_end: self.remove_on_end,
            spawn_count: self.spawn_count.clamp(SPAWN_COUNT_RANGE.0, SPAWN_COUNT_RANGE.1),
            max_active: self.max_active.clamp(MAX_ACTIVE_RANGE.0, MAX_ACTIVE_RANGE.1),
            volume: clamp_f32(self.volume, (0.0, 1.0), default_volume()),
            monitoring: self.monitoring,
            transform,
        }
    }

    /// Whether a folder has been configured at all
    pub fn has_folder(&self) -> bool {
        !self.folder.as_os_str().is_empty()
    }
}

impl Default for SpawnConfig {
    fn default() -> Self {
        SourceSettings::default().snapshot()
    }
}

fn clamp_f32(value: f32, (lo, hi): (f32, f32), fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_property_panel() {
        let config = Config::parse("").unwrap();
        let s = &config.source;
        assert!(!s.has_folder());
        assert!(!s.random_transform);
        assert!(s.remove_on_end);
        assert_eq!(s.spawn_count, 1);
        assert_eq!(s.max_active, 5);
        assert_eq!(s.transform.min_scale, 50.0);
        assert_eq!(s.transform.max_scale, 150.0);
        assert!(s.transform.preserve_aspect);
        assert_eq!(s.transform.min_rotation, -180.0);
        assert_eq!(s.transform.max_rotation, 180.0);
        assert_eq!(s.transform.scale_mode, ScaleMode::Native);
        assert_eq!(config.remote.vendor_name, DEFAULT_VENDOR_NAME);
    }

    #[test]
    fn test_parse_partial_sections() {
        let config = Config::parse(
            r#"
            [source]
            folder = "/media/clips"
            spawn_count = 3
            monitoring = "monitor_and_output"

            [source.transform]
            scale_mode = "canvas"
            max_x = 500

            [host]
            playback_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.source.folder, PathBuf::from("/media/clips"));
        assert_eq!(config.source.spawn_count, 3);
        assert_eq!(config.source.monitoring, MonitoringType::MonitorAndOutput);
        assert_eq!(config.source.transform.scale_mode, ScaleMode::Canvas);
        assert_eq!(config.source.transform.max_x, 500);
        assert_eq!(config.source.transform.min_scale, 50.0);
        assert_eq!(config.host.playback_ms, 0);
        assert_eq!(config.host.canvas_width, 1920);
    }

    #[test]
    fn test_snapshot_clamps_operator_ranges() {
        let mut settings = SourceSettings::default();
        settings.spawn_count = 0;
        settings.max_active = 99;
        settings.volume = 3.0;
        settings.transform.min_scale = 1.0;
        settings.transform.max_rotation = 720.0;
        settings.transform.min_x = -20;
        settings.transform.max_y = 10_000;

        let snapshot = settings.snapshot();
        assert_eq!(snapshot.spawn_count, 1);
        assert_eq!(snapshot.max_active, 20);
        assert_eq!(snapshot.volume, 1.0);
        assert_eq!(snapshot.transform.min_scale, 10.0);
        assert_eq!(snapshot.transform.max_rotation, 360.0);
        assert_eq!(snapshot.transform.min_x, 0);
        assert_eq!(snapshot.transform.max_y, 4320);
    }

    #[test]
    fn test_snapshot_keeps_inverted_pairs() {
        let mut settings = SourceSettings::default();
        settings.transform.min_scale = 200.0;
        settings.transform.max_scale = 100.0;

        let snapshot = settings.snapshot();
        assert_eq!(snapshot.transform.min_scale, 200.0);
        assert_eq!(snapshot.transform.max_scale, 100.0);
    }

    #[test]
    fn test_load_from_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_path().unwrap(), path);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.source, config.source);
    }
}
