//! Config file watching
//!
//! Re-applies the `[source]` section to a running source whenever the
//! config file is written. Editors often replace the file instead of
//! writing it in place, so the parent directory is watched and events are
//! filtered by file name.

use anyhow::{Context, Result};
use futures::channel::mpsc::{unbounded, UnboundedReceiver};
use futures::StreamExt;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::source::RandomMediaSource;

/// Writes usually arrive as a burst of events
const SETTLE_DELAY: Duration = Duration::from_millis(150);

/// Keeps the watch alive; dropping it stops watching
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start watching `config_path` on `runtime`, applying changes to `source`
/// for as long as it is alive
pub fn watch_config(
    runtime: &Handle,
    config_path: PathBuf,
    source: &Arc<RandomMediaSource>,
) -> Result<ConfigWatcher> {
    let watch_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .context("Config path has no parent directory")?;

    let (tx, rx) = unbounded();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            // Receiver gone means the watcher is shutting down
            let _ = tx.unbounded_send(res);
        },
        notify::Config::default(),
    )
    .context("Failed to create config watcher")?;

    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {:?}", watch_dir))?;

    info!("Watching {:?} for changes", config_path);
    let task = runtime.spawn(run(rx, config_path, Arc::downgrade(source)));

    Ok(ConfigWatcher {
        _watcher: watcher,
        task,
    })
}

async fn run(
    mut rx: UnboundedReceiver<notify::Result<Event>>,
    config_path: PathBuf,
    source: Weak<RandomMediaSource>,
) {
    while let Some(res) = rx.next().await {
        match res {
            Ok(event) if is_config_write(&event, &config_path) => {}
            Ok(_) => continue,
            Err(e) => {
                warn!("Config watch error: {}", e);
                continue;
            }
        }

        tokio::time::sleep(SETTLE_DELAY).await;
        while let Ok(Some(_)) = rx.try_next() {}

        let Some(source) = source.upgrade() else {
            debug!("Source gone, stopping config watcher");
            break;
        };

        match apply_config_change(&config_path, &source) {
            Ok(true) => {}
            Ok(false) => debug!("Config changed but source settings are the same"),
            Err(e) => warn!("Ignoring config change: {:#}", e),
        }
    }
}

fn is_config_write(event: &Event, config_path: &Path) -> bool {
    let file_name = config_path.file_name();
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p == config_path || (file_name.is_some() && p.file_name() == file_name))
}

/// Re-read `config_path` and push its `[source]` section into `source`.
///
/// Returns whether the settings differed. A missing or unparsable file
/// is an error and leaves the source untouched.
pub fn apply_config_change(config_path: &Path, source: &RandomMediaSource) -> Result<bool> {
    let contents = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
    let config = Config::parse(&contents)
        .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

    if config.source == source.settings() {
        return Ok(false);
    }

    let rescanned = source.update(config.source);
    info!(
        "Applied new settings to '{}'{}",
        source.name(),
        if rescanned { ", folder rescanned" } else { "" }
    );
    Ok(true)
}
