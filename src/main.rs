//! Random media spawner runner
//!
//! Hosts one random media source against a simulated scene and serves
//! vendor requests as JSON lines on stdin/stdout.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use random_media_spawner::config::Config;
use random_media_spawner::host::{Host, SimulatedHost};
use random_media_spawner::logging::init_logging;
use random_media_spawner::remote::{
    register_source_requests, serve_stdio, InstanceRegistry, VendorApi,
};
use random_media_spawner::source::RandomMediaSource;
use random_media_spawner::watch::watch_config;

const SOURCE_NAME: &str = "Random Media";

fn main() -> Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config_override = match config_arg(&args) {
        Ok(path) => path,
        Err(message) => {
            eprintln!("{}", message);
            print_help();
            std::process::exit(2);
        }
    };

    // Keep the guard alive so buffered log lines get flushed on exit
    let _log_guard = init_logging()?;
    info!("Random media spawner starting...");

    let config = match &config_override {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let config_path = config.config_path()?;
    info!("Configuration loaded from {:?}", config_path);

    let runtime = tokio::runtime::Runtime::new()?;

    let host: Arc<dyn Host> = if config.host.playback_ms > 0 {
        SimulatedHost::with_auto_complete(
            config.host.canvas_width,
            config.host.canvas_height,
            runtime.handle().clone(),
            Duration::from_millis(config.host.playback_ms),
        )
    } else {
        Arc::new(SimulatedHost::new(
            config.host.canvas_width,
            config.host.canvas_height,
        ))
    };

    let source = Arc::new(RandomMediaSource::new(SOURCE_NAME, host, config.source.clone()));
    if !config.source.has_folder() {
        warn!("No media folder configured, spawn requests will be skipped");
    }

    let instances = Arc::new(InstanceRegistry::new());
    instances.register(&source);

    let api = if config.remote.enabled {
        let mut api = VendorApi::new(config.remote.vendor_name.clone());
        register_source_requests(&mut api, instances.clone());
        Some(Arc::new(api))
    } else {
        warn!("Remote requests disabled, only activation will spawn media");
        None
    };

    if config.runner.activate_on_start {
        let result = source.activate();
        info!(
            "Startup activation: {}/{} spawned, {} active",
            result.succeeded, result.attempted, result.active_count_after
        );
    }

    let _watcher = if config.runner.watch_config {
        match watch_config(runtime.handle(), config_path, &source) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("Config changes will not be picked up: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    // Set up Ctrl+C handler that signals shutdown
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down...");
        let _ = shutdown_tx.send(true);
    })?;

    runtime.block_on(async {
        let shutdown = async {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        };

        match api {
            Some(api) => {
                info!("Serving vendor '{}' requests on stdin", api.name());
                tokio::select! {
                    res = serve_stdio(api) => {
                        if let Err(e) = res {
                            error!("Request channel error: {:#}", e);
                        }
                        info!("Request channel closed, shutting down...");
                    }
                    _ = shutdown => {}
                }
            }
            None => {
                info!("Press Ctrl+C to exit...");
                shutdown.await;
            }
        }
    });

    let status = source.status();
    info!(
        "Source '{}': {} files, {} active items at shutdown",
        status.name, status.file_count, status.active_count
    );

    instances.unregister(source.id());
    drop(source);
    runtime.shutdown_timeout(Duration::from_secs(1));

    info!("Shutdown complete");
    Ok(())
}

/// Value of `--config <path>` / `-c <path>`, if given
fn config_arg(args: &[String]) -> Result<Option<PathBuf>, String> {
    let Some(pos) = args.iter().position(|a| a == "--config" || a == "-c") else {
        return Ok(None);
    };
    args.get(pos + 1)
        .map(|path| Some(PathBuf::from(path)))
        .ok_or_else(|| "--config requires a path".to_string())
}

fn print_help() {
    println!("random-media-spawner - Spawn random media files into a scene");
    println!();
    println!("USAGE:");
    println!("    random-media-spawner [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help            Print this help message");
    println!("    -c, --config <PATH>   Use this config file instead of the default");
    println!();
    println!("REQUESTS (one JSON object per line on stdin):");
    println!("    {{\"request_type\":\"spawn\"}}");
    println!("    {{\"request_type\":\"reload_files\"}}");
    println!("    {{\"request_type\":\"status\",\"request_data\":{{\"source\":\"<name|id>\"}}}}");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG                Set log level (e.g., debug, info, warn)");
    println!("    RANDOM_MEDIA_LOG_PATH   Override the log directory");
}
