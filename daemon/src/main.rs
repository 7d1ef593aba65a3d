use anyhow::{Context, Result};
use guardian_daemon::{
    config::{Config, OutputConfig},
    detector::{DetectorSettings, EnsembleDetector},
    notifier::Notifier,
    pipeline::IngestionLoop,
    socket::DatagramReceiver,
};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

fn init_logging(output: &OutputConfig) {
    let level = if output.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };

    // Best effort: an unopenable log file only disables the file layer
    let file_layer = output
        .log_file
        .as_ref()
        .and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok())
        .map(|file| fmt::layer().with_ansi(false).with_target(false).with_writer(Mutex::new(file)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .with(level)
        .init();
}

async fn wait_for_shutdown() {
    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let explicit = std::env::args().nth(1).map(PathBuf::from);
    let config_path = explicit.clone().unwrap_or_else(Config::config_path);
    let loaded = if explicit.is_some() || config_path.exists() {
        Some(Config::load(&config_path))
    } else {
        None
    };
    let config = match &loaded {
        Some(Ok(config)) => config.clone(),
        _ => Config::default(),
    };

    init_logging(&config.output);
    info!("CPU Guardian detection engine starting");
    match loaded {
        Some(Ok(_)) => info!("Loaded config from {:?}", config_path),
        Some(Err(e)) => warn!("Failed to load config {:?}: {}, using defaults", config_path, e),
        None => info!("No config file found, using defaults"),
    }
    info!(
        "Config: learning_samples={}, retrain_interval={}s, retrain_buffer={}, \
         models={}/{} (weight {})",
        config.learning.samples,
        config.retrain.interval_secs,
        config.retrain.buffer_capacity,
        config.ensemble.primary.as_str(),
        config.ensemble.secondary.as_str(),
        config.ensemble.primary_weight,
    );

    let settings = DetectorSettings::try_from(&config).context("invalid configuration")?;

    let receiver = DatagramReceiver::bind(&config.listener.socket_path)
        .with_context(|| format!("failed to bind {:?}", config.listener.socket_path))?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    let detector = Arc::new(EnsembleDetector::new(settings));
    let notifier = Notifier::new(config.output.log_file.clone());
    let mut ingest = IngestionLoop::new(&config, detector, notifier);
    ingest.run(receiver, cancel).await;

    Ok(())
}
