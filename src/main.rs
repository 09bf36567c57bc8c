use anyhow::Result;
use log::{error, info};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use viewerguard::config::ConfigChangeEvent;
use viewerguard::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables and initialize logging
    dotenv::dotenv().ok();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("Starting ViewerGuard v{}", viewerguard::VERSION);

    // =================================================================
    // CONFIGURATION
    // =================================================================

    let config_dir = env::var("VIEWERGUARD_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));
    let config_manager = ConfigurationManager::new(&config_dir);

    if let Err(e) = config_manager.initialize().await {
        error!("Failed to initialize configuration system: {}", e);
        return Err(e);
    }

    let detector_config = config_manager.get_detector_config().await;
    info!(
        "Watching channel {} ({}s windows every {}s), logging to {}",
        detector_config.channel_id,
        detector_config.collection_window_seconds,
        detector_config.cycle_interval_seconds,
        detector_config.log_file.display()
    );

    // =================================================================
    // COLLABORATORS
    // =================================================================

    let youtube_config = YouTubeConfig::from_env()?.with_max_page_results(detector_config.max_page_results);
    let youtube = Arc::new(YouTubeClient::new(youtube_config)?);
    let sink = Arc::new(JsonLogSink::new(&detector_config.log_file));
    let publisher = Arc::new(StatusPublisher::new(detector_config.channel_id.clone()));

    // Settings held by the collaborators themselves follow reloads here;
    // the scheduler picks up everything else at the start of each cycle
    let mut config_changes = config_manager.subscribe_to_changes();
    {
        let config_manager = config_manager.clone();
        let youtube = youtube.clone();
        let sink = sink.clone();
        tokio::spawn(async move {
            while let Ok(event) = config_changes.recv().await {
                match event {
                    ConfigChangeEvent::Reloaded { file } => {
                        let config = config_manager.get_detector_config().await;
                        youtube.set_max_page_results(config.max_page_results);
                        sink.set_path(&config.log_file).await;
                        info!("{} reloaded, changes apply from the next cycle", file)
                    }
                    ConfigChangeEvent::ValidationError { file, error } => {
                        error!("{} rejected, keeping previous settings: {}", file, error)
                    }
                }
            }
        });
    }

    // =================================================================
    // STATUS DISPLAY
    // =================================================================

    let mut status_receiver = publisher.subscribe();
    tokio::spawn(async move {
        while status_receiver.changed().await.is_ok() {
            let snapshot = status_receiver.borrow_and_update().clone();
            if snapshot.phase.is_busy() {
                continue;
            }

            let channel_name = snapshot
                .channel
                .as_ref()
                .map(|c| c.title.as_str())
                .unwrap_or("N/A");
            info!("[{}] {}", channel_name, snapshot.headline());

            match &snapshot.latest_record {
                Some(record) => info!(
                    "Total Viewers: {} | Estimated Real Viewers: {} | Estimated Bots: {} | Detected AI-like Bots: {} (as of {})",
                    record.concurrent_viewers,
                    record.estimate.estimated_real,
                    record.estimate.estimated_bot,
                    record.summary.automated_authors,
                    record.timestamp
                ),
                None => info!("Total Viewers: N/A | Estimated Real Viewers: N/A | Estimated Bots: N/A"),
            }
        }
    });

    // =================================================================
    // CYCLE LOOP
    // =================================================================

    let shutdown = ShutdownSignal::new();
    shutdown.start_signal_handlers();

    let scheduler = CycleScheduler::new(config_manager, youtube.clone(), youtube, sink, publisher);
    scheduler.run(shutdown).await;

    info!("ViewerGuard shutdown complete. Goodbye!");
    Ok(())
}
