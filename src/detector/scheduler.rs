use chrono::Local;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::time::sleep;

use crate::config::{ConfigurationManager, DetectorConfiguration};
use crate::detector::classifier::{classify, ClassifierSettings};
use crate::detector::collector::{Lexicon, WindowCollector};
use crate::detector::estimator::{estimate, EstimatorSettings};
use crate::detector::shutdown::ShutdownSignal;
use crate::detector::status::StatusPublisher;
use crate::platforms::{MessageSource, StreamStateSource};
use crate::sink::RecordSink;
use crate::types::{ChannelInfo, CyclePhase, CycleRecord, CycleStatus, DetectorResult};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

enum CycleOutcome {
    NoStream,
    NoChat,
    Completed(CycleRecord),
}

/// Runs fetch, collect, classify, estimate and emit on a fixed interval.
///
/// One cycle at a time, one stage at a time. Errors never escape a cycle;
/// they become a `Failed` status and the loop carries on after the usual
/// interval.
pub struct CycleScheduler {
    config: ConfigurationManager,
    streams: Arc<dyn StreamStateSource>,
    messages: Arc<dyn MessageSource>,
    sink: Arc<dyn RecordSink>,
    publisher: Arc<StatusPublisher>,
}

impl CycleScheduler {
    pub fn new(
        config: ConfigurationManager,
        streams: Arc<dyn StreamStateSource>,
        messages: Arc<dyn MessageSource>,
        sink: Arc<dyn RecordSink>,
        publisher: Arc<StatusPublisher>,
    ) -> Self {
        Self {
            config,
            streams,
            messages,
            sink,
            publisher,
        }
    }

    pub fn publisher(&self) -> Arc<StatusPublisher> {
        Arc::clone(&self.publisher)
    }

    /// Run one full cycle and publish its outcome
    pub async fn run_cycle(&self) -> CycleStatus {
        // Fresh snapshot so config reloads apply from the next cycle on
        let config = self.config.get_detector_config().await;
        let mut channel = None;

        let (status, record) = match self.try_cycle(&config, &mut channel).await {
            Ok(CycleOutcome::NoStream) => {
                info!("No active live stream for channel {}", config.channel_id);
                (CycleStatus::NoStream, None)
            }
            Ok(CycleOutcome::NoChat) => {
                info!("Live stream for channel {} has no active chat", config.channel_id);
                (CycleStatus::NoChat, None)
            }
            Ok(CycleOutcome::Completed(record)) => {
                info!(
                    "Cycle complete for {}: {} viewers, ~{} real, ~{} bots ({} chatters, {} AI-like)",
                    record.video_id,
                    record.concurrent_viewers,
                    record.estimate.estimated_real,
                    record.estimate.estimated_bot,
                    record.summary.unique_authors,
                    record.summary.automated_authors
                );
                (CycleStatus::Succeeded, Some(record))
            }
            Err(e) => {
                error!("Cycle failed: {}", e);
                (CycleStatus::Failed(e.to_string()), None)
            }
        };

        self.publisher
            .publish_cycle(&config.channel_id, channel, status.clone(), record);
        status
    }

    async fn try_cycle(
        &self,
        config: &DetectorConfiguration,
        channel: &mut Option<ChannelInfo>,
    ) -> DetectorResult<CycleOutcome> {
        self.publisher.set_phase(CyclePhase::FetchingStreamState);

        *channel = self.streams.get_channel_info(&config.channel_id).await?;

        let Some(video_id) = self.streams.find_active_stream(&config.channel_id).await? else {
            return Ok(CycleOutcome::NoStream);
        };

        let Some(state) = self.streams.get_stream_state(&video_id).await? else {
            return Ok(CycleOutcome::NoChat);
        };

        let Some(chat_id) = state.active_chat_id.as_deref() else {
            return Ok(CycleOutcome::NoChat);
        };

        self.publisher.set_phase(CyclePhase::Collecting);
        debug!(
            "Collecting chat {} for {}s",
            chat_id, config.collection_window_seconds
        );
        let collector = WindowCollector::new(
            Lexicon::new(&config.automated_phrases),
            config.default_poll_delay(),
        );
        let authors = collector
            .collect(self.messages.as_ref(), chat_id, config.collection_window())
            .await?;

        self.publisher.set_phase(CyclePhase::Classifying);
        let summary = classify(&authors, &ClassifierSettings::from(config));
        drop(authors);

        self.publisher.set_phase(CyclePhase::Estimating);
        let estimate = estimate(state.concurrent_viewers, &summary, &EstimatorSettings::from(config));

        self.publisher.set_phase(CyclePhase::Emitting);
        let record = CycleRecord {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            channel_id: config.channel_id.clone(),
            video_id,
            concurrent_viewers: state.concurrent_viewers,
            summary,
            estimate,
        };
        self.sink.append(&record).await?;

        Ok(CycleOutcome::Completed(record))
    }

    /// Loop until shutdown. Shutdown is honoured between cycles only.
    pub async fn run(&self, shutdown: ShutdownSignal) {
        info!("Cycle scheduler started");

        while !shutdown.is_requested() {
            let status = self.run_cycle().await;
            let interval = self.config.get_detector_config().await.cycle_interval();
            debug!("Cycle finished with {:?}, next in {:?}", status, interval);

            tokio::select! {
                _ = sleep(interval) => {}
                _ = shutdown.wait() => break,
            }
        }

        info!("Cycle scheduler stopped");
    }
}
