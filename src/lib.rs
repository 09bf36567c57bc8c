//! # Live Stream Viewer Guard
//!
//! Periodically samples a broadcast's live chat, scores each chatter with a
//! handful of behavioural heuristics, and combines the result with the
//! reported concurrent-viewer count to estimate how much of the audience is
//! genuine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use viewerguard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigurationManager::new("config");
//!     config.initialize().await?;
//!     let detector_config = config.get_detector_config().await;
//!
//!     let youtube = Arc::new(YouTubeClient::new(YouTubeConfig::from_env()?)?);
//!     let sink = Arc::new(JsonLogSink::new(&detector_config.log_file));
//!     let publisher = Arc::new(StatusPublisher::new(detector_config.channel_id.clone()));
//!
//!     let scheduler = CycleScheduler::new(config, youtube.clone(), youtube, sink, publisher);
//!     scheduler.run(ShutdownSignal::new()).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod detector;
pub mod platforms;
pub mod sink;
pub mod types;

// Re-export commonly used items
pub mod prelude {
    pub use crate::config::{ConfigurationManager, DetectorConfiguration};
    pub use crate::detector::{
        classify, estimate, ClassifierSettings, CycleScheduler, EstimatorSettings, Lexicon,
        ShutdownSignal, StatusPublisher, StatusSnapshot, WindowCollector,
    };
    pub use crate::platforms::{
        youtube::{YouTubeClient, YouTubeConfig},
        MessageSource, StreamStateSource,
    };
    pub use crate::sink::{JsonLogSink, MemorySink, RecordSink};
    pub use crate::types::{
        AuthorRecord, ChatMessage, ChatPage, CyclePhase, CycleRecord, CycleStatus, DetectorError,
        DetectorResult, StreamState, ViewerEstimate, WindowSummary,
    };
    pub use anyhow::Result;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
