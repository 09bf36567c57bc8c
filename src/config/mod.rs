// src/config/mod.rs - Detector configuration with hot-reload support

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Duration;

pub const CONFIG_FILE_NAME: &str = "detector.yaml";

/// Phrases typical of machine-generated chat text
pub const DEFAULT_AUTOMATED_PHRASES: &[&str] = &[
    "as an ai language model",
    "i am an ai",
    "according to my training",
    "i don't have personal opinions",
    "i cannot perform that action",
    "here is a summary",
    "i am not capable of",
    "my training data suggests",
    "based on your input",
    "as a machine",
    "i do not experience emotions",
    "i'm a bot",
    "i am here to assist",
    "in conclusion",
    "let me clarify",
    "i cannot browse the internet",
    "i apologize for the confusion",
    "thank you for your question",
];

/// Tunable constants for one detector deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfiguration {
    /// Channel whose live broadcast is watched
    pub channel_id: String,
    /// JSON log that receives one record per completed cycle
    pub log_file: PathBuf,
    pub collection_window_seconds: u64,
    pub cycle_interval_seconds: u64,
    /// Poll delay used when a chat page doesn't suggest one
    pub default_poll_delay_ms: u64,
    pub max_page_results: u32,
    /// Assumed fraction of viewers who chat at all
    pub lurker_factor: f64,
    /// Below this adjusted chat/viewer ratio the lurker extrapolation is skipped
    pub min_ratio_threshold: f64,
    /// Authors above this many messages in one window count as spammers
    pub suspicious_message_threshold: u64,
    pub automated_phrases: Vec<String>,
}

impl Default for DetectorConfiguration {
    fn default() -> Self {
        Self {
            channel_id: "UCoxFxZirbfLvy9tres71eSA".to_string(),
            log_file: PathBuf::from("stream_analysis_log.json"),
            collection_window_seconds: 30,
            cycle_interval_seconds: 60,
            default_poll_delay_ms: 2000,
            max_page_results: 200,
            lurker_factor: 0.25,
            min_ratio_threshold: 0.02,
            suspicious_message_threshold: 10,
            automated_phrases: DEFAULT_AUTOMATED_PHRASES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl DetectorConfiguration {
    pub fn collection_window(&self) -> Duration {
        Duration::from_secs(self.collection_window_seconds)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_seconds)
    }

    pub fn default_poll_delay(&self) -> Duration {
        Duration::from_millis(self.default_poll_delay_ms)
    }

    /// Apply `VIEWERGUARD_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(channel_id) = env::var("VIEWERGUARD_CHANNEL_ID") {
            if !channel_id.trim().is_empty() {
                debug!("Channel id overridden from environment");
                self.channel_id = channel_id.trim().to_string();
            }
        }

        if let Ok(log_file) = env::var("VIEWERGUARD_LOG_FILE") {
            if !log_file.trim().is_empty() {
                self.log_file = PathBuf::from(log_file.trim());
            }
        }
    }
}

/// Events broadcasted when configuration changes
#[derive(Debug, Clone)]
pub enum ConfigChangeEvent {
    Reloaded { file: String },
    ValidationError { file: String, error: String },
}

/// Configuration validation
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, config: &DetectorConfiguration) -> Result<()> {
        if config.channel_id.trim().is_empty() {
            return Err(anyhow::anyhow!("channel_id cannot be empty"));
        }

        if config.collection_window_seconds == 0 {
            return Err(anyhow::anyhow!("collection_window_seconds must be positive"));
        }

        if config.cycle_interval_seconds == 0 {
            return Err(anyhow::anyhow!("cycle_interval_seconds must be positive"));
        }

        if config.default_poll_delay_ms == 0 {
            return Err(anyhow::anyhow!("default_poll_delay_ms must be positive"));
        }

        if config.max_page_results == 0 {
            return Err(anyhow::anyhow!("max_page_results must be positive"));
        }

        if !(config.lurker_factor > 0.0 && config.lurker_factor <= 1.0) {
            return Err(anyhow::anyhow!(
                "lurker_factor must be in (0, 1], got {}",
                config.lurker_factor
            ));
        }

        if config.min_ratio_threshold.is_nan() || config.min_ratio_threshold < 0.0 {
            return Err(anyhow::anyhow!(
                "min_ratio_threshold must be non-negative, got {}",
                config.min_ratio_threshold
            ));
        }

        if config.automated_phrases.is_empty() {
            return Err(anyhow::anyhow!("automated_phrases cannot be empty"));
        }

        if let Some(index) = config.automated_phrases.iter().position(|p| p.trim().is_empty()) {
            return Err(anyhow::anyhow!("automated_phrases[{}] is empty", index));
        }

        Ok(())
    }
}

/// Loads, validates and hot-reloads the detector configuration file
#[derive(Clone)]
pub struct ConfigurationManager {
    config_dir: PathBuf,
    detector_config: Arc<RwLock<DetectorConfiguration>>,
    /// Kept alive for as long as the manager lives
    watchers: Arc<RwLock<Vec<RecommendedWatcher>>>,
    change_notifier: broadcast::Sender<ConfigChangeEvent>,
    validator: Arc<ConfigValidator>,
    last_reload: Arc<RwLock<std::time::Instant>>,
}

impl ConfigurationManager {
    /// Create a manager holding defaults; nothing is read until `initialize`
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self::build(config_dir.as_ref(), DetectorConfiguration::default())
    }

    /// Manager that serves a fixed configuration, without a backing file
    pub fn with_config(config: DetectorConfiguration) -> Self {
        Self::build(Path::new("."), config)
    }

    fn build(config_dir: &Path, config: DetectorConfiguration) -> Self {
        let (tx, _) = broadcast::channel(100);

        Self {
            config_dir: config_dir.to_path_buf(),
            detector_config: Arc::new(RwLock::new(config)),
            watchers: Arc::new(RwLock::new(Vec::new())),
            change_notifier: tx,
            validator: Arc::new(ConfigValidator::new()),
            last_reload: Arc::new(RwLock::new(std::time::Instant::now())),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Initialize configuration system
    pub async fn initialize(&self) -> Result<()> {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir).await?;
            info!("Created configuration directory: {}", self.config_dir.display());
        }

        if let Err(e) = self.load_detector_config().await {
            warn!("Failed to load detector config, using defaults: {}", e);
            self.create_default_config().await?;
        }

        self.setup_file_watcher().await?;

        info!("Configuration manager initialized successfully");
        Ok(())
    }

    async fn load_detector_config(&self) -> Result<()> {
        let config_path = self.config_path();
        if !config_path.exists() {
            return Err(anyhow::anyhow!("Detector config file not found"));
        }

        let config = Self::read_config(&config_path, &self.validator).await?;
        *self.detector_config.write().await = config;

        debug!("Loaded detector configuration from {}", config_path.display());
        Ok(())
    }

    async fn read_config(path: &Path, validator: &ConfigValidator) -> Result<DetectorConfiguration> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let mut config: DetectorConfiguration = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        config.apply_env_overrides();
        validator.validate(&config)?;

        Ok(config)
    }

    async fn create_default_config(&self) -> Result<()> {
        let config = DetectorConfiguration::default();

        let config_path = self.config_path();
        let content = serde_yaml::to_string(&config).context("Failed to serialize default config")?;
        fs::write(&config_path, content)
            .await
            .with_context(|| format!("Failed to write default config to: {}", config_path.display()))?;

        let mut effective = config;
        effective.apply_env_overrides();
        *self.detector_config.write().await = effective;

        info!("Created default detector configuration: {}", config_path.display());
        Ok(())
    }

    /// Reload on file modification; a bad edit keeps the previous configuration
    async fn setup_file_watcher(&self) -> Result<()> {
        let config_dir = self.config_dir.clone();
        let change_notifier = self.change_notifier.clone();
        let detector_config = self.detector_config.clone();
        let validator = self.validator.clone();
        let last_reload = self.last_reload.clone();

        let (tx, mut rx) = tokio::sync::mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                if let Err(e) = tx.blocking_send(event) {
                    error!("Failed to send file watch event: {}", e);
                }
            }
        })?;

        watcher.watch(&config_dir, RecursiveMode::NonRecursive)?;
        self.watchers.write().await.push(watcher);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if !matches!(event.kind, EventKind::Modify(_)) {
                    continue;
                }

                // Debounce rapid file changes
                {
                    let now = std::time::Instant::now();
                    let last = *last_reload.read().await;
                    if now.duration_since(last) < Duration::from_millis(500) {
                        continue;
                    }
                    *last_reload.write().await = now;
                }

                for path in event.paths {
                    let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };

                    if filename != CONFIG_FILE_NAME && filename != "detector.yml" {
                        debug!("Ignoring change to non-config file: {}", filename);
                        continue;
                    }

                    info!("Detector configuration file changed, reloading...");
                    match Self::read_config(&path, &validator).await {
                        Ok(config) => {
                            *detector_config.write().await = config;
                            let _ = change_notifier.send(ConfigChangeEvent::Reloaded {
                                file: filename.to_string(),
                            });
                        }
                        Err(e) => {
                            error!("Failed to reload detector config: {}", e);
                            let _ = change_notifier.send(ConfigChangeEvent::ValidationError {
                                file: filename.to_string(),
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }
        });

        info!("File watcher setup for hot-reloading");
        Ok(())
    }

    /// Snapshot of the current configuration
    pub async fn get_detector_config(&self) -> DetectorConfiguration {
        self.detector_config.read().await.clone()
    }

    pub fn subscribe_to_changes(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.change_notifier.subscribe()
    }

    /// Validate and persist a new configuration
    pub async fn save_detector_config(&self, config: DetectorConfiguration) -> Result<()> {
        self.validator.validate(&config)?;

        let config_path = self.config_path();
        let content = serde_yaml::to_string(&config)?;
        fs::write(&config_path, content).await?;

        *self.detector_config.write().await = config;
        info!("Saved detector configuration to {}", config_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_config_manager_initialization() {
        let temp_dir = tempdir().unwrap();
        let config_manager = ConfigurationManager::new(temp_dir.path());

        let result = config_manager.initialize().await;
        assert!(result.is_ok());

        assert!(temp_dir.path().join(CONFIG_FILE_NAME).exists());

        let config = config_manager.get_detector_config().await;
        assert_eq!(config.collection_window_seconds, 30);
        assert_eq!(config.cycle_interval_seconds, 60);
        assert_eq!(config.automated_phrases.len(), DEFAULT_AUTOMATED_PHRASES.len());
    }

    #[tokio::test]
    async fn test_loads_existing_file() {
        let temp_dir = tempdir().unwrap();
        let yaml = "channel_id: UCtest\ncollection_window_seconds: 10\nlurker_factor: 0.5\n";
        std::fs::write(temp_dir.path().join(CONFIG_FILE_NAME), yaml).unwrap();

        let config_manager = ConfigurationManager::new(temp_dir.path());
        config_manager.initialize().await.unwrap();

        let config = config_manager.get_detector_config().await;
        assert_eq!(config.collection_window_seconds, 10);
        assert_eq!(config.lurker_factor, 0.5);
        // Unspecified fields fall back to defaults
        assert_eq!(config.cycle_interval_seconds, 60);
        assert_eq!(config.suspicious_message_threshold, 10);
    }

    #[tokio::test]
    async fn test_invalid_file_replaced_with_defaults() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "lurker_factor: 0.0\n").unwrap();

        let config_manager = ConfigurationManager::new(temp_dir.path());
        config_manager.initialize().await.unwrap();

        let config = config_manager.get_detector_config().await;
        assert_eq!(config.lurker_factor, 0.25);
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_config() {
        let temp_dir = tempdir().unwrap();
        let config_manager = ConfigurationManager::new(temp_dir.path());
        config_manager.initialize().await.unwrap();

        let mut config = config_manager.get_detector_config().await;
        config.collection_window_seconds = 0;
        assert!(config_manager.save_detector_config(config).await.is_err());

        let mut config = config_manager.get_detector_config().await;
        config.min_ratio_threshold = 0.05;
        config_manager.save_detector_config(config).await.unwrap();
        assert_eq!(config_manager.get_detector_config().await.min_ratio_threshold, 0.05);
    }

    #[test]
    fn test_validator_rules() {
        let validator = ConfigValidator::new();
        assert!(validator.validate(&DetectorConfiguration::default()).is_ok());

        let mut config = DetectorConfiguration::default();
        config.lurker_factor = 1.5;
        assert!(validator.validate(&config).is_err());

        let mut config = DetectorConfiguration::default();
        config.automated_phrases.push("   ".to_string());
        assert!(validator.validate(&config).is_err());

        let mut config = DetectorConfiguration::default();
        config.channel_id = String::new();
        assert!(validator.validate(&config).is_err());

        let mut config = DetectorConfiguration::default();
        config.min_ratio_threshold = f64::NAN;
        assert!(validator.validate(&config).is_err());

        let mut config = DetectorConfiguration::default();
        config.default_poll_delay_ms = 0;
        assert!(validator.validate(&config).is_err());

        let mut config = DetectorConfiguration::default();
        config.automated_phrases.clear();
        assert!(validator.validate(&config).is_err());
    }
}
