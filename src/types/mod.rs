// src/types/mod.rs - Core values that flow between the detector stages

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single chat message as delivered by a message source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author_id: String,
    pub author_display_name: String,
    pub is_moderator: bool,
    pub is_owner: bool,
    pub text: String,
}

/// One page of chat messages plus the paging hints the source returned
#[derive(Debug, Clone, Default)]
pub struct ChatPage {
    pub messages: Vec<ChatMessage>,
    pub next_token: Option<String>,
    pub suggested_delay_ms: Option<u64>,
}

/// Live details of a broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    pub concurrent_viewers: u64,
    pub active_chat_id: Option<String>,
}

/// Channel metadata shown alongside the estimates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub title: String,
    pub thumbnail_url: Option<String>,
}

/// Everything observed about one author during a single collection window
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorRecord {
    pub author_id: String,
    pub display_name: String,
    pub message_count: u64,
    pub phrase_hits: u64,
    /// Lowercased message bodies in arrival order
    pub messages: Vec<String>,
    pub is_moderator: bool,
    pub is_owner: bool,
}

impl AuthorRecord {
    /// Start a record from the first message seen for an author.
    /// Moderator and owner flags are captured here and never re-read.
    pub fn first_seen(message: &ChatMessage) -> Self {
        Self {
            author_id: message.author_id.clone(),
            display_name: message.author_display_name.clone(),
            message_count: 0,
            phrase_hits: 0,
            messages: Vec::new(),
            is_moderator: message.is_moderator,
            is_owner: message.is_owner,
        }
    }

    /// Add one lowercased message body to the record
    pub fn record(&mut self, lowered_text: String, phrase_hit: bool) {
        self.message_count += 1;
        if phrase_hit {
            self.phrase_hits += 1;
        }
        self.messages.push(lowered_text);
    }

    pub fn is_exempt(&self) -> bool {
        self.is_moderator || self.is_owner
    }
}

/// Aggregate signals for one closed window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowSummary {
    #[serde(rename = "uniqueChatterCount")]
    pub unique_authors: u64,
    #[serde(rename = "totalMessagesCollected")]
    pub total_messages: u64,
    #[serde(rename = "averageMessagesPerChatter")]
    pub average_messages_per_author: f64,
    #[serde(rename = "potentiallySuspiciousChatters")]
    pub suspicious_authors: u64,
    #[serde(rename = "detectedAiLikeBots")]
    pub automated_authors: u64,
}

/// Genuine versus automated viewer split for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewerEstimate {
    #[serde(rename = "estimatedRealViewers")]
    pub estimated_real: u64,
    #[serde(rename = "estimatedBotViewers")]
    pub estimated_bot: u64,
    #[serde(rename = "rawChatToViewerRatio")]
    pub raw_ratio: f64,
    #[serde(rename = "adjustedChatToViewerRatio")]
    pub adjusted_ratio: f64,
}

/// The unit appended to the analysis log, one per completed window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleRecord {
    pub timestamp: String,
    pub channel_id: String,
    pub video_id: String,
    pub concurrent_viewers: u64,
    #[serde(flatten)]
    pub summary: WindowSummary,
    #[serde(flatten)]
    pub estimate: ViewerEstimate,
}

/// Outcome of the most recent cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CycleStatus {
    NoStream,
    NoChat,
    Failed(String),
    Succeeded,
}

impl CycleStatus {
    pub fn describe(&self) -> String {
        match self {
            CycleStatus::NoStream => "No active live stream.".to_string(),
            CycleStatus::NoChat => "Live stream has no active chat.".to_string(),
            CycleStatus::Failed(reason) => format!("Error: {}", reason),
            CycleStatus::Succeeded => "Analysis complete".to_string(),
        }
    }
}

/// Where the scheduler currently is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePhase {
    Idle,
    FetchingStreamState,
    Collecting,
    Classifying,
    Estimating,
    Emitting,
}

impl CyclePhase {
    pub fn is_busy(&self) -> bool {
        !matches!(self, CyclePhase::Idle)
    }
}

/// Errors raised by collaborators while a cycle is running
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Network or collaborator failure; the cycle is skipped
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// A page without the fields we expect; counted as an empty page
    #[error("malformed page: {0}")]
    MalformedPage(String),

    #[error("sink error: {0}")]
    Sink(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DetectorError {
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    pub fn malformed_page(msg: impl Into<String>) -> Self {
        Self::MalformedPage(msg.into())
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }
}

pub type DetectorResult<T> = Result<T, DetectorError>;
