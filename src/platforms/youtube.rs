use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::env;
use std::sync::atomic::{AtomicU32, Ordering};
use url::Url;

use crate::platforms::{MessageSource, StreamStateSource};
use crate::types::{ChannelInfo, ChatMessage, ChatPage, DetectorError, DetectorResult, StreamState};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3/";

/// YouTube API response structures
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
}

#[derive(Debug, Deserialize)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    #[serde(rename = "liveStreamingDetails", default)]
    live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct LiveStreamingDetails {
    // The API reports this count as a decimal string
    #[serde(rename = "concurrentViewers")]
    concurrent_viewers: Option<String>,
    #[serde(rename = "activeLiveChatId")]
    active_live_chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    snippet: ChannelSnippet,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
    #[serde(default)]
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct LiveChatResponse {
    // Items are decoded one by one so a single odd message doesn't cost the page
    #[serde(default)]
    items: Vec<serde_json::Value>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
    #[serde(rename = "pollingIntervalMillis")]
    polling_interval_millis: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LiveChatMessage {
    snippet: LiveChatMessageSnippet,
    #[serde(rename = "authorDetails")]
    author_details: AuthorDetails,
}

#[derive(Debug, Deserialize)]
struct LiveChatMessageSnippet {
    #[serde(rename = "displayMessage", default)]
    display_message: String,
}

#[derive(Debug, Deserialize)]
struct AuthorDetails {
    #[serde(rename = "channelId")]
    channel_id: String,
    #[serde(rename = "displayName")]
    display_name: String,
    #[serde(rename = "isChatModerator", default)]
    is_chat_moderator: bool,
    #[serde(rename = "isChatOwner", default)]
    is_chat_owner: bool,
}

/// Configuration for the YouTube Data API client
#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub api_key: String,
    /// `maxResults` requested per chat page
    pub max_page_results: u32,
}

impl YouTubeConfig {
    /// Load YouTube configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("YOUTUBE_API_KEY")
            .context("YOUTUBE_API_KEY environment variable not set")?;

        if api_key.trim().is_empty() {
            return Err(anyhow::anyhow!("YOUTUBE_API_KEY is empty"));
        }

        info!("Loaded YouTube API configuration");

        Ok(Self {
            api_key,
            max_page_results: 200,
        })
    }

    pub fn with_max_page_results(mut self, max_page_results: u32) -> Self {
        self.max_page_results = max_page_results;
        self
    }
}

/// Read-only YouTube Data API v3 client
pub struct YouTubeClient {
    config: YouTubeConfig,
    max_page_results: AtomicU32,
    http_client: reqwest::Client,
    base_url: Url,
}

impl YouTubeClient {
    pub fn new(config: YouTubeConfig) -> Result<Self> {
        Self::with_base_url(config, API_BASE)
    }

    /// Point the client at a different API root (proxies, recorded fixtures)
    pub fn with_base_url(config: YouTubeConfig, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid YouTube API base URL: {}", base_url))?;

        Ok(Self {
            max_page_results: AtomicU32::new(config.max_page_results),
            config,
            http_client: reqwest::Client::new(),
            base_url,
        })
    }

    /// Change `maxResults` for chat pages fetched from now on
    pub fn set_max_page_results(&self, max_page_results: u32) {
        let previous = self.max_page_results.swap(max_page_results, Ordering::Relaxed);
        if previous != max_page_results {
            info!("Chat page size changed from {} to {}", previous, max_page_results);
        }
    }

    fn chat_page_url(&self, chat_id: &str, page_token: Option<&str>) -> DetectorResult<Url> {
        let max_results = self.max_page_results.load(Ordering::Relaxed).to_string();
        let mut params = vec![
            ("liveChatId", chat_id),
            ("part", "snippet,authorDetails"),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        self.endpoint("liveChat/messages", &params)
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> DetectorResult<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| DetectorError::source_unavailable(format!("bad endpoint {}: {}", path, e)))?;

        {
            let mut query = url.query_pairs_mut();
            for (name, value) in params {
                query.append_pair(name, value);
            }
            query.append_pair("key", &self.config.api_key);
        }

        Ok(url)
    }

    /// GET an endpoint and decode its JSON body.
    /// Transport failures and non-2xx statuses are `SourceUnavailable`;
    /// a body that does not decode is `MalformedPage`.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> DetectorResult<T> {
        debug!("GET {}", url.path());

        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DetectorError::source_unavailable(format!("request to {} failed: {}", url.path(), e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DetectorError::source_unavailable(format!(
                "YouTube API error {}: {}",
                status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DetectorError::source_unavailable(format!("failed to read body: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| DetectorError::malformed_page(format!("{}: {}", url.path(), e)))
    }
}

/// Convert a raw chat item into our message format, if it carries the fields we need
fn convert_item(item: serde_json::Value) -> Option<ChatMessage> {
    match serde_json::from_value::<LiveChatMessage>(item) {
        Ok(yt_message) => Some(ChatMessage {
            author_id: yt_message.author_details.channel_id,
            author_display_name: yt_message.author_details.display_name,
            is_moderator: yt_message.author_details.is_chat_moderator,
            is_owner: yt_message.author_details.is_chat_owner,
            text: yt_message.snippet.display_message,
        }),
        Err(e) => {
            warn!("Skipping chat item without expected fields: {}", e);
            None
        }
    }
}

fn parse_stream_state(details: LiveStreamingDetails) -> DetectorResult<StreamState> {
    let concurrent_viewers = match details.concurrent_viewers {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| DetectorError::malformed_page(format!("invalid concurrentViewers: {}", raw)))?,
        None => 0,
    };

    Ok(StreamState {
        concurrent_viewers,
        active_chat_id: details.active_live_chat_id.filter(|id| !id.is_empty()),
    })
}

#[async_trait]
impl MessageSource for YouTubeClient {
    async fn fetch_page(&self, chat_id: &str, page_token: Option<&str>) -> DetectorResult<ChatPage> {
        let url = self.chat_page_url(chat_id, page_token)?;
        let response: LiveChatResponse = self.get_json(url).await?;

        let messages: Vec<ChatMessage> = response.items.into_iter().filter_map(convert_item).collect();
        debug!(
            "Polled {} chat messages (next token: {}, suggested delay: {:?}ms)",
            messages.len(),
            response.next_page_token.is_some(),
            response.polling_interval_millis
        );

        Ok(ChatPage {
            messages,
            next_token: response.next_page_token,
            suggested_delay_ms: response.polling_interval_millis,
        })
    }
}

#[async_trait]
impl StreamStateSource for YouTubeClient {
    async fn find_active_stream(&self, channel_id: &str) -> DetectorResult<Option<String>> {
        let url = self.endpoint(
            "search",
            &[
                ("part", "id"),
                ("channelId", channel_id),
                ("eventType", "live"),
                ("type", "video"),
                ("maxResults", "1"),
            ],
        )?;

        let response: ListResponse<SearchItem> = self.get_json(url).await?;
        Ok(response.items.into_iter().next().and_then(|item| item.id.video_id))
    }

    async fn get_stream_state(&self, stream_id: &str) -> DetectorResult<Option<StreamState>> {
        let url = self.endpoint(
            "videos",
            &[("part", "liveStreamingDetails,statistics"), ("id", stream_id)],
        )?;

        let response: ListResponse<VideoItem> = self.get_json(url).await?;
        match response.items.into_iter().next() {
            Some(video) => parse_stream_state(video.live_streaming_details.unwrap_or_default()).map(Some),
            None => Ok(None),
        }
    }

    async fn get_channel_info(&self, channel_id: &str) -> DetectorResult<Option<ChannelInfo>> {
        let url = self.endpoint("channels", &[("part", "snippet"), ("id", channel_id)])?;

        let response: ListResponse<ChannelItem> = self.get_json(url).await?;
        Ok(response.items.into_iter().next().map(|channel| ChannelInfo {
            title: channel.snippet.title,
            thumbnail_url: channel
                .snippet
                .thumbnails
                .and_then(|t| t.default)
                .map(|t| t.url),
        }))
    }
}
