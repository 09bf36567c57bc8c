use async_trait::async_trait;

use crate::types::{ChannelInfo, ChatPage, DetectorResult, StreamState};

pub mod youtube;

/// Paginated access to a live chat
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch the next page of messages. `page_token` is the token returned by
    /// the previous page, passed through verbatim.
    async fn fetch_page(&self, chat_id: &str, page_token: Option<&str>) -> DetectorResult<ChatPage>;
}

/// Lookup of the broadcast a channel is currently running
#[async_trait]
pub trait StreamStateSource: Send + Sync {
    /// Id of the channel's current live broadcast, if any
    async fn find_active_stream(&self, channel_id: &str) -> DetectorResult<Option<String>>;

    /// Viewer count and chat handle for a broadcast
    async fn get_stream_state(&self, stream_id: &str) -> DetectorResult<Option<StreamState>>;

    /// Channel title and avatar
    async fn get_channel_info(&self, channel_id: &str) -> DetectorResult<Option<ChannelInfo>>;
}
