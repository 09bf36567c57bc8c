use log::{debug, warn};
use std::collections::HashMap;
use tokio::time::{sleep, Duration, Instant};

use crate::platforms::MessageSource;
use crate::types::{AuthorRecord, DetectorError, DetectorResult};

/// Phrase substrings associated with machine-generated chat text
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    phrases: Vec<String>,
}

impl Lexicon {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Case-insensitive substring test; `text` must already be lowercase
    pub fn matches(&self, text: &str) -> bool {
        self.phrases.iter().any(|phrase| text.contains(phrase.as_str()))
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

/// Drives a message source for one fixed wall-clock window
pub struct WindowCollector {
    lexicon: Lexicon,
    default_poll_delay: Duration,
}

impl WindowCollector {
    pub fn new(lexicon: Lexicon, default_poll_delay: Duration) -> Self {
        Self {
            lexicon,
            default_poll_delay,
        }
    }

    /// Poll `chat_id` until `duration` has elapsed and return what each author sent.
    ///
    /// The loop ends only on elapsed time; a missing continuation token just
    /// means the next request goes out without one. A malformed page counts as
    /// an empty page. Any other source error aborts the whole window.
    pub async fn collect(
        &self,
        source: &dyn MessageSource,
        chat_id: &str,
        duration: Duration,
    ) -> DetectorResult<HashMap<String, AuthorRecord>> {
        let mut authors: HashMap<String, AuthorRecord> = HashMap::new();
        let mut page_token: Option<String> = None;
        let deadline = Instant::now() + duration;
        let mut pages = 0u64;

        while Instant::now() < deadline {
            let delay = match source.fetch_page(chat_id, page_token.as_deref()).await {
                Ok(page) => {
                    pages += 1;
                    for message in &page.messages {
                        let lowered = message.text.to_lowercase();
                        let phrase_hit = self.lexicon.matches(&lowered);

                        authors
                            .entry(message.author_id.clone())
                            .or_insert_with(|| AuthorRecord::first_seen(message))
                            .record(lowered, phrase_hit);
                    }

                    page_token = page.next_token;
                    page.suggested_delay_ms
                        .map(Duration::from_millis)
                        .unwrap_or(self.default_poll_delay)
                }
                Err(DetectorError::MalformedPage(reason)) => {
                    warn!("Treating malformed chat page as empty: {}", reason);
                    self.default_poll_delay
                }
                Err(e) => return Err(e),
            };

            sleep(delay).await;
        }

        debug!(
            "Collection window closed after {} pages with {} authors",
            pages,
            authors.len()
        );
        Ok(authors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, ChatPage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted pages, then empty pages once the script runs out
    struct ScriptedSource {
        pages: Mutex<VecDeque<DetectorResult<ChatPage>>>,
        tokens_seen: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<DetectorResult<ChatPage>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                tokens_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MessageSource for ScriptedSource {
        async fn fetch_page(&self, _chat_id: &str, page_token: Option<&str>) -> DetectorResult<ChatPage> {
            self.tokens_seen.lock().unwrap().push(page_token.map(str::to_string));
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ChatPage::default()))
        }
    }

    fn msg(author: &str, text: &str) -> ChatMessage {
        ChatMessage {
            author_id: author.to_string(),
            author_display_name: author.to_uppercase(),
            is_moderator: false,
            is_owner: false,
            text: text.to_string(),
        }
    }

    fn page(messages: Vec<ChatMessage>, token: Option<&str>, delay_ms: Option<u64>) -> DetectorResult<ChatPage> {
        Ok(ChatPage {
            messages,
            next_token: token.map(str::to_string),
            suggested_delay_ms: delay_ms,
        })
    }

    fn collector() -> WindowCollector {
        WindowCollector::new(
            Lexicon::new(["As A Machine", "in conclusion"]),
            Duration::from_millis(2000),
        )
    }

    #[test]
    fn test_lexicon_lowercases_phrases() {
        let lexicon = Lexicon::new(["I'm A Bot", "  ", "Here Is A Summary"]);
        assert_eq!(lexicon.len(), 2);
        assert!(lexicon.matches("hello, i'm a bot!"));
        assert!(!lexicon.matches("hello friends"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accumulates_per_author() {
        let source = ScriptedSource::new(vec![
            page(
                vec![msg("a", "Hello"), msg("b", "AS A MACHINE, in conclusion")],
                Some("t1"),
                Some(1000),
            ),
            page(vec![msg("a", "Second")], Some("t2"), Some(1000)),
        ]);

        let authors = collector()
            .collect(&source, "chat", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(authors.len(), 2);
        let a = &authors["a"];
        assert_eq!(a.message_count, 2);
        assert_eq!(a.messages, vec!["hello", "second"]);
        assert_eq!(a.display_name, "A");

        // Two lexicon hits in one message count once
        let b = &authors["b"];
        assert_eq!(b.message_count, 1);
        assert_eq!(b.phrase_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_passed_verbatim_and_missing_token_keeps_polling() {
        let source = ScriptedSource::new(vec![
            page(vec![], Some("next-1"), Some(1000)),
            page(vec![], None, Some(1000)),
            page(vec![], Some("next-3"), Some(1000)),
        ]);

        collector()
            .collect(&source, "chat", Duration::from_millis(3500))
            .await
            .unwrap();

        let tokens = source.tokens_seen.lock().unwrap().clone();
        assert_eq!(
            tokens,
            vec![None, Some("next-1".to_string()), None, Some("next-3".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_runs_for_full_duration() {
        let source = ScriptedSource::new(vec![]);
        let start = Instant::now();

        let authors = collector()
            .collect(&source, "chat", Duration::from_secs(30))
            .await
            .unwrap();

        assert!(authors.is_empty());
        assert!(start.elapsed() >= Duration::from_secs(30));
        // Default delay of 2s over a 30s window
        assert_eq!(source.tokens_seen.lock().unwrap().len(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flags_captured_at_first_sight() {
        let mut first = msg("m", "hi");
        first.is_moderator = true;
        let later = msg("m", "hi again");

        let source = ScriptedSource::new(vec![page(vec![first, later], None, None)]);
        let authors = collector()
            .collect(&source, "chat", Duration::from_secs(1))
            .await
            .unwrap();

        assert!(authors["m"].is_moderator);
        assert_eq!(authors["m"].message_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_page_is_skipped() {
        let source = ScriptedSource::new(vec![
            page(vec![msg("a", "one")], Some("t1"), Some(500)),
            Err(DetectorError::malformed_page("missing items")),
            page(vec![msg("a", "two")], None, Some(500)),
        ]);

        let authors = collector()
            .collect(&source, "chat", Duration::from_secs(3))
            .await
            .unwrap();

        assert_eq!(authors["a"].message_count, 2);
        // The token from before the bad page is reused
        let tokens = source.tokens_seen.lock().unwrap().clone();
        assert_eq!(tokens[2], Some("t1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_failure_aborts_window() {
        let source = ScriptedSource::new(vec![
            page(vec![msg("a", "one")], None, Some(500)),
            Err(DetectorError::source_unavailable("quota exceeded")),
        ]);

        let result = collector()
            .collect(&source, "chat", Duration::from_secs(30))
            .await;

        assert!(matches!(result, Err(DetectorError::SourceUnavailable(_))));
    }
}
