//! Per-author behavioural heuristics and the window summary built from them.
//!
//! An author is *suspicious* when they post more than the configured number of
//! messages in one window. An author is *automated* when any of three
//! independent signals fires: an automated-phrase hit, a distinct-message
//! ratio below one half, or more than five messages that are all longer than
//! fifteen characters and end in a period. Moderators and the channel owner
//! are never flagged.
//!
//! The automated rule is a plain OR over unrelated signals with no weighting,
//! so a very repetitive human chatter will be flagged too.

use std::collections::{HashMap, HashSet};

use crate::config::DetectorConfiguration;
use crate::types::{AuthorRecord, WindowSummary};

const MIN_DISTINCT_RATIO: f64 = 0.5;
const UNIFORM_PATTERN_MIN_MESSAGES: u64 = 5;
const UNIFORM_PATTERN_MIN_LENGTH: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierSettings {
    pub suspicious_message_threshold: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            suspicious_message_threshold: 10,
        }
    }
}

impl From<&DetectorConfiguration> for ClassifierSettings {
    fn from(config: &DetectorConfiguration) -> Self {
        Self {
            suspicious_message_threshold: config.suspicious_message_threshold,
        }
    }
}

/// Heuristic outcome for one author
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuthorVerdict {
    pub distinct_ratio: f64,
    pub is_spammer: bool,
    pub is_automated: bool,
}

/// Distinct messages over total messages, 1.0 for an author with no messages
pub fn distinct_ratio(messages: &[String]) -> f64 {
    if messages.is_empty() {
        return 1.0;
    }

    let distinct: HashSet<&str> = messages.iter().map(String::as_str).collect();
    distinct.len() as f64 / messages.len() as f64
}

fn has_uniform_long_sentences(record: &AuthorRecord) -> bool {
    record.message_count > UNIFORM_PATTERN_MIN_MESSAGES
        && record
            .messages
            .iter()
            .all(|m| m.chars().count() > UNIFORM_PATTERN_MIN_LENGTH && m.ends_with('.'))
}

pub fn assess_author(record: &AuthorRecord, settings: &ClassifierSettings) -> AuthorVerdict {
    let ratio = distinct_ratio(&record.messages);
    let exempt = record.is_exempt();

    let phrase_signal = record.phrase_hits > 0;
    let repetition_signal = ratio < MIN_DISTINCT_RATIO;
    let uniform_signal = has_uniform_long_sentences(record);

    AuthorVerdict {
        distinct_ratio: ratio,
        is_spammer: !exempt && record.message_count > settings.suspicious_message_threshold,
        is_automated: !exempt && (phrase_signal || repetition_signal || uniform_signal),
    }
}

/// Summarise a closed window. Pure; the input is left untouched.
pub fn classify(authors: &HashMap<String, AuthorRecord>, settings: &ClassifierSettings) -> WindowSummary {
    let unique_authors = authors.len() as u64;
    let mut total_messages = 0u64;
    let mut suspicious_authors = 0u64;
    let mut automated_authors = 0u64;

    for record in authors.values() {
        total_messages += record.message_count;

        let verdict = assess_author(record, settings);
        if verdict.is_spammer {
            suspicious_authors += 1;
        }
        if verdict.is_automated {
            automated_authors += 1;
        }
    }

    let average_messages_per_author = if unique_authors == 0 {
        0.0
    } else {
        total_messages as f64 / unique_authors as f64
    };

    WindowSummary {
        unique_authors,
        total_messages,
        average_messages_per_author,
        suspicious_authors,
        automated_authors,
    }
}
