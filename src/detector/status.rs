use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::types::{ChannelInfo, CyclePhase, CycleRecord, CycleStatus};

/// What a display needs to render the detector's current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub phase: CyclePhase,
    /// Outcome of the last finished cycle, `None` before the first one ends
    pub status: Option<CycleStatus>,
    pub updated_at: Option<DateTime<Local>>,
    pub channel_id: String,
    pub channel: Option<ChannelInfo>,
    /// Most recent successful record; kept while later cycles find no stream
    pub latest_record: Option<CycleRecord>,
}

impl StatusSnapshot {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            phase: CyclePhase::Idle,
            status: None,
            updated_at: None,
            channel_id: channel_id.into(),
            channel: None,
            latest_record: None,
        }
    }

    /// One-line summary for logs and simple displays
    pub fn headline(&self) -> String {
        if self.phase.is_busy() {
            return format!("Checking ({:?})", self.phase);
        }

        match (&self.status, self.updated_at) {
            (Some(status), Some(at)) => {
                format!("{} ({})", status.describe(), at.format("%Y-%m-%d %H:%M:%S"))
            }
            (Some(status), None) => status.describe(),
            _ => "Waiting for first cycle".to_string(),
        }
    }
}

/// Single producer side of the status hand-off. Consumers always see the latest value.
#[derive(Debug)]
pub struct StatusPublisher {
    sender: watch::Sender<StatusSnapshot>,
}

impl StatusPublisher {
    pub fn new(channel_id: impl Into<String>) -> Self {
        let (sender, _) = watch::channel(StatusSnapshot::new(channel_id));
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> StatusSnapshot {
        self.sender.borrow().clone()
    }

    pub fn set_phase(&self, phase: CyclePhase) {
        self.sender.send_if_modified(|snapshot| {
            if snapshot.phase == phase {
                return false;
            }
            snapshot.phase = phase;
            true
        });
    }

    /// Publish a finished cycle in one update. A `None` record leaves the
    /// previous record in place.
    pub fn publish_cycle(
        &self,
        channel_id: &str,
        channel: Option<ChannelInfo>,
        status: CycleStatus,
        record: Option<CycleRecord>,
    ) {
        self.sender.send_modify(|snapshot| {
            snapshot.phase = CyclePhase::Idle;
            snapshot.status = Some(status);
            snapshot.updated_at = Some(Local::now());
            if snapshot.channel_id != channel_id {
                snapshot.channel_id = channel_id.to_string();
                snapshot.latest_record = None;
            }
            if channel.is_some() {
                snapshot.channel = channel;
            }
            if record.is_some() {
                snapshot.latest_record = record;
            }
        });
    }
}
