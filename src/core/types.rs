use std::fmt;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use super::errors::TransportError;

/// Identifies one `send_file` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct UploadId(pub Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle events a transfer goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    LoadStart,
    Progress,
    Abort,
    Error,
    Load,
    Timeout,
    LoadEnd,
    ReadyStateChange,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::LoadStart,
        EventKind::Progress,
        EventKind::Abort,
        EventKind::Error,
        EventKind::Load,
        EventKind::Timeout,
        EventKind::LoadEnd,
        EventKind::ReadyStateChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::LoadStart => "loadstart",
            EventKind::Progress => "progress",
            EventKind::Abort => "abort",
            EventKind::Error => "error",
            EventKind::Load => "load",
            EventKind::Timeout => "timeout",
            EventKind::LoadEnd => "loadend",
            EventKind::ReadyStateChange => "readystatechange",
        }
    }

    /// True for the events that close the sending phase.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventKind::Abort | EventKind::Error | EventKind::Load | EventKind::Timeout
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request ready state, numbered the way browsers number it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    Unsent = 0,
    Opened = 1,
    HeadersReceived = 2,
    Loading = 3,
    Done = 4,
}

impl ReadyState {
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

/// Response captured when the exchange completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The event object handed to user callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferEvent {
    pub upload_id: UploadId,
    pub kind: EventKind,
    pub ready_state: ReadyState,
    /// Bytes of the file sent so far
    pub loaded: u64,
    pub total: Option<u64>,
    pub response: Option<TransportResponse>,
    pub error: Option<TransportError>,
    pub timestamp: DateTime<Utc>,
}

impl TransferEvent {
    pub fn new(upload_id: UploadId, kind: EventKind, ready_state: ReadyState) -> Self {
        Self {
            upload_id,
            kind,
            ready_state,
            loaded: 0,
            total: None,
            response: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn length_computable(&self) -> bool {
        self.total.is_some()
    }

    pub fn percentage(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(100.0),
            Some(total) => Some(self.loaded as f64 / total as f64 * 100.0),
            None => None,
        }
    }
}

/// State of a single `send_file` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum UploadState {
    Idle,
    Sending,
    Aborted,
    Errored,
    TimedOut,
    Loaded,
    Ended,
}

impl UploadState {
    pub fn is_valid_transition(from: UploadState, to: UploadState) -> bool {
        use UploadState::*;

        match (from, to) {
            (Idle, Sending) => true,
            (Sending, Aborted | Errored | TimedOut | Loaded) => true,
            (Aborted | Errored | TimedOut | Loaded, Ended) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Aborted | UploadState::Errored | UploadState::TimedOut | UploadState::Loaded
        )
    }
}

const _: fn() = || {
    fn assert_send<T: Send + Sync>() {}
    assert_send::<TransferEvent>();
    assert_send::<UploadState>();
};
