use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;
use super::errors::TransportError;
use super::payload::MultipartPayload;
use super::types::{ReadyState, TransportResponse, UploadId};

/// One POST of an assembled payload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub upload_id: UploadId,
    pub endpoint: Url,
    pub payload: MultipartPayload,
}

/// How a transport exchange finished.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportOutcome {
    Loaded(TransportResponse),
    Failed(TransportError),
    TimedOut,
    Aborted,
}

/// Non-terminal notifications a transport reports while sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSignal {
    Progress { loaded: u64, total: Option<u64> },
    ReadyState(ReadyState),
}

/// Sending half handed to a transport. Signals sent after the dispatcher
/// has finished the exchange are dropped.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<TransportSignal>,
}

impl SignalSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn progress(&self, loaded: u64, total: Option<u64>) {
        let _ = self.tx.send(TransportSignal::Progress { loaded, total });
    }

    pub fn ready_state(&self, state: ReadyState) {
        let _ = self.tx.send(TransportSignal::ReadyState(state));
    }
}

/// The network seam. Implementations perform exactly one request and report
/// how it went; lifecycle events are derived from the signals and the outcome.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: UploadRequest, signals: SignalSender) -> TransportOutcome;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: UploadRequest, signals: SignalSender) -> TransportOutcome {
        (**self).send(request, signals).await
    }
}
