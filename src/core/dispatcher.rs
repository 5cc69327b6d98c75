use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;
use crate::config::UploadConfig;
use crate::transport::HttpTransport;
use super::errors::{ConfigurationError, DispatchError, Result, TransportError};
use super::fields::AuxiliaryFields;
use super::file::FileSource;
use super::payload::MultipartPayload;
use super::traits::{SignalSender, Transport, TransportOutcome, TransportSignal, UploadRequest};
use super::types::{EventKind, ReadyState, TransferEvent, TransportResponse, UploadId, UploadState};

pub type EventCallback = Arc<dyn Fn(&TransferEvent) + Send + Sync>;

/// One optional callback per lifecycle event. All empty by default.
#[derive(Clone, Default)]
pub struct CallbackSlots {
    pub load_start: Option<EventCallback>,
    pub progress: Option<EventCallback>,
    pub abort: Option<EventCallback>,
    pub error: Option<EventCallback>,
    pub load: Option<EventCallback>,
    pub timeout: Option<EventCallback>,
    pub load_end: Option<EventCallback>,
    pub ready_state_change: Option<EventCallback>,
}

impl CallbackSlots {
    pub fn slot(&self, kind: EventKind) -> Option<&EventCallback> {
        match kind {
            EventKind::LoadStart => self.load_start.as_ref(),
            EventKind::Progress => self.progress.as_ref(),
            EventKind::Abort => self.abort.as_ref(),
            EventKind::Error => self.error.as_ref(),
            EventKind::Load => self.load.as_ref(),
            EventKind::Timeout => self.timeout.as_ref(),
            EventKind::LoadEnd => self.load_end.as_ref(),
            EventKind::ReadyStateChange => self.ready_state_change.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: EventKind) -> &mut Option<EventCallback> {
        match kind {
            EventKind::LoadStart => &mut self.load_start,
            EventKind::Progress => &mut self.progress,
            EventKind::Abort => &mut self.abort,
            EventKind::Error => &mut self.error,
            EventKind::Load => &mut self.load,
            EventKind::Timeout => &mut self.timeout,
            EventKind::LoadEnd => &mut self.load_end,
            EventKind::ReadyStateChange => &mut self.ready_state_change,
        }
    }

    pub fn set<F>(&mut self, kind: EventKind, callback: F) -> &mut Self
    where
        F: Fn(&TransferEvent) + Send + Sync + 'static,
    {
        *self.slot_mut(kind) = Some(Arc::new(callback));
        self
    }

    pub fn clear(&mut self, kind: EventKind) -> Option<EventCallback> {
        self.slot_mut(kind).take()
    }

    pub fn is_set(&self, kind: EventKind) -> bool {
        self.slot(kind).is_some()
    }
}

impl fmt::Debug for CallbackSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<&str> = EventKind::ALL
            .iter()
            .filter(|kind| self.is_set(**kind))
            .map(|kind| kind.as_str())
            .collect();
        f.debug_struct("CallbackSlots").field("set", &set).finish()
    }
}

/// Uploads one file per `send_file` call and forwards the transfer's
/// lifecycle events to the registered callbacks.
///
/// Configuration and callbacks belong to the instance. At most one upload
/// may be in flight per dispatcher; a second call while busy fails with
/// [`DispatchError::Busy`].
pub struct UploadDispatcher<T = HttpTransport> {
    config: UploadConfig,
    callbacks: CallbackSlots,
    transport: Arc<T>,
    in_flight: Arc<AtomicBool>,
}

impl UploadDispatcher<HttpTransport> {
    pub fn new(
        endpoint: impl Into<String>,
        file: impl Into<FileSource>,
        fields: impl Into<AuxiliaryFields>,
    ) -> Self {
        Self::from_config(UploadConfig::new(endpoint, file).with_fields(fields))
    }

    pub fn from_config(config: UploadConfig) -> Self {
        Self::with_transport(config, HttpTransport::default())
    }
}

impl<T: Transport + 'static> UploadDispatcher<T> {
    pub fn with_transport(config: UploadConfig, transport: T) -> Self {
        Self {
            config,
            callbacks: CallbackSlots::default(),
            transport: Arc::new(transport),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut UploadConfig {
        &mut self.config
    }

    pub fn callbacks(&self) -> &CallbackSlots {
        &self.callbacks
    }

    pub fn callbacks_mut(&mut self) -> &mut CallbackSlots {
        &mut self.callbacks
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    pub fn on<F>(mut self, kind: EventKind, callback: F) -> Self
    where
        F: Fn(&TransferEvent) + Send + Sync + 'static,
    {
        self.callbacks.set(kind, callback);
        self
    }

    pub fn on_load_start<F>(self, callback: F) -> Self
    where
        F: Fn(&TransferEvent) + Send + Sync + 'static,
    {
        self.on(EventKind::LoadStart, callback)
    }

    pub fn on_progress<F>(self, callback: F) -> Self
    where
        F: Fn(&TransferEvent) + Send + Sync + 'static,
    {
        self.on(EventKind::Progress, callback)
    }

    pub fn on_abort<F>(self, callback: F) -> Self
    where
        F: Fn(&TransferEvent) + Send + Sync + 'static,
    {
        self.on(EventKind::Abort, callback)
    }

    pub fn on_error<F>(self, callback: F) -> Self
    where
        F: Fn(&TransferEvent) + Send + Sync + 'static,
    {
        self.on(EventKind::Error, callback)
    }

    pub fn on_load<F>(self, callback: F) -> Self
    where
        F: Fn(&TransferEvent) + Send + Sync + 'static,
    {
        self.on(EventKind::Load, callback)
    }

    pub fn on_timeout<F>(self, callback: F) -> Self
    where
        F: Fn(&TransferEvent) + Send + Sync + 'static,
    {
        self.on(EventKind::Timeout, callback)
    }

    pub fn on_load_end<F>(self, callback: F) -> Self
    where
        F: Fn(&TransferEvent) + Send + Sync + 'static,
    {
        self.on(EventKind::LoadEnd, callback)
    }

    pub fn on_ready_state_change<F>(self, callback: F) -> Self
    where
        F: Fn(&TransferEvent) + Send + Sync + 'static,
    {
        self.on(EventKind::ReadyStateChange, callback)
    }

    fn endpoint(&self) -> std::result::Result<Url, ConfigurationError> {
        let endpoint = self.config.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigurationError::MissingEndpoint);
        }

        Url::parse(endpoint).map_err(|err| ConfigurationError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        })
    }

    /// Validates the configuration, assembles the payload and starts the
    /// upload in the background. Configuration problems are returned before
    /// anything touches the network; everything after that is reported
    /// through the callbacks.
    pub async fn send_file(&self) -> Result<UploadHandle> {
        let endpoint = self.endpoint()?;
        let file = self.config.file.resolve().await.inspect_err(|err| {
            if self.config.debug {
                tracing::debug!(source = ?self.config.file.path(), error = %err, "file can't be resolved");
            }
        })?;
        let guard = InFlightGuard::acquire(&self.in_flight).ok_or(DispatchError::Busy)?;

        let upload_id = UploadId::new();
        let payload = MultipartPayload::assemble(&self.config.fields, file, self.config.debug);
        if self.config.debug {
            tracing::debug!(%upload_id, %endpoint, parts = ?payload.names(), "sending file");
        }

        let request = UploadRequest {
            upload_id,
            endpoint,
            payload,
        };
        let (state_tx, state_rx) = watch::channel(UploadState::Idle);
        let session = Session::new(upload_id, self.callbacks.clone(), self.config.debug, state_tx);
        let transport = Arc::clone(&self.transport);

        let join = tokio::spawn(async move {
            let _guard = guard;
            session.run(&*transport, request).await
        });

        Ok(UploadHandle {
            upload_id,
            state: state_rx,
            join,
        })
    }
}

impl<T> fmt::Debug for UploadDispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadDispatcher")
            .field("config", &self.config)
            .field("callbacks", &self.callbacks)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish()
    }
}

struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Final result of one upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub upload_id: UploadId,
    /// The terminal state reached before `loadend`
    pub state: UploadState,
    pub response: Option<TransportResponse>,
    pub error: Option<TransportError>,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        self.state == UploadState::Loaded
            && self.response.as_ref().is_some_and(TransportResponse::is_success)
    }
}

/// Handle to an upload running in the background. Dropping it does not stop
/// the upload.
#[derive(Debug)]
pub struct UploadHandle {
    upload_id: UploadId,
    state: watch::Receiver<UploadState>,
    join: JoinHandle<UploadOutcome>,
}

impl UploadHandle {
    pub fn upload_id(&self) -> UploadId {
        self.upload_id
    }

    pub fn state(&self) -> UploadState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.state.clone()
    }

    /// Waits until `loadend` has been dispatched. A panic raised by a user
    /// callback resumes here.
    pub async fn wait(self) -> Result<UploadOutcome> {
        match self.join.await {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(DispatchError::Interrupted),
        }
    }
}

/// Drives one exchange: turns transport signals and the outcome into
/// lifecycle events, in order, on a single task.
struct Session {
    upload_id: UploadId,
    callbacks: CallbackSlots,
    debug: bool,
    state: watch::Sender<UploadState>,
    ready_state: ReadyState,
    loaded: u64,
    total: Option<u64>,
}

impl Session {
    fn new(
        upload_id: UploadId,
        callbacks: CallbackSlots,
        debug: bool,
        state: watch::Sender<UploadState>,
    ) -> Self {
        Self {
            upload_id,
            callbacks,
            debug,
            state,
            ready_state: ReadyState::Unsent,
            loaded: 0,
            total: None,
        }
    }

    async fn run<T: Transport + ?Sized>(mut self, transport: &T, request: UploadRequest) -> UploadOutcome {
        self.total = Some(request.payload.file_size());
        self.ready_state = ReadyState::Opened;
        self.advance(UploadState::Sending);
        self.emit(&self.event(EventKind::LoadStart));

        let (signals, mut rx) = SignalSender::channel();
        let exchange = transport.send(request, signals);
        tokio::pin!(exchange);

        let outcome = loop {
            tokio::select! {
                biased;
                Some(signal) = rx.recv() => self.on_signal(signal),
                outcome = &mut exchange => break outcome,
            }
        };
        while let Ok(signal) = rx.try_recv() {
            self.on_signal(signal);
        }

        self.finish(outcome)
    }

    fn on_signal(&mut self, signal: TransportSignal) {
        match signal {
            TransportSignal::Progress { loaded, total } => {
                self.loaded = loaded;
                if total.is_some() {
                    self.total = total;
                }
                self.emit(&self.event(EventKind::Progress));
            }
            TransportSignal::ReadyState(state) => {
                // DONE is reserved for the end of the exchange
                if state <= self.ready_state || state == ReadyState::Done {
                    return;
                }
                self.ready_state = state;
                self.emit(&self.event(EventKind::ReadyStateChange));
            }
        }
    }

    fn finish(mut self, outcome: TransportOutcome) -> UploadOutcome {
        self.ready_state = ReadyState::Done;
        self.emit(&self.event(EventKind::ReadyStateChange));

        let (kind, state) = match &outcome {
            TransportOutcome::Loaded(_) => (EventKind::Load, UploadState::Loaded),
            TransportOutcome::Failed(_) => (EventKind::Error, UploadState::Errored),
            TransportOutcome::TimedOut => (EventKind::Timeout, UploadState::TimedOut),
            TransportOutcome::Aborted => (EventKind::Abort, UploadState::Aborted),
        };
        let (response, error) = match outcome {
            TransportOutcome::Loaded(response) => (Some(response), None),
            TransportOutcome::Failed(error) => (None, Some(error)),
            _ => (None, None),
        };

        let mut terminal = self.event(kind);
        terminal.response = response.clone();
        terminal.error = error.clone();
        self.advance(state);
        self.emit(&terminal);

        let mut end = self.event(EventKind::LoadEnd);
        end.response = response.clone();
        end.error = error.clone();
        self.emit(&end);
        self.advance(UploadState::Ended);

        UploadOutcome {
            upload_id: self.upload_id,
            state,
            response,
            error,
        }
    }

    fn event(&self, kind: EventKind) -> TransferEvent {
        let mut event = TransferEvent::new(self.upload_id, kind, self.ready_state);
        event.loaded = self.loaded;
        event.total = self.total;
        event
    }

    fn advance(&mut self, next: UploadState) {
        let current = *self.state.borrow();
        if !UploadState::is_valid_transition(current, next) {
            tracing::warn!(upload_id = %self.upload_id, ?current, ?next, "ignoring invalid upload state transition");
            return;
        }
        self.state.send_replace(next);
    }

    fn emit(&self, event: &TransferEvent) {
        if self.debug {
            tracing::debug!(upload_id = %self.upload_id, "running {}", event.kind);
        }

        if event.kind == EventKind::Error {
            tracing::error!(
                upload_id = %self.upload_id,
                error = ?event.error,
                ready_state = event.ready_state.code(),
                "An error occurred when transferring the file"
            );
        }

        if let Some(callback) = self.callbacks.slot(event.kind) {
            if self.debug {
                tracing::debug!(upload_id = %self.upload_id, "calling user callback for {}", event.kind);
            }
            callback(event);
        }
    }
}
