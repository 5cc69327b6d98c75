use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use charon::core::{SignalSender, TransportResponse, UploadRequest};
use charon::{
    AuxiliaryFields, ConfigurationError, DispatchError, EventKind, FileSource, InMemoryFile,
    TransferEvent, Transport, TransportError, TransportOutcome, UploadConfig, UploadDispatcher,
    UploadState, FILE_FIELD,
};
use serde_json::json;

/// Records every request and answers with a fixed outcome.
struct RecordingTransport {
    requests: Arc<Mutex<Vec<UploadRequest>>>,
    outcome: TransportOutcome,
}

impl RecordingTransport {
    fn new(outcome: TransportOutcome) -> (Self, Arc<Mutex<Vec<UploadRequest>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let transport = Self {
            requests: Arc::clone(&requests),
            outcome,
        };
        (transport, requests)
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: UploadRequest, signals: SignalSender) -> TransportOutcome {
        let total = request.payload.file_size();
        self.requests.lock().unwrap().push(request);
        signals.progress(total, Some(total));
        self.outcome.clone()
    }
}

fn loaded(status: u16, body: &'static str) -> TransportOutcome {
    TransportOutcome::Loaded(TransportResponse {
        status,
        content_type: None,
        body: body.into(),
    })
}

fn report() -> InMemoryFile {
    InMemoryFile::new("report.pdf", "%PDF-1.7 quarterly numbers").with_content_type("application/pdf")
}

#[tokio::test]
async fn test_sends_one_request_with_file_part() {
    let (transport, requests) = RecordingTransport::new(loaded(200, "ok"));
    let dispatcher = UploadDispatcher::with_transport(
        UploadConfig::new("https://api.example.com/upload", report()),
        transport,
    );

    dispatcher.send_file().await.unwrap().wait().await.unwrap();

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].endpoint.as_str(), "https://api.example.com/upload");

    let file = requests[0].payload.file().unwrap();
    assert_eq!(file.name, "report.pdf");
    assert_eq!(file.content_type.as_deref(), Some("application/pdf"));
    assert_eq!(file.read_all().await.unwrap(), "%PDF-1.7 quarterly numbers");
}

#[tokio::test]
async fn test_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.png");
    tokio::fs::write(&path, vec![0x89, b'P', b'N', b'G']).await.unwrap();

    let (transport, requests) = RecordingTransport::new(loaded(200, "ok"));
    let dispatcher = UploadDispatcher::with_transport(
        UploadConfig::new("https://api.example.com/upload", path),
        transport,
    );
    dispatcher.send_file().await.unwrap().wait().await.unwrap();

    let requests = requests.lock().unwrap();
    let file = requests[0].payload.file().unwrap();
    assert_eq!(file.name, "scan.png");
    assert_eq!(file.size, 4);
    assert_eq!(file.read_all().await.unwrap().as_ref(), &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_auxiliary_fields_precede_file_in_order() {
    let (transport, requests) = RecordingTransport::new(loaded(200, "ok"));
    let fields = json!({"owner": "alice", "folder": "finance", "draft": false, "note": null});
    let dispatcher = UploadDispatcher::with_transport(
        UploadConfig::new("https://api.example.com/upload", report()).with_fields(fields),
        transport,
    );

    dispatcher.send_file().await.unwrap().wait().await.unwrap();

    let requests = requests.lock().unwrap();
    let payload = &requests[0].payload;
    assert_eq!(payload.names(), vec!["owner", "folder", "draft", FILE_FIELD]);
    assert_eq!(payload.text("owner"), Some("alice"));
    assert_eq!(payload.text("draft"), Some("false"));
    assert_eq!(payload.text("note"), None);
}

#[tokio::test]
async fn test_array_fields_use_indices() {
    let (transport, requests) = RecordingTransport::new(loaded(200, "ok"));
    let dispatcher = UploadDispatcher::with_transport(
        UploadConfig::new("https://api.example.com/upload", report()).with_fields(json!(["x", "y"])),
        transport,
    );

    dispatcher.send_file().await.unwrap().wait().await.unwrap();

    let requests = requests.lock().unwrap();
    assert_eq!(requests[0].payload.names(), vec!["0", "1", FILE_FIELD]);
}

#[tokio::test]
async fn test_scalar_fields_send_only_the_file() {
    let (transport, requests) = RecordingTransport::new(loaded(200, "ok"));
    let dispatcher = UploadDispatcher::with_transport(
        UploadConfig::new("https://api.example.com/upload", report()).with_fields("owner=alice"),
        transport,
    )
    .debug(true);

    dispatcher.send_file().await.unwrap().wait().await.unwrap();

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].payload.names(), vec![FILE_FIELD]);
}

#[tokio::test]
async fn test_empty_endpoint_is_rejected_before_sending() {
    let (transport, requests) = RecordingTransport::new(loaded(200, "ok"));
    let dispatcher = UploadDispatcher::with_transport(UploadConfig::new("", report()), transport);

    let err = dispatcher.send_file().await.unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(err, DispatchError::Configuration(ConfigurationError::MissingEndpoint)));
    assert_eq!(err.to_string(), "Configuration error: missing endpoint");

    tokio::task::yield_now().await;
    assert!(requests.lock().unwrap().is_empty());
    assert!(!dispatcher.is_busy());
}

#[tokio::test]
async fn test_unselected_file_is_rejected_before_sending() {
    let (transport, requests) = RecordingTransport::new(loaded(200, "ok"));
    let mut dispatcher = UploadDispatcher::with_transport(
        UploadConfig::new("https://api.example.com/upload", FileSource::Unselected),
        transport,
    );

    let err = dispatcher.send_file().await.unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(ConfigurationError::MissingFile)));

    dispatcher.config_mut().file = FileSource::Path(PathBuf::from("/definitely/not/here.pdf"));
    let err = dispatcher.send_file().await.unwrap_err();
    assert!(matches!(err, DispatchError::Configuration(ConfigurationError::MissingFile)));

    tokio::task::yield_now().await;
    assert!(requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_error_without_callback_is_not_raised() {
    let (transport, _requests) = RecordingTransport::new(TransportOutcome::Failed(TransportError::Connect(
        "connection refused".to_string(),
    )));
    let ended = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&ended);
    let dispatcher = UploadDispatcher::with_transport(
        UploadConfig::new("https://api.example.com/upload", report()),
        transport,
    )
    .on_load_end(move |_| *flag.lock().unwrap() = true);

    assert!(!dispatcher.callbacks().is_set(EventKind::Error));
    let outcome = dispatcher.send_file().await.unwrap().wait().await.unwrap();

    assert_eq!(outcome.state, UploadState::Errored);
    assert_eq!(outcome.error, Some(TransportError::Connect("connection refused".to_string())));
    assert!(*ended.lock().unwrap());
}

#[tokio::test]
async fn test_unset_slots_are_skipped() {
    let (transport, _requests) = RecordingTransport::new(loaded(200, "ok"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut dispatcher = UploadDispatcher::with_transport(
        UploadConfig::new("https://api.example.com/upload", report()),
        transport,
    );
    dispatcher.callbacks_mut().set(EventKind::Progress, move |event| sink.lock().unwrap().push(event.kind));

    dispatcher.send_file().await.unwrap().wait().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![EventKind::Progress]);
}

#[tokio::test]
async fn test_positional_construction_uses_defaults() {
    let dispatcher = UploadDispatcher::new(
        "https://api.example.com/upload",
        report(),
        AuxiliaryFields::from_iter([("owner", "alice")]),
    );

    assert_eq!(dispatcher.config().endpoint, "https://api.example.com/upload");
    assert!(!dispatcher.config().debug);
    for kind in EventKind::ALL {
        assert!(!dispatcher.callbacks().is_set(kind));
    }
}

#[tokio::test]
async fn test_load_callback_receives_load_event() {
    let (transport, requests) = RecordingTransport::new(loaded(201, r#"{"id":"f-1"}"#));
    let recorded: Arc<Mutex<Option<TransferEvent>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&recorded);

    let config = UploadConfig {
        endpoint: "https://api.example.com/upload".to_string(),
        file: report().into(),
        fields: json!({"owner": "alice"}).into(),
        ..Default::default()
    };
    let dispatcher = UploadDispatcher::with_transport(config, transport)
        .on_load(move |event| *sink.lock().unwrap() = Some(event.clone()));

    let handle = dispatcher.send_file().await.unwrap();
    let upload_id = handle.upload_id();
    let outcome = handle.wait().await.unwrap();

    let event = recorded.lock().unwrap().clone().expect("load callback was not called");
    assert_eq!(event.kind, EventKind::Load);
    assert_eq!(event.upload_id, upload_id);
    assert_eq!(event.response, outcome.response);
    let response = event.response.unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(response.text(), r#"{"id":"f-1"}"#);

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].payload.len(), 2);
    assert_eq!(requests[0].payload.names(), vec!["owner", FILE_FIELD]);
}
