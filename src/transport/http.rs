use std::time::Duration;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::{Deserialize, Serialize};
use crate::core::{
    MultipartPayload, PartValue, ReadyState, Result, SignalSender, Transport, TransportError,
    TransportOutcome, TransportResponse, UploadRequest,
};
use crate::utils::ProgressStream;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

fn serialize_duration<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpTransportConfig {
    /// Whole-request timeout, in seconds when read from a file
    #[serde(serialize_with = "serialize_duration", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// Read size for the file part, also the progress granularity
    pub chunk_size: usize,
    pub user_agent: Option<String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300), // 5 minutes
            chunk_size: DEFAULT_CHUNK_SIZE,
            user_agent: None,
        }
    }
}

/// Sends the payload as one multipart/form-data POST with reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    chunk_size: usize,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(config: &HttpTransportConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        Ok(Self {
            client: builder.build()?,
            chunk_size: config.chunk_size,
            timeout: Some(config.timeout),
        })
    }

    /// Wraps a caller-built client. Its timeout, if any, is not known here.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn build_form(
        &self,
        payload: MultipartPayload,
        signals: &SignalSender,
    ) -> std::result::Result<Form, TransportError> {
        let mut form = Form::new();

        for part in payload.into_parts() {
            form = match part.value {
                PartValue::Text(text) => form.text(part.name, text),
                PartValue::File(file) => {
                    let stream = file.byte_stream(self.chunk_size).await?;
                    let progress = ProgressStream::new(stream, signals.clone(), Some(file.size));
                    let file_part = Part::stream_with_length(Body::wrap_stream(progress), file.size)
                        .file_name(file.name.clone())
                        .mime_str(file.content_type_or_default())?;
                    form.part(part.name, file_part)
                }
            };
        }

        Ok(form)
    }
}

impl Default for HttpTransport {
    /// Same settings as `HttpTransportConfig::default()`.
    fn default() -> Self {
        let config = HttpTransportConfig::default();
        Self::new(&config).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "falling back to a client without timeout");
            Self::with_client(Client::new())
        })
    }
}

fn failure(err: reqwest::Error) -> TransportOutcome {
    if err.is_timeout() {
        TransportOutcome::TimedOut
    } else {
        TransportOutcome::Failed(err.into())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: UploadRequest, signals: SignalSender) -> TransportOutcome {
        let form = match self.build_form(request.payload, &signals).await {
            Ok(form) => form,
            Err(err) => return TransportOutcome::Failed(err),
        };

        let response = match self.client.post(request.endpoint).multipart(form).send().await {
            Ok(response) => response,
            Err(err) => return failure(err),
        };
        signals.ready_state(ReadyState::HeadersReceived);

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        signals.ready_state(ReadyState::Loading);
        match response.bytes().await {
            Ok(body) => TransportOutcome::Loaded(TransportResponse {
                status,
                content_type,
                body,
            }),
            Err(err) => failure(err),
        }
    }
}
