use thiserror::Error;

/// Problems with the upload setup, raised before any network activity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("missing endpoint")]
    MissingEndpoint,

    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        endpoint: String,
        reason: String,
    },

    #[error("missing file")]
    MissingFile,
}

/// Failures reported by the transport. Never returned from `send_file`,
/// only delivered through the `error` event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Body error: {0}")]
    Body(String),

    #[error("File error: {0}")]
    File(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_connect() {
            Self::Connect(message)
        } else if err.is_body() || err.is_decode() {
            Self::Body(message)
        } else {
            Self::Request(message)
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::File(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("An upload is already in flight on this dispatcher")]
    Busy,

    #[error("Upload task was interrupted")]
    Interrupted,

    #[error("IO error {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DispatchError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type Result<T, E = DispatchError> = std::result::Result<T, E>;
