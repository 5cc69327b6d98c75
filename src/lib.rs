//! Single-file multipart uploads with per-event callbacks.
//!
//! An [`UploadDispatcher`] posts one file, plus optional form fields, to an
//! endpoint and forwards the transfer's lifecycle events (`loadstart`,
//! `progress`, `abort`, `error`, `load`, `timeout`, `loadend`,
//! `readystatechange`) to whichever callbacks are registered.

pub mod config;
pub mod core;
pub mod transport;
pub mod utils;

pub use config::{Settings, UploadConfig};

pub use crate::core::{
    AuxiliaryFields,
    CallbackSlots,
    ConfigurationError,
    DispatchError,
    EventKind,
    FileSource,
    InMemoryFile,
    ReadyState,
    Result,
    TransferEvent,
    Transport,
    TransportError,
    TransportOutcome,
    UploadDispatcher,
    UploadHandle,
    UploadOutcome,
    UploadState,
    FILE_FIELD,
};

pub use transport::{HttpTransport, HttpTransportConfig};
