mod dispatcher;
mod errors;
mod fields;
mod file;
mod payload;
mod traits;
mod types;

pub use dispatcher::{CallbackSlots, EventCallback, UploadDispatcher, UploadHandle, UploadOutcome};
pub use errors::{ConfigurationError, DispatchError, Result, TransportError};
pub use fields::AuxiliaryFields;
pub use file::{DEFAULT_CONTENT_TYPE, FileSource, FileStream, InMemoryFile, ResolvedFile};
pub use payload::{FILE_FIELD, FormPart, MultipartPayload, PartValue};
pub use traits::{SignalSender, Transport, TransportOutcome, TransportSignal, UploadRequest};
pub use types::{EventKind, ReadyState, TransferEvent, TransportResponse, UploadId, UploadState};
