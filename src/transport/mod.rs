pub mod http;

pub use http::{DEFAULT_CHUNK_SIZE, HttpTransport, HttpTransportConfig};
