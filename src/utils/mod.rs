pub mod progress;

pub use progress::{ProgressStream, format_bytes, format_duration, format_speed};
