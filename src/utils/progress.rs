use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use crate::core::SignalSender;

pin_project! {
    /// Reports every chunk pulled from `inner` as a progress signal.
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        signals: SignalSender,
        loaded: u64,
        total: Option<u64>,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, signals: SignalSender, total: Option<u64>) -> Self {
        Self {
            inner,
            signals,
            loaded: 0,
            total,
        }
    }

    pub fn loaded(&self) -> u64 {
        self.loaded
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>,
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if !chunk.is_empty() {
                    *this.loaded += chunk.len() as u64;
                    this.signals.progress(*this.loaded, *this.total);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}

const BINARY_UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

/// Binary-prefixed size, whole bytes below 1 KiB.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let exponent = ((63 - bytes.leading_zeros()) / 10).min(BINARY_UNITS.len() as u32 - 1);
    let scaled = bytes as f64 / (1u64 << (exponent * 10)) as f64;
    format!("{scaled:.1} {}", BINARY_UNITS[exponent as usize])
}

/// Average rate of `bytes` sent over `elapsed`.
pub fn format_speed(bytes: u64, elapsed: Duration) -> String {
    let rate = bytes as f64 / elapsed.as_secs_f64().max(0.001);
    format!("{}/s", format_bytes(rate as u64))
}

/// Seconds with one decimal under a minute, clock style above.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match (secs / 3600, secs % 3600 / 60, secs % 60) {
        (0, 0, _) => format!("{:.1}s", duration.as_secs_f64()),
        (0, minutes, seconds) => format!("{minutes}:{seconds:02}"),
        (hours, minutes, seconds) => format!("{hours}:{minutes:02}:{seconds:02}"),
    }
}
