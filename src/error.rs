//! Error types for the capture analyser.
//!
//! Only [`SourceError`] and [`SinkError`] abort a run. [`FrameError`] is
//! absorbed per frame by the processing loop.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the frame source (capture file).
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("cannot open capture {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: pcap::Error,
    },

    #[error("unsupported datalink type {dlt} ({name}); expected 127 (Radiotap) or 105 (raw 802.11)")]
    UnsupportedDatalink { dlt: i32, name: &'static str },
}

/// Per-frame failures.  The frame is skipped and the run continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("not an 802.11 frame (missing wlan or radio sublayer)")]
    NotAWirelessFrame,

    #[error("malformed frame: {0}")]
    Decode(String),
}

/// Failures of the reporting sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sample serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fatal errors that end a run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

pub type Result<T, E = RunError> = std::result::Result<T, E>;
