//! Progress event types for the install pipeline.
//!
//! Callback-based reporting that decouples the download/commit logic from
//! presentation. Events are advisory and never affect control flow.

/// Progress events emitted while an update is installed.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The firmware transfer is about to start.
    DownloadStarted {
        /// Declared image size in bytes.
        total_bytes: u64,
    },

    /// A chunk was written to the sink.
    DownloadProgress {
        /// Bytes written to the sink so far.
        bytes_written: u64,
        /// Declared image size in bytes.
        total_bytes: u64,
    },

    /// The transfer is complete and the image is being committed.
    Committing,

    /// The image was committed; the device can be restarted.
    InstallComplete,
}

/// Callback type for receiving progress events.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;
