//! Error types for the update pipeline.

/// Top-level error type for the update client.
///
/// Each variant is one failure kind of the check/install pipeline; the
/// `Display` impl is the human-readable description surfaced to callers.
/// The session keeps the last error it produced (see
/// [`UpdateSession::last_error`](crate::session::UpdateSession::last_error))
/// and fails closed until it is reset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpdateError {
    /// A construction parameter is missing, too long, or malformed.
    #[error("invalid updater config: {0}")]
    InvalidConfig(String),

    /// The network layer could not connect or the transfer broke off.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The release metadata endpoint answered with a non-success status.
    #[error("release registry request failed with status {status}")]
    RegistryRequestFailed {
        /// HTTP status code returned by the registry.
        status: u16,
    },

    /// The response could not be interpreted: JSON decode failure, or a
    /// required field or header is missing or invalid.
    #[error("malformed registry response: {0}")]
    ResponseMalformed(String),

    /// The release is newer but carries no asset with the configured name.
    #[error("release has no asset named `{0}`")]
    AssetNotFound(String),

    /// `install()` was called without a prior successful check that found
    /// an available update.
    #[error("no update pending; a successful check must come first")]
    NoUpdatePending,

    /// The asset download endpoint answered with a non-success status.
    #[error("firmware download rejected with status {status}")]
    DownloadRejected {
        /// HTTP status code returned by the download endpoint.
        status: u16,
    },

    /// The update storage sink refused to open (e.g. insufficient space).
    #[error("update storage rejected the image: {0}")]
    InstallRejected(String),

    /// Streaming or committing the image failed: write error, byte-count
    /// mismatch, digest mismatch, or finalize failure.
    #[error("install failed: {0}")]
    InstallFailed(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdateError>;
