//! Update session: the download→verify→commit pipeline and its state.
//!
//! One session covers one check/install/reboot sequence. Failures are
//! sticky: once an operation errors, both `check()` and `install()` refuse
//! to run until the session is reset or rebuilt, so a broken interaction is
//! never retried into a half-committed flash state.

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::registry::{ReleaseClient, ResolvedUpdate, UpdateAvailability};
use crate::storage::FirmwareSink;
use crate::transport;
use crate::version::Version;
use sha2::{Digest, Sha256};
use std::io::Read;
use tracing::{debug, info, warn};

/// Callback that asks the host platform to restart the device.
pub type RestartHook = Box<dyn Fn() + Send + Sync>;

/// Where the install pipeline currently stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstallPhase {
    /// No install attempted since construction or the last reset.
    #[default]
    Idle,
    /// Opening the firmware transfer.
    Requesting,
    /// Streaming the image into the sink.
    Streaming,
    /// Asking the sink to validate and commit the image.
    Committing,
    /// The image was committed; awaiting restart.
    Done,
    /// The pipeline failed; see the session's last error.
    Failed,
}

/// Drives one firmware update: check, install, reboot.
pub struct UpdateSession {
    current_version: Version,
    client: ReleaseClient,
    download_agent: ureq::Agent,
    token: Option<String>,
    resolved: Option<ResolvedUpdate>,
    last_error: Option<UpdateError>,
    phase: InstallPhase,
    progress: Option<ProgressCallback>,
    restart_hook: Option<RestartHook>,
}

impl std::fmt::Debug for UpdateSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSession")
            .field("current_version", &self.current_version)
            .field("client", &self.client)
            .field("download_agent", &self.download_agent)
            .field("token", &self.token)
            .field("resolved", &self.resolved)
            .field("last_error", &self.last_error)
            .field("phase", &self.phase)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .field("restart_hook", &self.restart_hook.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

impl UpdateSession {
    /// Build a session from construction parameters.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::InvalidConfig`] when a parameter is outside
    /// its documented bounds.
    pub fn new(config: UpdaterConfig) -> Result<Self> {
        config.validate()?;
        let current_version = Version::parse(&config.current_version);
        let client = ReleaseClient::from_config(&config)?;
        let download_agent = transport::http_agent(
            transport::DOWNLOAD_READ_TIMEOUT,
            config.ca_cert_pem.as_deref(),
        )?;
        Ok(Self {
            current_version,
            client,
            download_agent,
            token: config.token,
            resolved: None,
            last_error: None,
            phase: InstallPhase::Idle,
            progress: None,
            restart_hook: None,
        })
    }

    /// Attach a progress observer. Advisory only.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Attach the platform restart hook invoked by [`UpdateSession::reboot`].
    #[must_use]
    pub fn with_restart_hook(mut self, hook: RestartHook) -> Self {
        self.restart_hook = Some(hook);
        self
    }

    /// The firmware version this session was constructed with.
    pub fn current_version(&self) -> Version {
        self.current_version
    }

    /// The update resolved by the most recent successful check, if any.
    pub fn resolved_update(&self) -> Option<&ResolvedUpdate> {
        self.resolved.as_ref()
    }

    /// The last error any operation produced. Sticky until [`reset`].
    ///
    /// [`reset`]: UpdateSession::reset
    pub fn last_error(&self) -> Option<&UpdateError> {
        self.last_error.as_ref()
    }

    /// Current install pipeline phase.
    pub fn phase(&self) -> InstallPhase {
        self.phase
    }

    /// Clear the sticky error, the resolved update, and the phase, allowing
    /// a fresh check/install sequence on this session.
    pub fn reset(&mut self) {
        self.last_error = None;
        self.resolved = None;
        self.phase = InstallPhase::Idle;
    }

    /// Ask the registry whether a newer firmware build exists.
    ///
    /// Performs exactly one metadata round trip. On success the resolved
    /// update (if any) replaces whatever an earlier check resolved.
    ///
    /// # Errors
    ///
    /// Returns the sticky error without any network I/O when one is set;
    /// otherwise any [`ReleaseClient::check_for_update`] error, which also
    /// becomes the sticky error.
    pub fn check(&mut self) -> Result<UpdateAvailability> {
        if let Some(err) = &self.last_error {
            warn!("check refused, sticky error: {err}");
            return Err(err.clone());
        }

        self.resolved = None;
        match self.client.check_for_update(self.current_version) {
            Ok(outcome) => {
                if let UpdateAvailability::Available(update) = &outcome {
                    self.resolved = Some(update.clone());
                }
                Ok(outcome)
            }
            Err(err) => {
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Download the resolved update and stream it into `sink`.
    ///
    /// Requires a prior [`check`](UpdateSession::check) that returned an
    /// available update. The sink is exclusively borrowed for the duration
    /// of the call; the HTTP transfer is released on every exit path.
    ///
    /// # Errors
    ///
    /// The sticky error when one is set, [`UpdateError::NoUpdatePending`]
    /// without a resolved update, and otherwise the pipeline errors:
    /// `TransportUnavailable`, `DownloadRejected`, `ResponseMalformed`,
    /// `InstallRejected`, `InstallFailed`. Every failure becomes the
    /// sticky error.
    pub fn install(&mut self, sink: &mut dyn FirmwareSink) -> Result<()> {
        if let Some(err) = &self.last_error {
            warn!("install refused, sticky error: {err}");
            return Err(err.clone());
        }

        let Some(update) = self.resolved.clone() else {
            let err = UpdateError::NoUpdatePending;
            self.last_error = Some(err.clone());
            return Err(err);
        };

        let result = self.run_install(&update, sink);
        match &result {
            Ok(()) => self.phase = InstallPhase::Done,
            Err(err) => {
                self.last_error = Some(err.clone());
                self.phase = InstallPhase::Failed;
            }
        }
        result
    }

    /// Unconditionally request a platform restart.
    ///
    /// Call only after a successful install; the request itself cannot fail
    /// observably. Without a configured hook this only logs.
    pub fn reboot(&self) {
        if self.phase != InstallPhase::Done {
            warn!("reboot requested without a completed install");
        }
        match &self.restart_hook {
            Some(hook) => {
                info!("requesting platform restart");
                hook();
            }
            None => warn!("no restart hook configured, restart request dropped"),
        }
    }

    fn run_install(&mut self, update: &ResolvedUpdate, sink: &mut dyn FirmwareSink) -> Result<()> {
        self.phase = InstallPhase::Requesting;
        info!(
            "downloading firmware {} from {}",
            update.version, update.asset.url
        );

        let response = transport::prepare_request(
            &self.download_agent,
            &update.asset.url,
            self.token.as_deref(),
        )
        .set("Accept", "application/octet-stream")
        .set("Cache-Control", "no-cache")
        .call()
        .map_err(|err| match err {
            ureq::Error::Status(status, _) => UpdateError::DownloadRejected { status },
            ureq::Error::Transport(t) => UpdateError::TransportUnavailable(t.to_string()),
        })?;

        // The sink is sized from the declared length, so it must be known
        // before streaming begins.
        let total_bytes: u64 = response
            .header("Content-Length")
            .and_then(|v| v.parse().ok())
            .filter(|len| *len > 0)
            .ok_or_else(|| {
                UpdateError::ResponseMalformed(
                    "missing or non-positive Content-Length on firmware download".to_owned(),
                )
            })?;

        self.phase = InstallPhase::Streaming;
        sink.open(total_bytes)
            .map_err(|e| UpdateError::InstallRejected(e.to_string()))?;
        self.emit(ProgressEvent::DownloadStarted { total_bytes });

        let reader = response.into_reader();
        self.stream_to_sink(reader, total_bytes, update.asset.digest.as_deref(), sink)?;

        self.phase = InstallPhase::Committing;
        self.emit(ProgressEvent::Committing);
        sink.finalize()
            .map_err(|e| UpdateError::InstallFailed(format!("finalize failed: {e}")))?;

        self.emit(ProgressEvent::InstallComplete);
        info!("firmware {} installed", update.version);
        Ok(())
    }

    /// Copy the body into the sink chunk by chunk, verifying the byte count
    /// against the declared length and the content against the declared
    /// digest. The image is never buffered whole; device RAM is much
    /// smaller than firmware images. Aborts the sink on every failure so a
    /// partial image is never left looking valid.
    fn stream_to_sink(
        &self,
        mut reader: impl Read,
        total_bytes: u64,
        declared_digest: Option<&str>,
        sink: &mut dyn FirmwareSink,
    ) -> Result<()> {
        let mut hasher = Sha256::new();
        let mut written: u64 = 0;
        let mut buf = [0u8; 8192];

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    sink.abort();
                    return Err(UpdateError::InstallFailed(format!(
                        "read failed after {written} bytes: {e}"
                    )));
                }
            };

            let accepted = match sink.write(&buf[..n]) {
                Ok(a) => a,
                Err(e) => {
                    sink.abort();
                    return Err(UpdateError::InstallFailed(format!(
                        "sink write failed at {written} bytes: {e}"
                    )));
                }
            };
            if accepted != n {
                sink.abort();
                return Err(UpdateError::InstallFailed(format!(
                    "sink accepted {accepted} of {n} bytes"
                )));
            }

            hasher.update(&buf[..n]);
            written += n as u64;
            if written > total_bytes {
                sink.abort();
                return Err(UpdateError::InstallFailed(format!(
                    "stream exceeded declared length ({written} > {total_bytes})"
                )));
            }
            self.emit(ProgressEvent::DownloadProgress {
                bytes_written: written,
                total_bytes,
            });
        }

        if written != total_bytes {
            sink.abort();
            return Err(UpdateError::InstallFailed(format!(
                "short transfer: {written} of {total_bytes} bytes"
            )));
        }

        if let Some(declared) = declared_digest {
            if let Some(expected) = declared.strip_prefix("sha256:") {
                let computed = hex::encode(hasher.finalize());
                if !expected.eq_ignore_ascii_case(&computed) {
                    sink.abort();
                    return Err(UpdateError::InstallFailed(format!(
                        "image digest mismatch: registry declared {expected}, streamed {computed}"
                    )));
                }
                debug!("image digest verified ({computed})");
            } else {
                debug!("unsupported digest algorithm in `{declared}`, skipping verification");
            }
        }

        Ok(())
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.progress {
            callback(event);
        }
    }
}
