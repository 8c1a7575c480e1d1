//! otalink: over-the-air firmware update client.
//!
//! Checks a release registry for a newer firmware build, resolves the
//! right binary asset, streams it into the device's update storage, and
//! reports a structured outcome.
//!
//! # Architecture
//!
//! The pipeline is a strictly sequential state machine owned by one
//! [`UpdateSession`]:
//! - **Check**: fetch latest-release metadata, compare semantic versions,
//!   resolve the firmware asset by exact filename
//! - **Install**: stream the image download→verify→commit into a
//!   [`FirmwareSink`] without buffering it in memory
//! - **Reboot**: hand off to the platform restart hook
//!
//! Failures are sticky: after any error the session fails closed until it
//! is reset or rebuilt, so a corrupted interaction is never retried into a
//! half-written image.
//!
//! ```no_run
//! use otalink::{FileSink, UpdaterConfig, UpdateSession};
//!
//! # fn main() -> otalink::Result<()> {
//! let config = UpdaterConfig::new("acme", "sensor-fw", "firmware.bin", "1.4.0");
//! let mut session = UpdateSession::new(config)?;
//!
//! if session.check()?.is_available() {
//!     let mut sink = FileSink::new("/data/firmware-staged.bin");
//!     session.install(&mut sink)?;
//!     session.reboot();
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod progress;
pub mod registry;
pub mod session;
pub mod storage;
pub mod version;

mod transport;

pub use config::UpdaterConfig;
pub use error::{Result, UpdateError};
pub use progress::{ProgressCallback, ProgressEvent};
pub use registry::{ReleaseAsset, ReleaseClient, ResolvedUpdate, UpdateAvailability};
pub use session::{InstallPhase, RestartHook, UpdateSession};
pub use storage::{FileSink, FirmwareSink};
pub use version::Version;
