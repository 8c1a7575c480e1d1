//! Release registry client.
//!
//! Fetches the latest-release metadata for the configured repository,
//! decodes it, and decides whether an installable update exists. One
//! network round trip per check; the selected asset is handed to the
//! session, never downloaded here.

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdateError};
use crate::transport;
use crate::version::Version;
use serde::Deserialize;
use tracing::{debug, info};

/// One downloadable artifact attached to a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    /// Asset filename (e.g. `"firmware.bin"`).
    pub name: String,
    /// Registry API download URL for the asset.
    pub url: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Registry-declared content digest (`"sha256:<hex>"`), when present.
    pub digest: Option<String>,
}

/// A newer release together with the asset resolved for this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUpdate {
    /// Version parsed from the release tag.
    pub version: Version,
    /// The asset matching the configured firmware filename.
    pub asset: ReleaseAsset,
}

/// Outcome of a successful release check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateAvailability {
    /// The latest published release is not newer than the running firmware.
    UpToDate {
        /// Version parsed from the latest release tag.
        latest: Version,
    },
    /// A newer release exists and its firmware asset was resolved.
    Available(ResolvedUpdate),
}

impl UpdateAvailability {
    /// Returns `true` when an installable update was resolved.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseWire {
    tag_name: Option<String>,
    assets: Option<Vec<AssetWire>>,
}

#[derive(Debug, Deserialize)]
struct AssetWire {
    name: String,
    url: String,
    #[serde(default)]
    size: u64,
    digest: Option<String>,
}

impl From<AssetWire> for ReleaseAsset {
    fn from(wire: AssetWire) -> Self {
        Self {
            name: wire.name,
            url: wire.url,
            size: wire.size,
            digest: wire.digest,
        }
    }
}

/// Client for the release registry's latest-release endpoint.
#[derive(Debug)]
pub struct ReleaseClient {
    registry_base: String,
    owner: String,
    repo: String,
    asset_name: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl ReleaseClient {
    /// Build a client from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::InvalidConfig`] when the configured trust
    /// anchors cannot be loaded.
    pub fn from_config(config: &UpdaterConfig) -> Result<Self> {
        Ok(Self {
            registry_base: config.registry_base().to_owned(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            asset_name: config.asset_name.clone(),
            token: config.token.clone(),
            agent: transport::http_agent(
                transport::METADATA_READ_TIMEOUT,
                config.ca_cert_pem.as_deref(),
            )?,
        })
    }

    /// URL of the latest-release metadata endpoint.
    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.registry_base, self.owner, self.repo
        )
    }

    /// Fetch the latest release and decide whether it should be offered.
    ///
    /// # Errors
    ///
    /// `TransportUnavailable` when the request cannot complete,
    /// `RegistryRequestFailed` on a non-success status,
    /// `ResponseMalformed` when the body cannot be interpreted, and
    /// `AssetNotFound` when a newer release has no matching asset.
    pub fn check_for_update(&self, current: Version) -> Result<UpdateAvailability> {
        let url = self.latest_release_url();
        debug!("fetching release metadata from {url}");

        let response = transport::prepare_request(&self.agent, &url, self.token.as_deref())
            .set("Accept", "application/vnd.github+json")
            .set("X-GitHub-Api-Version", "2022-11-28")
            .call()
            .map_err(|err| match err {
                ureq::Error::Status(status, _) => UpdateError::RegistryRequestFailed { status },
                ureq::Error::Transport(t) => UpdateError::TransportUnavailable(t.to_string()),
            })?;

        let body = response
            .into_string()
            .map_err(|e| UpdateError::TransportUnavailable(e.to_string()))?;
        let wire: ReleaseWire = serde_json::from_str(&body)
            .map_err(|e| UpdateError::ResponseMalformed(format!("JSON decode failed: {e}")))?;

        self.interpret(wire, current)
    }

    /// Decide the check outcome from decoded metadata.
    ///
    /// Field requirements are checked in pipeline order: the tag before the
    /// version comparison, the asset list only when the release is newer.
    fn interpret(&self, wire: ReleaseWire, current: Version) -> Result<UpdateAvailability> {
        let tag = wire
            .tag_name
            .ok_or_else(|| UpdateError::ResponseMalformed("missing tag_name".to_owned()))?;

        let latest = Version::parse(&tag);
        let cleaned = tag.trim();
        let cleaned = cleaned.strip_prefix('v').unwrap_or(cleaned);
        if latest == Version::ZERO && cleaned != "0.0.0" {
            // A tag the parser cannot read would otherwise masquerade as
            // version 0.0.0 and be reported as "up to date".
            return Err(UpdateError::ResponseMalformed(format!(
                "unparseable tag_name `{tag}`"
            )));
        }

        if latest <= current {
            info!("up to date: latest {latest} <= current {current}");
            return Ok(UpdateAvailability::UpToDate { latest });
        }

        let assets = wire
            .assets
            .ok_or_else(|| UpdateError::ResponseMalformed("missing assets".to_owned()))?;

        // First match in registry order wins.
        let asset = assets
            .into_iter()
            .find(|a| a.name == self.asset_name)
            .ok_or_else(|| UpdateError::AssetNotFound(self.asset_name.clone()))?;

        info!(
            "update available: {current} -> {latest}, asset `{}` ({} bytes)",
            asset.name, asset.size
        );
        Ok(UpdateAvailability::Available(ResolvedUpdate {
            version: latest,
            asset: asset.into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn client() -> ReleaseClient {
        ReleaseClient::from_config(&UpdaterConfig::new(
            "acme",
            "sensor-fw",
            "firmware.bin",
            "1.4.0",
        ))
        .unwrap()
    }

    fn asset(name: &str, url: &str, size: u64) -> AssetWire {
        AssetWire {
            name: name.to_owned(),
            url: url.to_owned(),
            size,
            digest: None,
        }
    }

    #[test]
    fn latest_release_url_shape() {
        assert_eq!(
            client().latest_release_url(),
            "https://api.github.com/repos/acme/sensor-fw/releases/latest"
        );
    }

    #[test]
    fn newer_release_resolves_matching_asset() {
        let wire = ReleaseWire {
            tag_name: Some("v2.0.0".to_owned()),
            assets: Some(vec![
                asset("bootloader.bin", "https://dl/boot", 512),
                asset("firmware.bin", "https://dl/fw", 1024),
            ]),
        };

        let outcome = client().interpret(wire, Version::new(1, 4, 0)).unwrap();
        let UpdateAvailability::Available(update) = outcome else {
            panic!("expected an available update");
        };
        assert_eq!(update.version, Version::new(2, 0, 0));
        assert_eq!(update.asset.name, "firmware.bin");
        assert_eq!(update.asset.url, "https://dl/fw");
        assert_eq!(update.asset.size, 1024);
    }

    #[test]
    fn first_matching_asset_wins() {
        let wire = ReleaseWire {
            tag_name: Some("v2.0.0".to_owned()),
            assets: Some(vec![
                asset("firmware.bin", "https://dl/first", 100),
                asset("firmware.bin", "https://dl/second", 200),
            ]),
        };

        let outcome = client().interpret(wire, Version::ZERO).unwrap();
        let UpdateAvailability::Available(update) = outcome else {
            panic!("expected an available update");
        };
        assert_eq!(update.asset.url, "https://dl/first");
    }

    #[test]
    fn equal_or_older_release_is_up_to_date_without_assets() {
        // No assets field at all: must not matter for the up-to-date path.
        let wire = ReleaseWire {
            tag_name: Some("v1.4.0".to_owned()),
            assets: None,
        };
        let outcome = client().interpret(wire, Version::new(1, 4, 0)).unwrap();
        assert_eq!(
            outcome,
            UpdateAvailability::UpToDate {
                latest: Version::new(1, 4, 0)
            }
        );
    }

    #[test]
    fn missing_tag_is_malformed() {
        let wire = ReleaseWire {
            tag_name: None,
            assets: Some(vec![]),
        };
        let err = client().interpret(wire, Version::ZERO).unwrap_err();
        assert!(matches!(err, UpdateError::ResponseMalformed(msg) if msg.contains("tag_name")));
    }

    #[test]
    fn unparseable_tag_is_malformed_not_up_to_date() {
        let wire = ReleaseWire {
            tag_name: Some("nightly".to_owned()),
            assets: Some(vec![]),
        };
        let err = client().interpret(wire, Version::new(1, 0, 0)).unwrap_err();
        assert!(matches!(err, UpdateError::ResponseMalformed(msg) if msg.contains("nightly")));
    }

    #[test]
    fn literal_zero_tag_is_accepted() {
        let wire = ReleaseWire {
            tag_name: Some("v0.0.0".to_owned()),
            assets: None,
        };
        let outcome = client().interpret(wire, Version::new(1, 0, 0)).unwrap();
        assert!(!outcome.is_available());
    }

    #[test]
    fn newer_release_without_assets_field_is_malformed() {
        let wire = ReleaseWire {
            tag_name: Some("v9.0.0".to_owned()),
            assets: None,
        };
        let err = client().interpret(wire, Version::new(1, 0, 0)).unwrap_err();
        assert!(matches!(err, UpdateError::ResponseMalformed(msg) if msg.contains("assets")));
    }

    #[test]
    fn no_matching_asset_name() {
        let wire = ReleaseWire {
            tag_name: Some("v2.0.0".to_owned()),
            assets: Some(vec![asset("other.bin", "https://dl/x", 10)]),
        };
        let err = client().interpret(wire, Version::ZERO).unwrap_err();
        assert_eq!(err, UpdateError::AssetNotFound("firmware.bin".to_owned()));
    }

    #[test]
    fn wire_decodes_registry_shape() {
        let body = r#"{
            "tag_name": "v2.0.0",
            "name": "Firmware 2.0.0",
            "assets": [
                {"name": "firmware.bin", "url": "https://api/assets/7",
                 "size": 1024, "digest": "sha256:abc", "content_type": "application/octet-stream"}
            ]
        }"#;
        let wire: ReleaseWire = serde_json::from_str(body).unwrap();
        assert_eq!(wire.tag_name.as_deref(), Some("v2.0.0"));
        let assets = wire.assets.unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].digest.as_deref(), Some("sha256:abc"));
    }
}
