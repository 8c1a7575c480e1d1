//! Configuration for the update client.

use crate::error::{Result, UpdateError};
use serde::{Deserialize, Serialize};

/// Public GitHub REST API base, used when no other registry is configured.
pub const DEFAULT_REGISTRY_BASE: &str = "https://api.github.com";

/// Longest accepted repository owner name (the registry's own limit).
pub const MAX_OWNER_LEN: usize = 39;
/// Longest accepted repository name (the registry's own limit).
pub const MAX_REPO_LEN: usize = 100;
/// Longest accepted firmware asset filename.
pub const MAX_ASSET_NAME_LEN: usize = 255;
/// Longest accepted bearer token.
pub const MAX_TOKEN_LEN: usize = 255;

/// Construction parameters for an update session.
///
/// Embeds cleanly in a host application's config file via serde; all fields
/// default so partial configs deserialize. Validation happens once, at
/// session construction, where out-of-bounds values are rejected instead
/// of being silently truncated later.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Owner of the release repository (user or organization).
    pub owner: String,
    /// Name of the release repository.
    pub repo: String,
    /// Exact filename of the firmware asset attached to each release.
    pub asset_name: String,
    /// The currently-running firmware version, `"X.Y.Z"` or `"vX.Y.Z"`.
    pub current_version: String,
    /// Bearer token for private repositories. `None` = public repository.
    pub token: Option<String>,
    /// Release registry API base URL. Overridable for self-hosted
    /// registries and tests; defaults to [`DEFAULT_REGISTRY_BASE`].
    pub registry_base: Option<String>,
    /// PEM bundle of trust anchors for the registry connection. When set,
    /// exactly these certificates are trusted instead of the platform
    /// roots. `None` = platform trust.
    pub ca_cert_pem: Option<String>,
}

impl UpdaterConfig {
    /// Config for a public repository hosted on the default registry.
    pub fn new(owner: &str, repo: &str, asset_name: &str, current_version: &str) -> Self {
        Self {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            asset_name: asset_name.to_owned(),
            current_version: current_version.to_owned(),
            token: None,
            registry_base: None,
            ca_cert_pem: None,
        }
    }

    /// Attach a bearer token for a private repository.
    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_owned());
        self
    }

    /// Point the client at a different registry base URL.
    #[must_use]
    pub fn with_registry_base(mut self, base: &str) -> Self {
        self.registry_base = Some(base.to_owned());
        self
    }

    /// Pin the registry connection to the trust anchors in a PEM bundle.
    #[must_use]
    pub fn with_ca_cert_pem(mut self, pem: &str) -> Self {
        self.ca_cert_pem = Some(pem.to_owned());
        self
    }

    /// The effective registry base URL, without a trailing slash.
    pub fn registry_base(&self) -> &str {
        self.registry_base
            .as_deref()
            .unwrap_or(DEFAULT_REGISTRY_BASE)
            .trim_end_matches('/')
    }

    /// Check every field against its documented bounds.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        check_path_segment("owner", &self.owner, MAX_OWNER_LEN)?;
        check_path_segment("repo", &self.repo, MAX_REPO_LEN)?;

        if self.asset_name.is_empty() {
            return Err(UpdateError::InvalidConfig("asset_name is empty".to_owned()));
        }
        if self.asset_name.len() > MAX_ASSET_NAME_LEN {
            return Err(UpdateError::InvalidConfig(format!(
                "asset_name exceeds {MAX_ASSET_NAME_LEN} bytes"
            )));
        }
        if self.asset_name.contains('/') {
            return Err(UpdateError::InvalidConfig(
                "asset_name must be a bare filename".to_owned(),
            ));
        }

        if let Some(token) = &self.token {
            if token.is_empty() || token.len() > MAX_TOKEN_LEN {
                return Err(UpdateError::InvalidConfig(format!(
                    "token must be 1..={MAX_TOKEN_LEN} bytes"
                )));
            }
            if token.chars().any(char::is_whitespace) {
                return Err(UpdateError::InvalidConfig(
                    "token contains whitespace".to_owned(),
                ));
            }
        }

        let base = self.registry_base();
        if !base.starts_with("https://") && !base.starts_with("http://") {
            return Err(UpdateError::InvalidConfig(format!(
                "registry_base must be an http(s) URL, got `{base}`"
            )));
        }

        Ok(())
    }
}

/// Owner and repo become URL path segments; reject anything that would
/// change the request path.
fn check_path_segment(field: &str, value: &str, max_len: usize) -> Result<()> {
    if value.is_empty() {
        return Err(UpdateError::InvalidConfig(format!("{field} is empty")));
    }
    if value.len() > max_len {
        return Err(UpdateError::InvalidConfig(format!(
            "{field} exceeds {max_len} bytes"
        )));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(UpdateError::InvalidConfig(format!(
            "{field} contains characters outside [A-Za-z0-9._-]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn valid() -> UpdaterConfig {
        UpdaterConfig::new("acme", "sensor-fw", "firmware.bin", "1.4.0")
    }

    #[test]
    fn valid_config_passes() {
        valid().validate().unwrap();
    }

    #[test]
    fn token_and_base_builders() {
        let config = valid()
            .with_token("ghp_abc123")
            .with_registry_base("https://git.example.com/api/v3/");
        config.validate().unwrap();
        assert_eq!(config.registry_base(), "https://git.example.com/api/v3");
        assert_eq!(config.token.as_deref(), Some("ghp_abc123"));
    }

    #[test]
    fn default_registry_base_applies() {
        assert_eq!(valid().registry_base(), DEFAULT_REGISTRY_BASE);
    }

    #[test]
    fn empty_fields_rejected() {
        for broken in [
            UpdaterConfig::new("", "r", "a.bin", "1.0.0"),
            UpdaterConfig::new("o", "", "a.bin", "1.0.0"),
            UpdaterConfig::new("o", "r", "", "1.0.0"),
        ] {
            assert!(matches!(
                broken.validate(),
                Err(UpdateError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn overlong_fields_rejected() {
        let long_owner = "a".repeat(MAX_OWNER_LEN + 1);
        let config = UpdaterConfig::new(&long_owner, "r", "a.bin", "1.0.0");
        assert!(matches!(
            config.validate(),
            Err(UpdateError::InvalidConfig(msg)) if msg.contains("owner")
        ));
    }

    #[test]
    fn path_breaking_owner_rejected() {
        let config = UpdaterConfig::new("acme/evil", "r", "a.bin", "1.0.0");
        assert!(config.validate().is_err());
    }

    #[test]
    fn slash_in_asset_name_rejected() {
        let config = UpdaterConfig::new("o", "r", "dir/firmware.bin", "1.0.0");
        assert!(config.validate().is_err());
    }

    #[test]
    fn whitespace_token_rejected() {
        let config = valid().with_token("ghp abc");
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_http_registry_base_rejected() {
        let config = valid().with_registry_base("ftp://example.com");
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_from_partial_json() {
        let config: UpdaterConfig =
            serde_json::from_str(r#"{"owner":"acme","repo":"sensor-fw"}"#).unwrap();
        assert_eq!(config.owner, "acme");
        assert!(config.token.is_none());
        assert_eq!(config.registry_base(), DEFAULT_REGISTRY_BASE);
    }
}
