//! HTTP agent construction and shared request preparation.
//!
//! Both request sites (release metadata and asset download) go through
//! [`prepare_request`] so the common headers stay in one place; each site
//! then adds the Accept/media-type headers it needs.

use crate::error::{Result, UpdateError};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const USER_AGENT: &str = concat!("otalink/", env!("CARGO_PKG_VERSION"));

/// How long to wait for a connection to be established.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read timeout for the small metadata response.
pub(crate) const METADATA_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Read timeout while streaming the firmware image. Generous: the whole
/// body is read through this agent on a possibly slow link.
pub(crate) const DOWNLOAD_READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Build a blocking agent with the given read timeout.
///
/// When `ca_cert_pem` is set, the agent trusts exactly the certificates in
/// that bundle instead of the platform roots (trust pinning for
/// self-hosted registries). Exceeding either timeout surfaces as a
/// transport error, not a distinct timeout kind.
pub(crate) fn http_agent(
    read_timeout: Duration,
    ca_cert_pem: Option<&str>,
) -> Result<ureq::Agent> {
    let mut builder = ureq::AgentBuilder::new()
        .timeout_connect(CONNECT_TIMEOUT)
        .timeout_read(read_timeout);

    if let Some(pem) = ca_cert_pem {
        builder = builder.tls_config(Arc::new(tls_config_from_pem(pem)?));
    }

    Ok(builder.build())
}

/// Start a GET request with the headers every call site needs: a
/// `User-Agent` (the registry rejects agent-less requests) and, when a
/// credential is configured, the bearer authorization.
pub(crate) fn prepare_request(
    agent: &ureq::Agent,
    url: &str,
    token: Option<&str>,
) -> ureq::Request {
    let mut request = agent.get(url).set("User-Agent", USER_AGENT);
    if let Some(token) = token {
        request = request.set("Authorization", &format!("Bearer {token}"));
    }
    request
}

/// TLS config whose root store holds exactly the certificates from `pem`.
fn tls_config_from_pem(pem: &str) -> Result<rustls::ClientConfig> {
    let mut roots = rustls::RootCertStore::empty();
    let mut added = 0usize;

    for cert in rustls_pemfile::certs(&mut pem.as_bytes()) {
        let cert = cert.map_err(|e| {
            UpdateError::InvalidConfig(format!("unreadable CA certificate: {e}"))
        })?;
        roots
            .add(cert)
            .map_err(|e| UpdateError::InvalidConfig(format!("rejected CA certificate: {e}")))?;
        added += 1;
    }

    if added == 0 {
        return Err(UpdateError::InvalidConfig(
            "ca_cert_pem contains no certificates".to_owned(),
        ));
    }

    Ok(rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth())
}
