//! Diagnostic reporter
//!
//! A verifying session that failed its handshake exposes nothing about the
//! peer, so every report replays the connection through the non-verifying
//! session of the cache and reads the facts from there. None of the functions
//! below fail: when inspection is impossible the report says so.

use super::{
    help,
    report::{Configuration, DiagnosticReport},
};
use crate::{
    endpoint::Endpoint,
    tls::{
        HandshakeFailure, PeerCertificate, SessionCache, TlsMetadata, TrustConfig, VerifyMode,
        verifier::certificate_error,
    },
    truststore::CertificateCheckResult,
};
use anyhow::{Result, anyhow};
use rustls::CertificateError;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Complete a handshake on the non-verifying session and read its metadata
///
/// # Errors
///
/// Returns an error if the connection, the handshake or the certificate
/// parsing fails
pub async fn inspect(endpoint: &Endpoint, cache: &mut SessionCache) -> Result<TlsMetadata> {
    let session = cache.session(endpoint, VerifyMode::VerifyNone).await?;
    session.handshake().await.map_err(|e| anyhow!("{e}"))?;
    session.metadata()
}

async fn inspect_peer(
    endpoint: &Endpoint,
    cache: &mut SessionCache,
    report: &mut DiagnosticReport,
) -> (Option<TlsMetadata>, Option<PeerCertificate>) {
    match inspect(endpoint, cache).await {
        Ok(mut tls) => {
            let peer = tls.peer.take();
            (Some(tls), peer)
        }
        Err(e) => {
            warn!("could not inspect the certificate served by {endpoint}: {e:#}");
            report.detail(format!("unable to inspect the served certificate: {e:#}"));
            (None, None)
        }
    }
}

/// Report for a failed peer verification
pub async fn peer_verification(
    endpoint: &Endpoint,
    trust: &TrustConfig,
    cache: &mut SessionCache,
    failure: &HandshakeFailure,
) -> DiagnosticReport {
    let mut report = DiagnosticReport::new(format!(
        "could not verify the certificate of {endpoint}: {failure}"
    ));
    debug!("diagnosing peer verification failure: {failure}");

    let (tls, peer) = inspect_peer(endpoint, cache, &mut report).await;

    if let Some(peer) = &peer {
        report.detail(format!("issuer: {}", or_unknown(&peer.issuer)));
        report.detail(format!("subject: {}", or_unknown(&peer.subject)));
        report.detail(format!("self-signed: {}", peer.self_issued));
        if let (Some(not_before), Some(not_after)) = (peer.not_before, peer.not_after) {
            report.detail(format!(
                "valid: {} .. {}",
                not_before.to_rfc3339(),
                not_after.to_rfc3339()
            ));
        }
        if peer.is_expired() {
            let days = peer.expiry_days.map_or(0, i64::abs);
            report.detail(format!("expired {days} day(s) ago"));
        }
    } else {
        report.detail("issuer: unknown");
    }

    match failure {
        HandshakeFailure::Verification(error) => {
            if let Some(kind) = certificate_error(error) {
                help::certificate_error(&mut report, kind);
            }
        }
        HandshakeFailure::Protocol(_) => help::failed_handshake(&mut report, endpoint),
    }

    if let Some(peer) = peer {
        // only an unknown issuer is fixed by trusting the served certificate
        if unknown_issuer(failure) {
            let destination = suggested_path(trust, endpoint);
            help::trust_served_certificate(&mut report, peer.self_issued, destination.as_deref());
            report.suggested_path = destination;
        }
        report.certificate_pem = Some(peer.pem);
    }

    report.configuration = Configuration::capture(trust, tls.as_ref());
    report
}

fn unknown_issuer(failure: &HandshakeFailure) -> bool {
    match failure {
        HandshakeFailure::Verification(error) => {
            matches!(certificate_error(error), Some(CertificateError::UnknownIssuer))
        }
        HandshakeFailure::Protocol(_) => false,
    }
}

/// Report for a certificate that does not cover the requested host
pub async fn hostname_mismatch(
    endpoint: &Endpoint,
    trust: &TrustConfig,
    cache: &mut SessionCache,
) -> DiagnosticReport {
    let mut report = DiagnosticReport::new(format!(
        "the certificate of {endpoint} is not valid for the requested host"
    ));

    let (tls, peer) = inspect_peer(endpoint, cache, &mut report).await;

    report.detail(format!("host={}", endpoint.host));

    let cn = match &peer {
        Some(peer) => {
            if let Some(cn) = &peer.common_name {
                report.detail(format!("CN={cn}"));
            } else {
                report.detail(format!(
                    "no CN found in certificate subject '{}'",
                    or_unknown(&peer.subject)
                ));
            }
            for dns in &peer.dns_names {
                report.detail(format!("SAN DNS:{dns}"));
            }
            for ip in &peer.ip_addresses {
                report.detail(format!("SAN IP:{ip}"));
            }
            peer.common_name.clone()
        }
        None => {
            report.detail("CN=unknown");
            None
        }
    };

    help::cert_invalid_hostname(&mut report, endpoint, cn.as_deref());
    report.configuration = Configuration::capture(trust, tls.as_ref());
    report
}

/// Report for unusable files of the trust directory
#[must_use]
pub fn bad_certificates(trust: &TrustConfig, bad: &[CertificateCheckResult]) -> DiagnosticReport {
    let dir = trust
        .trust_dir
        .as_ref()
        .map_or_else(|| "(not set)".to_string(), |dir| dir.display().to_string());

    let mut report = DiagnosticReport::new(format!(
        "{} unusable certificate file(s) in trust directory {dir}",
        bad.len()
    ));

    for result in bad {
        report.detail(format!(
            "{}: {}",
            result.path.display(),
            result.error.as_deref().unwrap_or("unknown error")
        ));
    }

    help::bad_trusted_certificates(&mut report);
    report.configuration = Configuration::capture(trust, None);
    report
}

/// File the served certificate should be copied to
///
/// The trust directory is preferred, then the CA directory.
#[must_use]
pub fn suggested_path(trust: &TrustConfig, endpoint: &Endpoint) -> Option<PathBuf> {
    let dir = trust.trust_dir.as_ref().or(trust.ca_path.as_ref())?;
    let name: String = endpoint
        .host
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    Some(dir.join(format!("{name}.pem")))
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() { "unknown" } else { value }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::tls::{ConnectionFactory, DefaultPolicy};
    use rustls::{Error as TlsError, RootCertStore};
    use std::{sync::Arc, time::Duration};

    fn unreachable_endpoint() -> Endpoint {
        let port = std::net::TcpListener::bind(("127.0.0.1", 0))
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        Endpoint::new("127.0.0.1", port).unwrap()
    }

    fn cache() -> SessionCache {
        SessionCache::new(ConnectionFactory::new(
            Arc::new(DefaultPolicy),
            RootCertStore::empty(),
            Duration::from_secs(1),
        ))
    }

    #[test]
    fn test_suggested_path() {
        let endpoint = Endpoint::new("::1", 443).unwrap();
        let trust = TrustConfig {
            trust_dir: Some(PathBuf::from("/trust")),
            ..TrustConfig::default()
        };
        assert_eq!(
            suggested_path(&trust, &endpoint),
            Some(PathBuf::from("/trust/__1.pem"))
        );

        let endpoint = Endpoint::new("example.com", 443).unwrap();
        let trust = TrustConfig {
            ca_path: Some(PathBuf::from("/ca")),
            ..TrustConfig::default()
        };
        assert_eq!(
            suggested_path(&trust, &endpoint),
            Some(PathBuf::from("/ca/example.com.pem"))
        );

        assert!(suggested_path(&TrustConfig::default(), &endpoint).is_none());
    }

    #[test]
    fn test_bad_certificates() {
        let trust = TrustConfig {
            trust_dir: Some(PathBuf::from("/trust")),
            ..TrustConfig::default()
        };
        let bad = vec![CertificateCheckResult {
            path: PathBuf::from("/trust/broken.pem"),
            error: Some("invalid certificate PEM".to_string()),
        }];
        let report = bad_certificates(&trust, &bad);
        assert!(report.problem.starts_with("1 unusable"));
        assert_eq!(
            report.details,
            vec!["/trust/broken.pem: invalid certificate PEM".to_string()]
        );
        assert!(!report.help.is_empty());
    }

    #[test]
    fn test_unknown_issuer() {
        let failure = |error| HandshakeFailure::Verification(TlsError::InvalidCertificate(error));
        assert!(unknown_issuer(&failure(CertificateError::UnknownIssuer)));
        assert!(!unknown_issuer(&failure(CertificateError::Expired)));
        assert!(!unknown_issuer(&failure(CertificateError::BadSignature)));
        assert!(!unknown_issuer(&HandshakeFailure::Protocol("reset".to_string())));
    }

    #[tokio::test]
    async fn test_peer_verification_degrades_when_unreachable() {
        let endpoint = unreachable_endpoint();
        let failure = HandshakeFailure::Verification(TlsError::InvalidCertificate(
            CertificateError::UnknownIssuer,
        ));
        let report =
            peer_verification(&endpoint, &TrustConfig::default(), &mut cache(), &failure).await;

        assert!(report.problem.contains("could not verify"));
        assert!(report.details.iter().any(|d| d == "issuer: unknown"));
        assert!(
            report
                .details
                .iter()
                .any(|d| d.starts_with("unable to inspect"))
        );
        assert!(report.certificate_pem.is_none());
    }

    #[tokio::test]
    async fn test_hostname_mismatch_degrades_when_unreachable() {
        let endpoint = unreachable_endpoint();
        let report = hostname_mismatch(&endpoint, &TrustConfig::default(), &mut cache()).await;
        assert!(report.details.iter().any(|d| d == "host=127.0.0.1"));
        assert!(report.details.iter().any(|d| d == "CN=unknown"));
    }
}
