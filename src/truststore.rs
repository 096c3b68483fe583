//! Trust store scanner
//!
//! Every certificate file of the trust directory is checked on its own: it
//! must parse, be usable as a trust anchor and verify against a store that
//! holds nothing but itself. A bad file never aborts the scan.

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rustls::{RootCertStore, pki_types::CertificateDer};
use rustls_pemfile::certs;
use serde::Serialize;
use std::{
    io::Cursor,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{debug, warn};
use x509_parser::prelude::{FromDer, X509Certificate};

/// File extensions treated as certificates
pub const CERTIFICATE_EXTENSIONS: [&str; 4] = ["pem", "crt", "cer", "der"];

/// Outcome of checking one trusted certificate file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateCheckResult {
    pub path: PathBuf,
    /// `None` when the certificate is well-formed and self-verifiable
    pub error: Option<String>,
}

impl CertificateCheckResult {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Scan the trust directory, producing exactly one result per certificate file
///
/// An unset or missing directory yields no results: the system defaults are
/// used in that case. A directory that cannot be listed yields a single
/// failed result for the directory itself.
pub async fn scan(trust_dir: Option<&Path>) -> Vec<CertificateCheckResult> {
    let Some(dir) = trust_dir else {
        return Vec::new();
    };
    if !fs::try_exists(dir).await.unwrap_or(false) {
        debug!("trust directory {} does not exist", dir.display());
        return Vec::new();
    }

    let files = match certificate_files(dir).await {
        Ok(files) => files,
        Err(e) => {
            warn!("could not list trust directory {}: {e:#}", dir.display());
            return vec![CertificateCheckResult {
                path: dir.to_path_buf(),
                error: Some(format!("{e:#}")),
            }];
        }
    };

    let mut results = Vec::with_capacity(files.len());
    for path in files {
        results.push(check_file(&path).await);
    }
    results
}

/// Certificate files of a directory (non-recursive), sorted by path
///
/// # Errors
///
/// Returns an error if the directory cannot be read
pub async fn certificate_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to read directory {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to read directory {}", dir.display()))?
    {
        let path = entry.path();
        let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
        if is_file && has_certificate_extension(&path) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn has_certificate_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            CERTIFICATE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Check a single trusted certificate file
pub async fn check_file(path: &Path) -> CertificateCheckResult {
    let error = match read_certificates(path).await {
        Ok(certs) => certs
            .iter()
            .enumerate()
            .find_map(|(idx, cert)| {
                check_certificate(cert.as_ref()).err().map(|e| {
                    if certs.len() > 1 {
                        format!("certificate #{idx}: {e}")
                    } else {
                        e
                    }
                })
            }),
        Err(e) => Some(format!("{e:#}")),
    };

    if let Some(error) = &error {
        debug!("bad trusted certificate {}: {error}", path.display());
    }

    CertificateCheckResult {
        path: path.to_path_buf(),
        error,
    }
}

/// Read every certificate of a PEM bundle or a single DER certificate
///
/// # Errors
///
/// Returns an error if the file cannot be read, the PEM armour is broken or
/// no certificate is found
pub async fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let data = fs::read(path)
        .await
        .with_context(|| format!("failed to read certificate {}", path.display()))?;
    decode_certificates(data).with_context(|| format!("in {}", path.display()))
}

/// Decode PEM when the data carries PEM armour, DER otherwise
///
/// # Errors
///
/// Returns an error if the PEM armour is broken or holds no certificate
pub fn decode_certificates(data: Vec<u8>) -> Result<Vec<CertificateDer<'static>>> {
    if !is_pem(&data) {
        if data.is_empty() {
            anyhow::bail!("empty certificate file");
        }
        return Ok(vec![CertificateDer::from(data)]);
    }

    let mut reader = Cursor::new(data);
    let parsed = certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("invalid certificate PEM: {e}"))?;

    if parsed.is_empty() {
        anyhow::bail!("no certificates found in PEM data");
    }

    Ok(parsed)
}

fn is_pem(data: &[u8]) -> bool {
    data.windows(b"-----BEGIN".len())
        .any(|window| window == b"-----BEGIN")
}

/// Verify a certificate against a store containing only itself
///
/// # Errors
///
/// Returns a human readable cause when the certificate cannot be parsed, is
/// not usable as a trust anchor, is not self-issued, carries a bad
/// self-signature or is outside its validity window
pub fn check_certificate(der: &[u8]) -> Result<(), String> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| format!("failed to parse certificate: {e}"))?;

    let mut store = RootCertStore::empty();
    store
        .add(CertificateDer::from(der.to_vec()))
        .map_err(|e| format!("cannot be used as a trust anchor: {e}"))?;

    if cert.subject() != cert.issuer() {
        return Err(format!(
            "unable to get local issuer certificate (issuer: {})",
            cert.issuer()
        ));
    }

    cert.verify_signature(None)
        .map_err(|e| format!("certificate signature failure: {e}"))?;

    let now = Utc::now().timestamp();
    if now < cert.validity().not_before.timestamp() {
        return Err(format!(
            "certificate is not yet valid (not before {})",
            cert.validity().not_before
        ));
    }
    if now > cert.validity().not_after.timestamp() {
        return Err(format!(
            "certificate has expired (not after {})",
            cert.validity().not_after
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_has_certificate_extension() {
        assert!(has_certificate_extension(Path::new("/etc/ssl/ca.pem")));
        assert!(has_certificate_extension(Path::new("ca.CRT")));
        assert!(has_certificate_extension(Path::new("ca.cer")));
        assert!(has_certificate_extension(Path::new("ca.der")));
        assert!(!has_certificate_extension(Path::new("ca.key")));
        assert!(!has_certificate_extension(Path::new("README")));
    }

    #[test]
    fn test_is_pem() {
        assert!(is_pem(b"-----BEGIN CERTIFICATE-----\nAAAA\n"));
        assert!(is_pem(b"# comment\n-----BEGIN CERTIFICATE-----\n"));
        assert!(!is_pem(&[0x30, 0x82, 0x01, 0x0a]));
    }

    #[test]
    fn test_decode_truncated_pem() {
        let data = b"-----BEGIN CERTIFICATE-----\nMIIBszCCAVmgAwIBAgIU\n".to_vec();
        let err = decode_certificates(data).unwrap_err();
        assert!(err.to_string().contains("invalid certificate PEM"));
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode_certificates(Vec::new()).is_err());
    }

    #[test]
    fn test_check_certificate_garbage() {
        let err = check_certificate(b"garbage").unwrap_err();
        assert!(err.contains("failed to parse certificate"));
    }

    #[tokio::test]
    async fn test_scan_unset_dir() {
        assert!(scan(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_scan_missing_dir() {
        let results = scan(Some(Path::new("/nonexistent/tlsdoctor/trust"))).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_scan_unlistable_dir() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let results = scan(Some(file.path())).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, file.path());
        assert!(
            results[0]
                .error
                .as_deref()
                .unwrap()
                .contains("failed to read directory")
        );
    }

    #[test]
    fn test_check_result_is_ok() {
        let ok = CertificateCheckResult {
            path: PathBuf::from("good.pem"),
            error: None,
        };
        let bad = CertificateCheckResult {
            path: PathBuf::from("bad.pem"),
            error: Some("failed to parse certificate".to_string()),
        };
        assert!(ok.is_ok());
        assert!(!bad.is_ok());
    }
}
