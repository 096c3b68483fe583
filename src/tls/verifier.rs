use rustls::{
    CertificateError, DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme,
    client::{
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
        verify_server_cert_signed_by_trust_anchor,
    },
    crypto::{WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature},
    pki_types::{CertificateDer, ServerName, UnixTime},
    server::ParsedCertificate,
};
use std::{
    fmt,
    sync::{Arc, Mutex},
};

/// Chain-only certificate verifier used by the `VERIFY_PEER` session.
///
/// Validates the presented chain against the trust store and aborts the
/// handshake on failure. The server name is not matched here; hostname
/// verification runs after the handshake.
///
/// The last verification failure is kept for classifying the handshake error.
#[derive(Clone)]
pub struct ChainVerifier {
    roots: Arc<RootCertStore>,
    supported: WebPkiSupportedAlgorithms,
    captured: Arc<Mutex<Option<TlsError>>>,
}

impl fmt::Debug for ChainVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainVerifier")
            .field("roots", &self.roots.len())
            .field("captured", &self.captured)
            .finish_non_exhaustive()
    }
}

impl ChainVerifier {
    #[must_use]
    pub fn new(roots: Arc<RootCertStore>, supported: WebPkiSupportedAlgorithms) -> Self {
        Self {
            roots,
            supported,
            captured: Arc::new(Mutex::new(None)),
        }
    }

    /// Retrieve the error of the last rejected chain
    ///
    /// Returns `None` if no chain has been rejected (or none was presented yet)
    #[must_use]
    pub fn last_error(&self) -> Option<TlsError> {
        self.captured.lock().ok()?.clone()
    }

    fn verify_chain(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> Result<(), TlsError> {
        let cert = ParsedCertificate::try_from(end_entity)?;
        verify_server_cert_signed_by_trust_anchor(
            &cert,
            &self.roots,
            intermediates,
            now,
            self.supported.all,
        )
    }
}

impl ServerCertVerifier for ChainVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        match self.verify_chain(end_entity, intermediates, now) {
            Ok(()) => Ok(ServerCertVerified::assertion()),
            Err(err) => {
                if let Ok(mut captured) = self.captured.lock() {
                    *captured = Some(err.clone());
                }
                Err(err)
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(message, cert, dss, &self.supported)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(message, cert, dss, &self.supported)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.supported.supported_schemes()
    }
}

/// Custom certificate verifier that accepts any certificate without validation.
///
/// # Security Note
///
/// This verifier is **ONLY** used by the `VERIFY_NONE` session, whose single
/// purpose is to let the handshake complete so the served certificate
/// (issuer, subject, CN) can be inspected after the verifying session failed.
/// Nothing is ever sent over such a session.
#[derive(Debug)]
pub struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA1,
            SignatureScheme::ECDSA_SHA1_Legacy,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}

/// Certificate-level reason of a rejected chain, when there is one
#[must_use]
pub fn certificate_error(err: &TlsError) -> Option<&CertificateError> {
    match err {
        TlsError::InvalidCertificate(cert_error) => Some(cert_error),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::tls::policy::default_provider;

    fn chain_verifier() -> ChainVerifier {
        ChainVerifier::new(
            Arc::new(RootCertStore::empty()),
            default_provider().signature_verification_algorithms,
        )
    }

    #[test]
    fn test_last_error_initially_none() {
        assert!(chain_verifier().last_error().is_none());
    }

    #[test]
    fn test_chain_verifier_rejects_garbage() {
        let verifier = chain_verifier();
        let garbage = CertificateDer::from(vec![0x30, 0x03, 0x02, 0x01, 0x01]);
        let server_name = ServerName::try_from("example.com").unwrap();
        let result =
            verifier.verify_server_cert(&garbage, &[], &server_name, &[], UnixTime::now());
        assert!(result.is_err());
        assert!(verifier.last_error().is_some());
    }

    #[test]
    fn test_chain_verifier_schemes() {
        let schemes = chain_verifier().supported_verify_schemes();
        assert!(schemes.contains(&SignatureScheme::ECDSA_NISTP256_SHA256));
    }

    #[test]
    fn test_chain_verifier_debug() {
        let debug_str = format!("{:?}", chain_verifier());
        assert!(debug_str.contains("ChainVerifier"));
    }

    #[test]
    fn test_no_verifier_debug() {
        let verifier = NoVerifier;
        let debug_str = format!("{verifier:?}");
        assert!(debug_str.contains("NoVerifier"));
    }

    #[test]
    fn test_no_verifier_supported_schemes() {
        let verifier = NoVerifier;
        let schemes = verifier.supported_verify_schemes();
        assert!(!schemes.is_empty());
        assert!(schemes.contains(&SignatureScheme::RSA_PKCS1_SHA256));
        assert!(schemes.contains(&SignatureScheme::ED25519));
    }

    #[test]
    fn test_certificate_error() {
        let err = TlsError::InvalidCertificate(CertificateError::UnknownIssuer);
        assert_eq!(
            certificate_error(&err),
            Some(&CertificateError::UnknownIssuer)
        );
        assert!(certificate_error(&TlsError::HandshakeNotComplete).is_none());
    }
}
