use super::{
    SslPolicy, TlsMetadata, VerifyMode,
    metadata::PeerCertificate,
    policy::default_provider,
    verifier::{ChainVerifier, NoVerifier},
};
use crate::endpoint::Endpoint;
use anyhow::{Context, Result, anyhow};
use rustls::{
    ClientConfig, Error as TlsError, ProtocolVersion, RootCertStore, pki_types::CertificateDer,
};
use std::{fmt, io, mem, sync::Arc, time::Duration};
use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};
use tokio_rustls::{TlsConnector, client::TlsStream};
use tracing::debug;

/// Default bound for the TCP connect and the TLS handshake
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens TCP connections and wraps them in TLS sessions
///
/// Both verification modes share the policy and the trust store, so the
/// only difference between a `VERIFY_PEER` and a `VERIFY_NONE` session is
/// the certificate verifier.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    policy: Arc<dyn SslPolicy>,
    roots: Arc<RootCertStore>,
    timeout: Duration,
}

impl ConnectionFactory {
    #[must_use]
    pub fn new(policy: Arc<dyn SslPolicy>, roots: RootCertStore, timeout: Duration) -> Self {
        Self {
            policy,
            roots: Arc::new(roots),
            timeout,
        }
    }

    /// Open a TCP connection to the endpoint and prepare a TLS session in
    /// the given mode. The handshake is NOT performed.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection cannot be established (refused,
    /// timeout, DNS failure) or the TLS configuration cannot be built
    pub async fn connect(&self, endpoint: &Endpoint, mode: VerifyMode) -> Result<TlsSession> {
        let (config, verifier) = self.client_config(mode)?;

        debug!("connecting to {endpoint} ({mode})");
        let stream = timeout(
            self.timeout,
            TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
        )
        .await
        .map_err(|_| {
            anyhow!(
                "timed out after {}s connecting to {endpoint}",
                self.timeout.as_secs()
            )
        })?
        .with_context(|| format!("failed to connect to {endpoint}"))?;

        Ok(TlsSession {
            endpoint: endpoint.clone(),
            mode,
            connector: TlsConnector::from(Arc::new(config)),
            verifier,
            timeout: self.timeout,
            state: SessionState::Connected(stream),
        })
    }

    fn client_config(&self, mode: VerifyMode) -> Result<(ClientConfig, Option<ChainVerifier>)> {
        let provider = default_provider();
        let algorithms = provider.signature_verification_algorithms;
        let builder = self.policy.apply(provider)?.dangerous();

        Ok(match mode {
            VerifyMode::VerifyPeer => {
                let verifier = ChainVerifier::new(Arc::clone(&self.roots), algorithms);
                let config = builder
                    .with_custom_certificate_verifier(Arc::new(verifier.clone()))
                    .with_no_client_auth();
                (config, Some(verifier))
            }
            VerifyMode::VerifyNone => {
                let config = builder
                    .with_custom_certificate_verifier(Arc::new(NoVerifier))
                    .with_no_client_auth();
                (config, None)
            }
        })
    }
}

enum SessionState {
    Connected(TcpStream),
    Established(Box<TlsStream<TcpStream>>),
    Failed,
    Closed,
}

/// A TCP connection plus a verification mode
///
/// Dropping the session closes the socket.
pub struct TlsSession {
    endpoint: Endpoint,
    mode: VerifyMode,
    connector: TlsConnector,
    verifier: Option<ChainVerifier>,
    timeout: Duration,
    state: SessionState,
}

impl fmt::Debug for TlsSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            SessionState::Connected(_) => "connected",
            SessionState::Established(_) => "established",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.debug_struct("TlsSession")
            .field("endpoint", &self.endpoint)
            .field("mode", &self.mode)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

/// Why a TLS handshake did not complete
#[derive(Debug, Clone)]
pub enum HandshakeFailure {
    /// The peer certificate was rejected by the verifier
    Verification(TlsError),
    /// Any other protocol or I/O failure (alerts, resets, timeouts)
    Protocol(String),
}

impl HandshakeFailure {
    /// Check if the failure is a certificate verification error
    #[must_use]
    pub const fn is_verification(&self) -> bool {
        matches!(self, Self::Verification(_))
    }
}

impl fmt::Display for HandshakeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verification(err) => write!(f, "certificate verify failed: {err}"),
            Self::Protocol(err) => write!(f, "TLS handshake failed: {err}"),
        }
    }
}

impl TlsSession {
    #[must_use]
    pub const fn mode(&self) -> VerifyMode {
        self.mode
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Check if the handshake completed
    #[must_use]
    pub const fn is_established(&self) -> bool {
        matches!(self.state, SessionState::Established(_))
    }

    /// Perform the TLS handshake over the already open TCP connection
    ///
    /// Calling it again on an established session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`HandshakeFailure`] describing why the handshake failed; the
    /// session is unusable afterwards
    pub async fn handshake(&mut self) -> Result<(), HandshakeFailure> {
        let stream = match mem::replace(&mut self.state, SessionState::Failed) {
            SessionState::Connected(stream) => stream,
            SessionState::Established(stream) => {
                self.state = SessionState::Established(stream);
                return Ok(());
            }
            SessionState::Failed | SessionState::Closed => {
                return Err(HandshakeFailure::Protocol(
                    "session is no longer usable".to_string(),
                ));
            }
        };

        let server_name = self
            .endpoint
            .server_name()
            .map_err(|e| HandshakeFailure::Protocol(format!("{e:#}")))?;

        debug!("TLS handshake with {} ({})", self.endpoint, self.mode);
        let result = timeout(self.timeout, self.connector.connect(server_name, stream)).await;

        match result {
            Ok(Ok(tls_stream)) => {
                self.state = SessionState::Established(Box::new(tls_stream));
                Ok(())
            }
            Ok(Err(err)) => Err(self.classify(&err)),
            Err(_) => Err(HandshakeFailure::Protocol(format!(
                "timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    fn classify(&self, err: &io::Error) -> HandshakeFailure {
        if let Some(captured) = self.verifier.as_ref().and_then(ChainVerifier::last_error) {
            return HandshakeFailure::Verification(captured);
        }

        match err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<TlsError>())
        {
            Some(tls_err @ TlsError::InvalidCertificate(_)) => {
                HandshakeFailure::Verification(tls_err.clone())
            }
            Some(tls_err) => HandshakeFailure::Protocol(tls_err.to_string()),
            None => HandshakeFailure::Protocol(err.to_string()),
        }
    }

    /// Certificates presented by the peer, leaf first
    #[must_use]
    pub fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        match &self.state {
            SessionState::Established(stream) => stream.get_ref().1.peer_certificates(),
            _ => None,
        }
    }

    /// Negotiated protocol, cipher suite and leaf certificate of an
    /// established session
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not established, the peer sent no
    /// certificate or the leaf certificate cannot be parsed
    pub fn metadata(&self) -> Result<TlsMetadata> {
        let SessionState::Established(stream) = &self.state else {
            anyhow::bail!("TLS session with {} is not established", self.endpoint);
        };
        let (_, connection) = stream.get_ref();

        let leaf = self
            .peer_certificates()
            .and_then(<[CertificateDer<'static>]>::first)
            .context("server did not present a certificate")?;
        let peer = PeerCertificate::try_from(leaf)?;

        Ok(TlsMetadata {
            version: connection.protocol_version().map(protocol_name),
            cipher: connection
                .negotiated_cipher_suite()
                .map(|suite| format!("{:?}", suite.suite())),
            peer: Some(peer),
        })
    }

    /// Send `close_notify` and shut the connection down
    pub async fn close(&mut self) {
        match mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Established(mut stream) => {
                if let Err(e) = stream.shutdown().await {
                    debug!("error closing TLS session with {}: {e}", self.endpoint);
                }
            }
            SessionState::Connected(mut stream) => {
                let _ = stream.shutdown().await;
            }
            SessionState::Failed | SessionState::Closed => {}
        }
    }
}

fn protocol_name(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::tls::policy::DefaultPolicy;
    use rustls::CertificateError;

    fn factory() -> ConnectionFactory {
        ConnectionFactory::new(
            Arc::new(DefaultPolicy),
            RootCertStore::empty(),
            Duration::from_secs(2),
        )
    }

    #[test]
    fn test_client_config_both_modes() {
        let factory = factory();
        let (_, verifier) = factory.client_config(VerifyMode::VerifyPeer).unwrap();
        assert!(verifier.is_some());
        let (_, verifier) = factory.client_config(VerifyMode::VerifyNone).unwrap();
        assert!(verifier.is_none());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let port = std::net::TcpListener::bind(("127.0.0.1", 0))
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let endpoint = Endpoint::new("127.0.0.1", port).unwrap();
        let err = factory()
            .connect(&endpoint, VerifyMode::VerifyPeer)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to connect"));
    }

    #[test]
    fn test_protocol_name() {
        assert_eq!(protocol_name(ProtocolVersion::TLSv1_3), "TLSv1.3");
        assert_eq!(protocol_name(ProtocolVersion::TLSv1_2), "TLSv1.2");
    }

    #[test]
    fn test_handshake_failure_display() {
        let failure =
            HandshakeFailure::Verification(TlsError::InvalidCertificate(CertificateError::Expired));
        assert!(failure.is_verification());
        assert!(failure.to_string().starts_with("certificate verify failed"));

        let failure = HandshakeFailure::Protocol("connection reset".to_string());
        assert!(!failure.is_verification());
        assert!(failure.to_string().contains("connection reset"));
    }
}
