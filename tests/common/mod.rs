#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    date_time_ymd,
};
use rustls::{
    ServerConfig,
    pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer},
};
use std::{fs, path::Path, sync::Arc, time::Duration};
use tempfile::TempDir;
use tlsdoctor::{
    doctor::{self, DoctorOutcome},
    endpoint::Endpoint,
    tls::{ConnectionFactory, DefaultPolicy, TrustConfig, load_root_store},
};
use tokio::{io::AsyncReadExt, net::TcpListener, task::JoinHandle};
use tokio_rustls::TlsAcceptor;

/// A generated certificate with its private key
pub struct TestCert {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl TestCert {
    pub fn der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    pub fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivatePkcs8KeyDer::from(self.key.serialize_der()).into()
    }
}

fn params(cn: Option<&str>, names: &[&str]) -> CertificateParams {
    let mut params =
        CertificateParams::new(names.iter().map(ToString::to_string).collect::<Vec<_>>()).unwrap();
    let mut dn = DistinguishedName::new();
    if let Some(cn) = cn {
        dn.push(DnType::CommonName, cn);
    }
    params.distinguished_name = dn;
    params
}

/// Self-signed leaf certificate; `cn` is the subject CN, `names` the SAN entries
pub fn self_signed(cn: Option<&str>, names: &[&str]) -> TestCert {
    let key = KeyPair::generate().unwrap();
    let cert = params(cn, names).self_signed(&key).unwrap();
    TestCert { cert, key }
}

/// Self-signed certificate whose validity window ended in 2001
pub fn expired(cn: &str, names: &[&str]) -> TestCert {
    let key = KeyPair::generate().unwrap();
    let mut params = params(Some(cn), names);
    params.not_before = date_time_ymd(2000, 1, 1);
    params.not_after = date_time_ymd(2001, 1, 1);
    let cert = params.self_signed(&key).unwrap();
    TestCert { cert, key }
}

/// Self-signed certificate authority
pub fn certificate_authority(cn: &str) -> TestCert {
    let key = KeyPair::generate().unwrap();
    let mut params = params(Some(cn), &[]);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let cert = params.self_signed(&key).unwrap();
    TestCert { cert, key }
}

/// Leaf certificate issued by `ca`
pub fn issued_by(ca: &TestCert, cn: &str, names: &[&str]) -> TestCert {
    let key = KeyPair::generate().unwrap();
    let cert = params(Some(cn), names)
        .signed_by(&key, &ca.cert, &ca.key)
        .unwrap();
    TestCert { cert, key }
}

/// Leaf certificate issued by `ca` whose validity window ended in 2001
pub fn expired_issued_by(ca: &TestCert, cn: &str, names: &[&str]) -> TestCert {
    let key = KeyPair::generate().unwrap();
    let mut params = params(Some(cn), names);
    params.not_before = date_time_ymd(2000, 1, 1);
    params.not_after = date_time_ymd(2001, 1, 1);
    let cert = params.signed_by(&key, &ca.cert, &ca.key).unwrap();
    TestCert { cert, key }
}

/// Trust directory holding the given files
pub fn trust_dir(files: &[(&str, &[u8])]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, content) in files {
        fs::write(dir.path().join(name), content).unwrap();
    }
    dir
}

pub fn trust_config(dir: &Path) -> TrustConfig {
    TrustConfig {
        trust_dir: Some(dir.to_path_buf()),
        default_roots: false,
        ..TrustConfig::default()
    }
}

/// TLS server on 127.0.0.1 presenting `cert`
///
/// Every accepted connection is handshaken in its own task and kept open
/// until the client closes it.
pub async fn tls_server(cert: &TestCert) -> (Endpoint, JoinHandle<()>) {
    let config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(vec![cert.der()], cert.private_key())
    .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                // clients that reject the certificate abort the handshake
                if let Ok(mut tls) = acceptor.accept(stream).await {
                    let mut buf = [0u8; 64];
                    while matches!(tls.read(&mut buf).await, Ok(n) if n > 0) {}
                }
            });
        }
    });

    (Endpoint::new("127.0.0.1", port).unwrap(), handle)
}

/// Port with nothing listening on it
pub fn closed_port() -> u16 {
    std::net::TcpListener::bind(("127.0.0.1", 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Run a whole check with the default policy
pub async fn diagnose(endpoint: &Endpoint, trust: &TrustConfig) -> anyhow::Result<DoctorOutcome> {
    let roots = load_root_store(trust).await?;
    let factory = ConnectionFactory::new(Arc::new(DefaultPolicy), roots, Duration::from_secs(5));
    doctor::run(endpoint, trust, factory).await
}
