use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use rustls::pki_types::CertificateDer;
use serde::Serialize;
use x509_parser::{
    extensions::GeneralName,
    prelude::{FromDer, X509Certificate},
};

/// TLS connection metadata extracted after handshake
#[derive(Debug, Clone, Default, Serialize)]
pub struct TlsMetadata {
    /// TLS protocol version (e.g., "TLSv1.3")
    pub version: Option<String>,
    /// Cipher suite used (e.g., `TLS13_AES_256_GCM_SHA384`)
    pub cipher: Option<String>,
    /// Leaf certificate presented by the server
    pub peer: Option<PeerCertificate>,
}

/// Facts about a served certificate, read through a non-verifying session
#[derive(Debug, Clone, Default, Serialize)]
pub struct PeerCertificate {
    /// Certificate subject DN
    pub subject: String,
    /// Certificate issuer DN
    pub issuer: String,
    /// First Common Name of the subject, if any
    pub common_name: Option<String>,
    /// DNS names from the subject alternative name extension
    pub dns_names: Vec<String>,
    /// IP addresses from the subject alternative name extension
    pub ip_addresses: Vec<String>,
    pub self_issued: bool,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after: Option<DateTime<Utc>>,
    /// Days until certificate expiration (negative if expired)
    pub expiry_days: Option<i64>,
    /// PEM encoding, ready to be dropped into a trust directory
    #[serde(skip)]
    pub pem: String,
}

impl PeerCertificate {
    /// Extract certificate facts from a DER-encoded certificate
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be parsed
    pub fn from_der(cert_der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(cert_der)
            .map_err(|e| anyhow!("failed to parse certificate: {e}"))?;

        let subject = cert.subject().to_string();
        let issuer = cert.issuer().to_string();
        let (dns_names, ip_addresses) = subject_alt_names(&cert);

        let not_before = to_utc(cert.validity().not_before.timestamp());
        let not_after = to_utc(cert.validity().not_after.timestamp());
        let expiry_days = not_after.map(|not_after| (not_after - Utc::now()).num_days());

        Ok(Self {
            common_name: common_name(&cert),
            self_issued: cert.subject() == cert.issuer(),
            subject,
            issuer,
            dns_names,
            ip_addresses,
            not_before,
            not_after,
            expiry_days,
            pem: cert_to_pem(cert_der),
        })
    }

    /// Check if the certificate is outside its validity window
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.not_after.is_some_and(|not_after| Utc::now() > not_after)
    }
}

impl TryFrom<&CertificateDer<'_>> for PeerCertificate {
    type Error = anyhow::Error;

    fn try_from(cert: &CertificateDer<'_>) -> Result<Self> {
        Self::from_der(cert.as_ref())
    }
}

/// First Common Name of the certificate subject
///
/// Returns `None` when the subject has no CN or the CN is not a string
#[must_use]
pub fn common_name(cert: &X509Certificate<'_>) -> Option<String> {
    cert.subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(ToString::to_string)
}

/// DNS names and IP addresses of the subject alternative name extension
#[must_use]
pub fn subject_alt_names(cert: &X509Certificate<'_>) -> (Vec<String>, Vec<String>) {
    let mut dns_names = Vec::new();
    let mut ip_addresses = Vec::new();

    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(dns) => dns_names.push((*dns).to_string()),
                GeneralName::IPAddress(bytes) => {
                    if let Some(ip) = ip_from_bytes(bytes) {
                        ip_addresses.push(ip);
                    }
                }
                _ => {}
            }
        }
    }

    (dns_names, ip_addresses)
}

fn ip_from_bytes(bytes: &[u8]) -> Option<String> {
    if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
        return Some(std::net::Ipv4Addr::from(octets).to_string());
    }
    <[u8; 16]>::try_from(bytes)
        .ok()
        .map(|octets| std::net::Ipv6Addr::from(octets).to_string())
}

fn to_utc(timestamp: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
}

/// PEM armour for a DER certificate, 64 columns per line
#[must_use]
pub fn cert_to_pem(cert_der: &[u8]) -> String {
    let body = STANDARD.encode(cert_der);
    let mut out = String::from("-----BEGIN CERTIFICATE-----\n");
    for chunk in body.as_bytes().chunks(64) {
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out.push_str("-----END CERTIFICATE-----\n");
    out
}
