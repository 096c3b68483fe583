use anyhow::{Result, anyhow};
use rustls::{
    ClientConfig, ConfigBuilder, SupportedProtocolVersion, WantsVerifier,
    crypto::{CryptoProvider, ring},
    version::{TLS12, TLS13},
};
use std::{fmt, str::FromStr, sync::Arc};

/// Protocol/cipher configuration shared by the verifying and the
/// non-verifying session.
///
/// A policy only decides what may be negotiated; the verification mode is
/// set afterwards by the connection factory so both sessions differ in that
/// single aspect.
pub trait SslPolicy: fmt::Debug + Send + Sync {
    /// Apply the policy to a crypto provider, yielding a client config
    /// builder that still needs its certificate verifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy leaves nothing to negotiate
    fn apply(&self, provider: CryptoProvider) -> Result<ConfigBuilder<ClientConfig, WantsVerifier>>;
}

/// Protocol versions understood by the policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    Tls12,
    Tls13,
}

impl FromStr for TlsVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim_start_matches("tlsv").trim_start_matches("tls") {
            "1.2" | "12" => Ok(Self::Tls12),
            "1.3" | "13" => Ok(Self::Tls13),
            _ => Err(format!("Invalid TLS version: {s}")),
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tls12 => write!(f, "TLSv1.2"),
            Self::Tls13 => write!(f, "TLSv1.3"),
        }
    }
}

impl TlsVersion {
    fn supported(self) -> &'static SupportedProtocolVersion {
        match self {
            Self::Tls12 => &TLS12,
            Self::Tls13 => &TLS13,
        }
    }
}

/// The ring provider with the library's safe default protocol versions
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl SslPolicy for DefaultPolicy {
    fn apply(
        &self,
        provider: CryptoProvider,
    ) -> Result<ConfigBuilder<ClientConfig, WantsVerifier>> {
        ClientConfig::builder_with_provider(Arc::new(provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| anyhow!("failed to apply default TLS policy: {e}"))
    }
}

/// Caller supplied protocol bounds and cipher suite selection
#[derive(Debug, Clone)]
pub struct CustomPolicy {
    pub min_version: TlsVersion,
    pub max_version: TlsVersion,
    /// Cipher suite names (e.g. `TLS13_AES_256_GCM_SHA384`); empty keeps all
    pub cipher_suites: Vec<String>,
}

impl Default for CustomPolicy {
    fn default() -> Self {
        Self {
            min_version: TlsVersion::Tls12,
            max_version: TlsVersion::Tls13,
            cipher_suites: Vec::new(),
        }
    }
}

impl CustomPolicy {
    fn versions(&self) -> Vec<&'static SupportedProtocolVersion> {
        [TlsVersion::Tls12, TlsVersion::Tls13]
            .into_iter()
            .filter(|v| *v >= self.min_version && *v <= self.max_version)
            .map(TlsVersion::supported)
            .collect()
    }
}

impl SslPolicy for CustomPolicy {
    fn apply(
        &self,
        mut provider: CryptoProvider,
    ) -> Result<ConfigBuilder<ClientConfig, WantsVerifier>> {
        let versions = self.versions();
        if versions.is_empty() {
            anyhow::bail!(
                "no TLS version between {} and {}",
                self.min_version,
                self.max_version
            );
        }

        if !self.cipher_suites.is_empty() {
            provider.cipher_suites.retain(|suite| {
                let name = format!("{:?}", suite.suite());
                self.cipher_suites
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(&name))
            });
            if provider.cipher_suites.is_empty() {
                anyhow::bail!(
                    "none of the requested cipher suites are supported: {}",
                    self.cipher_suites.join(",")
                );
            }
        }

        ClientConfig::builder_with_provider(Arc::new(provider))
            .with_protocol_versions(&versions)
            .map_err(|e| anyhow!("failed to apply custom TLS policy: {e}"))
    }
}

/// Crypto provider every policy starts from
#[must_use]
pub fn default_provider() -> CryptoProvider {
    ring::default_provider()
}
