use serde::Serialize;
use std::{fmt, path::PathBuf};

/// Trust material consulted by the verifying session
///
/// The same values are shown verbatim in every diagnostic report.
#[derive(Debug, Clone, Serialize)]
pub struct TrustConfig {
    /// Directory of trusted certificates, scanned by the trust store check
    pub trust_dir: Option<PathBuf>,
    /// PEM bundle of additional CA certificates
    pub ca_file: Option<PathBuf>,
    /// Directory of additional CA certificates
    pub ca_path: Option<PathBuf>,
    /// Seed the store with the bundled web PKI roots
    pub default_roots: bool,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            trust_dir: None,
            ca_file: None,
            ca_path: None,
            default_roots: true,
        }
    }
}

/// Certificate verification mode of a TLS session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyMode {
    /// Validate the peer chain against the trust store, abort on failure
    VerifyPeer,
    /// Accept any certificate so the session can be inspected
    VerifyNone,
}

impl fmt::Display for VerifyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VerifyPeer => write!(f, "VERIFY_PEER"),
            Self::VerifyNone => write!(f, "VERIFY_NONE"),
        }
    }
}
