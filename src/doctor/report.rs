use crate::tls::{TlsMetadata, TrustConfig};
use serde::Serialize;
use std::{env, fmt, path::PathBuf};

/// Explanation of a failed stage
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticReport {
    /// One line summary of what went wrong
    pub problem: String,
    /// Facts gathered while diagnosing, one per line
    pub details: Vec<String>,
    pub configuration: Configuration,
    /// Remediation advice
    pub help: Vec<String>,
    pub links: Vec<Link>,
    /// Served certificate, PEM encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_pem: Option<String>,
    /// Where the served certificate should be copied to be trusted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub name: String,
    pub href: String,
    pub description: String,
}

/// Environment the check ran in
#[derive(Debug, Clone, Default, Serialize)]
pub struct Configuration {
    pub tool_version: String,
    pub tls_backend: String,
    /// Platform default certificate bundle
    pub default_cert_file: Option<PathBuf>,
    /// Platform default certificate directory
    pub default_cert_dir: Option<PathBuf>,
    pub ssl_cert_file: Option<String>,
    pub ssl_cert_dir: Option<String>,
    pub trust: TrustConfig,
    /// Protocol negotiated by the diagnostic session
    pub protocol_version: Option<String>,
    /// Cipher suite negotiated by the diagnostic session
    pub cipher: Option<String>,
}

impl Configuration {
    /// Capture the configuration dump shown in every report
    #[must_use]
    pub fn capture(trust: &TrustConfig, tls: Option<&TlsMetadata>) -> Self {
        let probe = openssl_probe::probe();

        Self {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            tls_backend: "rustls 0.23 (ring)".to_string(),
            default_cert_file: probe.cert_file,
            default_cert_dir: probe.cert_dir,
            ssl_cert_file: env::var("SSL_CERT_FILE").ok(),
            ssl_cert_dir: env::var("SSL_CERT_DIR").ok(),
            trust: trust.clone(),
            protocol_version: tls.and_then(|tls| tls.version.clone()),
            cipher: tls.and_then(|tls| tls.cipher.clone()),
        }
    }
}

impl DiagnosticReport {
    #[must_use]
    pub fn new(problem: impl Into<String>) -> Self {
        Self {
            problem: problem.into(),
            ..Self::default()
        }
    }

    pub fn detail(&mut self, line: impl Into<String>) {
        self.details.push(line.into());
    }

    pub fn attach_help(&mut self, message: impl Into<String>) {
        self.help.push(message.into());
    }

    pub fn attach_link(
        &mut self,
        name: impl Into<String>,
        href: impl Into<String>,
        description: impl Into<String>,
    ) {
        self.links.push(Link {
            name: name.into(),
            href: href.into(),
            description: description.into(),
        });
    }
}

fn optional<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "(not set)".to_string(), |value| value.to_string())
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tlsdoctor version: {}", self.tool_version)?;
        writeln!(f, "TLS backend: {}", self.tls_backend)?;
        writeln!(
            f,
            "default certificate file: {}",
            optional(self.default_cert_file.as_ref().map(|p| p.display()))
        )?;
        writeln!(
            f,
            "default certificate directory: {}",
            optional(self.default_cert_dir.as_ref().map(|p| p.display()))
        )?;
        writeln!(f, "SSL_CERT_FILE: {}", optional(self.ssl_cert_file.as_ref()))?;
        writeln!(f, "SSL_CERT_DIR: {}", optional(self.ssl_cert_dir.as_ref()))?;
        writeln!(
            f,
            "trust directory: {}",
            optional(self.trust.trust_dir.as_ref().map(|p| p.display()))
        )?;
        writeln!(
            f,
            "CA file: {}",
            optional(self.trust.ca_file.as_ref().map(|p| p.display()))
        )?;
        writeln!(
            f,
            "CA path: {}",
            optional(self.trust.ca_path.as_ref().map(|p| p.display()))
        )?;
        write!(f, "bundled web PKI roots: {}", self.trust.default_roots)?;

        if let Some(version) = &self.protocol_version {
            write!(f, "\nnegotiated protocol: {version}")?;
        }
        if let Some(cipher) = &self.cipher {
            write!(f, "\nnegotiated cipher suite: {cipher}")?;
        }

        Ok(())
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "### Problem\n{}", self.problem)?;

        if !self.details.is_empty() {
            write!(f, "\n\n### Details")?;
            for line in &self.details {
                write!(f, "\n{line}")?;
            }
        }

        write!(f, "\n\n### Configuration\n{}", self.configuration)?;

        if !self.help.is_empty() {
            write!(f, "\n\n### Help\n{}", self.help.join("\n\n"))?;
        }

        if let Some(pem) = &self.certificate_pem {
            write!(f, "\n\n### Certificate")?;
            if let Some(path) = &self.suggested_path {
                write!(f, " (save as {})", path.display())?;
            }
            write!(f, "\n{}", pem.trim_end())?;
        }

        if !self.links.is_empty() {
            write!(f, "\n\n### Links")?;
            for link in &self.links {
                write!(f, "\n{} ({}): {}", link.name, link.description, link.href)?;
            }
        }

        Ok(())
    }
}
