use anyhow::{Context, Result, anyhow};
use rustls::pki_types::ServerName;
use serde::Serialize;
use std::{fmt, net::IpAddr};
use url::{Host, Url};

/// Default port used when neither the URL scheme nor the input carries one
pub const DEFAULT_PORT: u16 = 443;

/// Target of a diagnostic run
///
/// Derived once from the user supplied URI (or the configured default server
/// URL) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint, validating host and port
    ///
    /// # Errors
    ///
    /// Returns an error if the host is empty or the port is zero
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        if host.trim().is_empty() {
            anyhow::bail!("missing host");
        }
        if port == 0 {
            anyhow::bail!("invalid port 0 for {host}");
        }
        Ok(Self { host, port })
    }

    /// Derive an endpoint from a URL (`https://host:port/path`), a
    /// `host:port` pair or a bare host.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be parsed or has no host
    pub fn parse(input: &str, default_port: u16) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            anyhow::bail!("empty server URL");
        }

        if input.contains("://") {
            return Self::from_url(input, default_port);
        }

        // [::1]:8443 or [::1]
        if let Some(rest) = input.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .with_context(|| format!("unterminated IPv6 literal in {input}"))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(port)?,
                None if tail.is_empty() => default_port,
                None => anyhow::bail!("unexpected characters after IPv6 literal: {tail}"),
            };
            return Self::new(host, port);
        }

        // A bare IPv6 address carries several colons and no port
        if input.parse::<IpAddr>().is_ok() {
            return Self::new(input, default_port);
        }

        match input.rsplit_once(':') {
            Some((host, port)) => Self::new(host, parse_port(port)?),
            None => Self::new(input, default_port),
        }
    }

    fn from_url(input: &str, default_port: u16) -> Result<Self> {
        let url = Url::parse(input).with_context(|| format!("invalid server URL: {input}"))?;
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => anyhow::bail!("server URL has no host: {input}"),
        };
        let port = url.port_or_known_default().unwrap_or(default_port);
        Self::new(host, port)
    }

    /// Name presented in the TLS `ClientHello` (SNI) for this endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the host is neither an IP address nor a valid DNS name
    pub fn server_name(&self) -> Result<ServerName<'static>> {
        server_name_from_host(&self.host)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(port: &str) -> Result<u16> {
    let port = port
        .parse::<u16>()
        .map_err(|e| anyhow!("invalid port {port:?}: {e}"))?;
    if port == 0 {
        anyhow::bail!("invalid port 0");
    }
    Ok(port)
}

fn server_name_from_host(host: &str) -> Result<ServerName<'static>> {
    host.parse::<IpAddr>().map_or_else(
        |_| {
            ServerName::try_from(host.to_string())
                .map_err(|_| anyhow!("invalid server name: {host}"))
        },
        |ip| Ok(ServerName::from(ip).to_owned()),
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_parse_https_url() {
        let endpoint = Endpoint::parse("https://example.com/some/path", 8140).unwrap();
        assert_eq!(endpoint.host, "example.com");
        assert_eq!(endpoint.port, 443);
    }

    #[test]
    fn test_parse_url_with_port() {
        let endpoint = Endpoint::parse("https://example.com:8443", 443).unwrap();
        assert_eq!(endpoint.port, 8443);
    }

    #[test]
    fn test_parse_unknown_scheme_uses_default_port() {
        let endpoint = Endpoint::parse("puppet://master.example.com/", 8140).unwrap();
        assert_eq!(endpoint.host, "master.example.com");
        assert_eq!(endpoint.port, 8140);
    }

    #[test]
    fn test_parse_host_port() {
        let endpoint = Endpoint::parse("db.example.com:5432", 443).unwrap();
        assert_eq!(endpoint.host, "db.example.com");
        assert_eq!(endpoint.port, 5432);
    }

    #[test]
    fn test_parse_bare_host() {
        let endpoint = Endpoint::parse("example.com", 443).unwrap();
        assert_eq!(endpoint.to_string(), "example.com:443");
    }

    #[test]
    fn test_parse_ipv6() {
        let endpoint = Endpoint::parse("[::1]:8443", 443).unwrap();
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.port, 8443);
        assert_eq!(endpoint.to_string(), "[::1]:8443");

        let endpoint = Endpoint::parse("::1", 443).unwrap();
        assert_eq!(endpoint.port, 443);

        let endpoint = Endpoint::parse("https://[2001:db8::1]:9443/", 443).unwrap();
        assert_eq!(endpoint.host, "2001:db8::1");
        assert_eq!(endpoint.port, 9443);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Endpoint::parse("", 443).is_err());
        assert!(Endpoint::parse("example.com:http", 443).is_err());
        assert!(Endpoint::parse("example.com:0", 443).is_err());
        assert!(Endpoint::parse("example.com:70000", 443).is_err());
        assert!(Endpoint::parse(":443", 443).is_err());
        assert!(Endpoint::parse("file:///etc/hosts", 443).is_err());
        assert!(Endpoint::parse("[::1", 443).is_err());
    }

    #[test]
    fn test_server_name() {
        assert!(Endpoint::new("example.com", 443).unwrap().server_name().is_ok());
        assert!(Endpoint::new("127.0.0.1", 443).unwrap().server_name().is_ok());
        assert!(Endpoint::new("2001:db8::1", 443).unwrap().server_name().is_ok());
        assert!(
            Endpoint::new("invalid host name with spaces", 443)
                .unwrap()
                .server_name()
                .is_err()
        );
    }
}
