use super::metadata::PeerCertificate;
use std::net::IpAddr;

/// Identity of a certificate that a hostname was compared against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Dns(String),
    Ip(IpAddr),
    CommonName(String),
}

/// Check whether the certificate is valid for `host`.
///
/// The host matches when any subject alternative name or the subject Common
/// Name covers it.
#[must_use]
pub fn matches(cert: &PeerCertificate, host: &str) -> bool {
    identities(cert).iter().any(|identity| identity_matches(identity, host))
}

/// Identities consulted by [`matches`], in the order they are tried
#[must_use]
pub fn identities(cert: &PeerCertificate) -> Vec<Identity> {
    cert.dns_names
        .iter()
        .map(|dns| Identity::Dns(dns.clone()))
        .chain(
            cert.ip_addresses
                .iter()
                .filter_map(|ip| ip.parse().ok())
                .map(Identity::Ip),
        )
        .chain(cert.common_name.iter().cloned().map(Identity::CommonName))
        .collect()
}

fn identity_matches(identity: &Identity, host: &str) -> bool {
    let host = host.trim_end_matches('.');
    match identity {
        Identity::Ip(ip) => host.parse::<IpAddr>().is_ok_and(|host_ip| host_ip == *ip),
        Identity::Dns(pattern) | Identity::CommonName(pattern) => {
            if host.parse::<IpAddr>().is_ok() {
                // IP hosts only match IP SANs or a CN spelling the address
                return matches!(identity, Identity::CommonName(_)) && pattern == host;
            }
            dns_matches(pattern.trim_end_matches('.'), host)
        }
    }
}

/// Compare a DNS name pattern with a hostname, case-insensitively.
///
/// A `*` is only honoured as the whole left-most label and matches exactly
/// one label: `*.b.c` matches `a.b.c` but neither `b.c` nor `x.a.b.c`.
#[must_use]
pub fn dns_matches(pattern: &str, host: &str) -> bool {
    if pattern.is_empty() || host.is_empty() {
        return false;
    }

    let expected: Vec<&str> = pattern.split('.').collect();
    let actual: Vec<&str> = host.split('.').collect();
    if expected.len() != actual.len() {
        return false;
    }

    expected
        .iter()
        .zip(&actual)
        .enumerate()
        .all(|(idx, (expected_label, actual_label))| {
            if idx == 0 && *expected_label == "*" {
                // never let a wildcard cover a bare top-level domain
                expected.len() > 2 && !actual_label.is_empty()
            } else {
                expected_label.eq_ignore_ascii_case(actual_label)
            }
        })
}
