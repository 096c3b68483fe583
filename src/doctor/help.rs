use super::report::DiagnosticReport;
use crate::endpoint::Endpoint;
use rustls::CertificateError;
use std::path::Path;

pub fn failed_handshake(report: &mut DiagnosticReport, endpoint: &Endpoint) {
    report.attach_help(format!(
        "The TLS handshake with {endpoint} did not complete.
Please verify that:
- {endpoint} speaks TLS directly (not STARTTLS or plain text).
- The server accepts the protocol versions and cipher suites allowed by --tls-min, --tls-max and --ciphers."
    ));
}

/// Extra advice selected by the kind of certificate error
pub fn certificate_error(report: &mut DiagnosticReport, error: &CertificateError) {
    match error {
        CertificateError::Expired | CertificateError::ExpiredContext { .. } => {
            cert_is_expired(report);
        }
        CertificateError::NotValidYet | CertificateError::NotValidYetContext { .. } => {
            cert_is_not_yet_valid(report);
        }
        CertificateError::UnknownIssuer => cert_unknown_issuer(report),
        CertificateError::InvalidPurpose | CertificateError::InvalidPurposeContext { .. } => {
            cert_invalid_purpose(report);
        }
        CertificateError::Revoked => cert_revoked(report),
        CertificateError::BadSignature => cert_bad_signature(report),
        _ => {}
    }
}

pub fn cert_unknown_issuer(report: &mut DiagnosticReport) {
    report.attach_help(
        "The issuer is not trusted by the trust store (issuer is unknown).
Please ensure the following:
- The server is providing intermediate certificates along with the leaf certificate.
- If you are using a custom root CA managed by you or your organization, add the root certificate to the trust directory or pass it with --ca-file.
- For self-signed certificates, either trust the certificate or obtain one signed by a recognized certificate authority.
If none of the above applies, you could be facing a Man-in-the-Middle (MITM) attack.",
    );

    report.attach_link(
        "Man-in-the-middle attack",
        "https://en.wikipedia.org/wiki/Man-in-the-middle_attack",
        "more information on MITM attacks",
    );
}

pub fn cert_is_expired(report: &mut DiagnosticReport) {
    report.attach_help(
        "The certificate has expired.
To resolve this, you should:
- Renew the certificate through your certification authority.
- Install the new certificate on your server.
If you believe the certificate should still be valid, verify that your system clock is set to the correct time.",
    );
}

pub fn cert_is_not_yet_valid(report: &mut DiagnosticReport) {
    report.attach_help(
        "The certificate is not yet valid.
Make sure your clock is set to the correct time.",
    );
}

pub fn cert_invalid_purpose(report: &mut DiagnosticReport) {
    report.attach_help(
        "The certificate is not valid for server authentication.
You need to generate a separate certificate valid for server authentication.",
    );
}

pub fn cert_revoked(report: &mut DiagnosticReport) {
    report.attach_help(
        "The certificate has been revoked by its issuer.
Install a newly issued certificate on the server.",
    );
}

pub fn cert_bad_signature(report: &mut DiagnosticReport) {
    report.attach_help(
        "The certificate signature does not verify against its issuer.
The certificate may have been tampered with, or the server sends an intermediate that does not belong to the chain.",
    );
}

/// Advice for adding the served certificate to the trust directory
pub fn trust_served_certificate(
    report: &mut DiagnosticReport,
    self_issued: bool,
    destination: Option<&Path>,
) {
    let what = if self_issued {
        "The server presents a self-signed certificate."
    } else {
        "The server certificate is not signed by any certificate of the trust store."
    };

    let action = match destination {
        Some(path) if self_issued => format!(
            "If you trust this server, copy the certificate below to {} and run the check again.",
            path.display()
        ),
        Some(path) => format!(
            "If you trust this server, add its issuing CA certificate to {} (the served certificate below can be used as a last resort).",
            path.parent().unwrap_or(path).display()
        ),
        None => "If you trust this server, save the certificate below and pass its directory with --trust-dir."
            .to_string(),
    };

    report.attach_help(format!("{what}\n{action}"));
}

pub fn cert_invalid_hostname(report: &mut DiagnosticReport, endpoint: &Endpoint, cn: Option<&str>) {
    let host = &endpoint.host;
    let switch = cn.map_or_else(
        || "- Connect using one of the subject alternative names listed above.".to_string(),
        |cn| {
            format!(
                "- Change the configured server URL to use '{cn}', for example https://{}.",
                Endpoint {
                    host: cn.to_string(),
                    port: endpoint.port,
                }
            )
        },
    );

    report.attach_help(format!(
        "The certificate is not valid for the host name '{host}'.
To resolve this issue, you can:
{switch}
- Generate and install a new certificate that includes '{host}'.
Please note that asterisks '*' found in wildcard certificates only match one level of subdomains.
For example: 'a.b.c' is matched by '*.b.c', but is not matched by '*.c'."
    ));

    report.attach_link(
        "Public key certificate",
        "https://en.wikipedia.org/wiki/Public_key_certificate",
        "more information on certificate structure, wildcard certificates and certificate authorities",
    );
}

pub fn bad_trusted_certificates(report: &mut DiagnosticReport) {
    report.attach_help(
        "Some files of the trust directory cannot be used as trust anchors.
Refresh the offending files from the server they belong to, or remove them.
Files that cannot be parsed are left out of the trust store. Expired, not self-issued or badly signed certificates are still loaded as trust anchors.
These problems do not fail the check on their own.",
    );
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_certificate_error_help() {
        let mut report = DiagnosticReport::new("problem");
        certificate_error(&mut report, &CertificateError::UnknownIssuer);
        assert_eq!(report.help.len(), 1);
        assert!(report.help[0].contains("issuer is unknown"));
        assert_eq!(report.links.len(), 1);

        let mut report = DiagnosticReport::new("problem");
        certificate_error(&mut report, &CertificateError::Expired);
        assert!(report.help[0].contains("expired"));

        let mut report = DiagnosticReport::new("problem");
        certificate_error(&mut report, &CertificateError::BadEncoding);
        assert!(report.help.is_empty());
    }

    #[test]
    fn test_bad_trusted_certificates() {
        let mut report = DiagnosticReport::new("problem");
        bad_trusted_certificates(&mut report);
        assert_eq!(report.help.len(), 1);
        assert!(report.help[0].contains("cannot be parsed are left out"));
        assert!(report.help[0].contains("still loaded as trust anchors"));
    }

    #[test]
    fn test_trust_served_certificate() {
        let mut report = DiagnosticReport::new("problem");
        trust_served_certificate(&mut report, true, Some(Path::new("/trust/localhost.pem")));
        assert!(report.help[0].contains("self-signed"));
        assert!(report.help[0].contains("/trust/localhost.pem"));

        let mut report = DiagnosticReport::new("problem");
        trust_served_certificate(&mut report, false, None);
        assert!(report.help[0].contains("--trust-dir"));
    }

    #[test]
    fn test_cert_invalid_hostname() {
        let endpoint = Endpoint::new("localhost", 8443).unwrap();
        let mut report = DiagnosticReport::new("problem");
        cert_invalid_hostname(&mut report, &endpoint, Some("other.example.com"));
        assert!(report.help[0].contains("https://other.example.com:8443"));
        assert!(report.help[0].contains("'localhost'"));

        let mut report = DiagnosticReport::new("problem");
        cert_invalid_hostname(&mut report, &endpoint, None);
        assert!(report.help[0].contains("subject alternative names"));
    }
}
