//! Verification engine
//!
//! Runs the three stages of a check in order:
//!
//! 1. trust store scan (advisory)
//! 2. peer certificate verification on the `VERIFY_PEER` session
//! 3. hostname verification of the verified certificate
//!
//! A failed peer verification skips the hostname stage. Every failed stage
//! carries a [`DiagnosticReport`]. Only input and transport errors are
//! returned as `Err`.

pub mod diagnose;
pub mod help;
pub mod report;

pub use report::DiagnosticReport;

use crate::{
    endpoint::Endpoint,
    tls::{
        ConnectionFactory, SessionCache, TlsMetadata, TrustConfig, VerifyMode, hostname,
        metadata::PeerCertificate,
    },
    truststore::{self, CertificateCheckResult},
};
use anyhow::Result;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    TrustStore,
    PeerVerification,
    HostnameVerification,
}

impl Stage {
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::TrustStore => "trust store scan",
            Self::PeerVerification => "peer certificate verification",
            Self::HostnameVerification => "hostname verification",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of a single stage
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,
    /// Short summary of what the stage looked at
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<DiagnosticReport>,
}

impl StageOutcome {
    #[must_use]
    pub const fn passed(stage: Stage, output: Option<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Passed,
            output,
            report: None,
        }
    }

    #[must_use]
    pub const fn failed(stage: Stage, output: Option<String>, report: DiagnosticReport) -> Self {
        Self {
            stage,
            status: StageStatus::Failed,
            output,
            report: Some(report),
        }
    }

    #[must_use]
    pub const fn skipped(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
            output: None,
            report: None,
        }
    }

    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.status == StageStatus::Passed
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct DoctorOutcome {
    pub endpoint: Endpoint,
    success: bool,
    pub stages: Vec<StageOutcome>,
    /// Session facts of the verifying connection, when its handshake completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsMetadata>,
}

impl DoctorOutcome {
    #[must_use]
    pub fn new(endpoint: Endpoint, stages: Vec<StageOutcome>, tls: Option<TlsMetadata>) -> Self {
        let passed = |stage: Stage| {
            stages
                .iter()
                .any(|outcome| outcome.stage == stage && outcome.is_passed())
        };
        let success = passed(Stage::PeerVerification) && passed(Stage::HostnameVerification);

        Self {
            endpoint,
            success,
            stages,
            tls,
        }
    }

    /// The run passes when peer and hostname verification both passed; the
    /// trust store scan is advisory
    #[must_use]
    pub const fn success(&self) -> bool {
        self.success
    }

    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages.iter().find(|outcome| outcome.stage == stage)
    }

    /// Reports of every failed stage, in stage order
    pub fn reports(&self) -> impl Iterator<Item = (Stage, &DiagnosticReport)> {
        self.stages
            .iter()
            .filter_map(|outcome| outcome.report.as_ref().map(|report| (outcome.stage, report)))
    }
}

impl fmt::Display for DoctorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, outcome) in self.stages.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }

            write!(f, "=> {} ", outcome.stage)?;
            match outcome.status {
                StageStatus::Passed => write!(f, "OK ✅")?,
                StageStatus::Failed => write!(f, "FAILED ❌")?,
                StageStatus::Skipped => write!(f, "SKIPPED ⏭")?,
            }

            if let Some(output) = &outcome.output {
                write!(f, "\n{output}")?;
            }

            if let Some(report) = &outcome.report {
                write!(f, "\n\n{report}\n")?;
            }
        }

        write!(
            f,
            "\n{}: {}",
            self.endpoint,
            if self.success { "PASSED" } else { "FAILED" }
        )
    }
}

/// Run every stage against `endpoint`
///
/// The verifying session is opened before any stage runs, and every session
/// is closed before returning.
///
/// # Errors
///
/// Returns an error if the TCP connection to the endpoint cannot be opened
pub async fn run(
    endpoint: &Endpoint,
    trust: &TrustConfig,
    factory: ConnectionFactory,
) -> Result<DoctorOutcome> {
    let mut cache = SessionCache::new(factory);
    let outcome = check(endpoint, trust, &mut cache).await;
    cache.close_all().await;
    outcome
}

async fn check(
    endpoint: &Endpoint,
    trust: &TrustConfig,
    cache: &mut SessionCache,
) -> Result<DoctorOutcome> {
    cache.session(endpoint, VerifyMode::VerifyPeer).await?;

    let mut stages = Vec::with_capacity(3);

    stages.push(trust_store_stage(trust).await);

    let (peer, tls) = peer_stage(endpoint, trust, cache).await?;
    let verified = peer.is_passed();
    stages.push(peer);

    if verified {
        stages.push(hostname_stage(endpoint, trust, cache, tls.as_ref()).await);
    } else {
        debug!("peer verification failed, skipping hostname verification");
        stages.push(StageOutcome::skipped(Stage::HostnameVerification));
    }

    let outcome = DoctorOutcome::new(endpoint.clone(), stages, tls);
    info!(
        "{endpoint}: {}",
        if outcome.success() { "passed" } else { "failed" }
    );
    Ok(outcome)
}

async fn trust_store_stage(trust: &TrustConfig) -> StageOutcome {
    let results = truststore::scan(trust.trust_dir.as_deref()).await;
    debug!("checked {} trusted certificate file(s)", results.len());

    let output = trust.trust_dir.as_ref().map(|dir| {
        format!(
            "{} certificate file(s) checked in {}",
            results.len(),
            dir.display()
        )
    });

    let bad: Vec<CertificateCheckResult> = results.into_iter().filter(|r| !r.is_ok()).collect();
    if bad.is_empty() {
        StageOutcome::passed(Stage::TrustStore, output)
    } else {
        let report = diagnose::bad_certificates(trust, &bad);
        StageOutcome::failed(Stage::TrustStore, output, report)
    }
}

async fn peer_stage(
    endpoint: &Endpoint,
    trust: &TrustConfig,
    cache: &mut SessionCache,
) -> Result<(StageOutcome, Option<TlsMetadata>)> {
    let session = cache.session(endpoint, VerifyMode::VerifyPeer).await?;

    match session.handshake().await {
        Ok(()) => {
            let tls = session.metadata();
            let output = match &tls {
                Ok(tls) => format!(
                    "{} with {}",
                    tls.version.as_deref().unwrap_or("unknown protocol"),
                    tls.cipher.as_deref().unwrap_or("unknown cipher suite")
                ),
                Err(e) => format!("handshake completed, session details unavailable: {e:#}"),
            };
            Ok((
                StageOutcome::passed(Stage::PeerVerification, Some(output)),
                tls.ok(),
            ))
        }
        Err(failure) => {
            debug!("peer verification of {endpoint} failed: {failure}");
            let report = diagnose::peer_verification(endpoint, trust, cache, &failure).await;
            Ok((
                StageOutcome::failed(Stage::PeerVerification, Some(failure.to_string()), report),
                None,
            ))
        }
    }
}

async fn hostname_stage(
    endpoint: &Endpoint,
    trust: &TrustConfig,
    cache: &mut SessionCache,
    tls: Option<&TlsMetadata>,
) -> StageOutcome {
    let Some(peer) = tls.and_then(|tls| tls.peer.as_ref()) else {
        let report = diagnose::hostname_mismatch(endpoint, trust, cache).await;
        return StageOutcome::failed(
            Stage::HostnameVerification,
            Some("verified certificate unavailable".to_string()),
            report,
        );
    };

    if hostname::matches(peer, &endpoint.host) {
        StageOutcome::passed(
            Stage::HostnameVerification,
            Some(format!("{} matches {}", endpoint.host, identities(peer))),
        )
    } else {
        let report = diagnose::hostname_mismatch(endpoint, trust, cache).await;
        StageOutcome::failed(
            Stage::HostnameVerification,
            Some(format!("{} does not match {}", endpoint.host, identities(peer))),
            report,
        )
    }
}

fn identities(peer: &PeerCertificate) -> String {
    let names: Vec<String> = hostname::identities(peer)
        .into_iter()
        .map(|identity| match identity {
            hostname::Identity::Dns(dns) => format!("DNS:{dns}"),
            hostname::Identity::Ip(ip) => format!("IP:{ip}"),
            hostname::Identity::CommonName(cn) => format!("CN={cn}"),
        })
        .collect();

    if names.is_empty() {
        "no certificate identity".to_string()
    } else {
        names.join(", ")
    }
}
