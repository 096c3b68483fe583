use crate::{
    cli::actions::{Action, OutputFormat},
    endpoint::{DEFAULT_PORT, Endpoint},
    tls::{
        CustomPolicy, DefaultPolicy, SslPolicy, TlsVersion, TrustConfig, policy::default_provider,
    },
};
use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Build the protocol policy, `DefaultPolicy` unless a bound or a cipher
/// suite was requested
fn extract_policy(matches: &ArgMatches) -> Result<Arc<dyn SslPolicy>> {
    let parse_version = |id: &str| {
        matches
            .get_one::<String>(id)
            .map(|v| v.parse::<TlsVersion>().map_err(|e| anyhow!(e)))
            .transpose()
    };

    let min_version = parse_version("tls-min")?;
    let max_version = parse_version("tls-max")?;
    let cipher_suites: Vec<String> = matches
        .get_many::<String>("ciphers")
        .map(|suites| {
            suites
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if min_version.is_none() && max_version.is_none() && cipher_suites.is_empty() {
        return Ok(Arc::new(DefaultPolicy));
    }

    let defaults = CustomPolicy::default();
    let policy = CustomPolicy {
        min_version: min_version.unwrap_or(defaults.min_version),
        max_version: max_version.unwrap_or(defaults.max_version),
        cipher_suites,
    };

    // reject unusable combinations before connecting
    policy
        .apply(default_provider())
        .context("invalid TLS policy")?;

    Ok(Arc::new(policy))
}

fn extract_trust(matches: &ArgMatches) -> TrustConfig {
    TrustConfig {
        trust_dir: matches.get_one::<String>("trust-dir").map(PathBuf::from),
        ca_file: matches.get_one::<String>("ca-file").map(PathBuf::from),
        ca_path: matches.get_one::<String>("ca-path").map(PathBuf::from),
        default_roots: !matches.get_flag("no-default-roots"),
    }
}

/// Convert `ArgMatches` into typed Action enum with validation
///
/// # Errors
///
/// Returns an error if no URL is given, the URL is invalid or the TLS policy
/// cannot be satisfied
pub fn dispatch(matches: &ArgMatches) -> Result<Action> {
    // The positional URL wins over the configured default
    let url = matches
        .get_one::<String>("target")
        .or_else(|| matches.get_one::<String>("url"))
        .context("missing server URL (pass it as argument, with --url or TLSDOCTOR_URL)")?;

    let port = matches
        .get_one::<u16>("port")
        .copied()
        .unwrap_or(DEFAULT_PORT);

    let endpoint = Endpoint::parse(url, port).with_context(|| format!("Invalid URL: {url}"))?;

    let timeout = Duration::from_secs(matches.get_one::<u64>("timeout").copied().unwrap_or(10));

    let format = matches
        .get_one::<String>("format")
        .map(|f| f.parse::<OutputFormat>().map_err(|e| anyhow!(e)))
        .transpose()?
        .unwrap_or_default();

    Ok(Action::Diagnose {
        endpoint,
        trust: extract_trust(matches),
        policy: extract_policy(matches)?,
        timeout,
        format,
    })
}
