use super::TrustConfig;
use crate::truststore::{certificate_files, read_certificates};
use anyhow::{Context, Result};
use rustls::{RootCertStore, pki_types::CertificateDer};
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// Build the trust store consulted by the verifying session
///
/// The store holds, in order: the bundled web PKI roots (unless disabled),
/// the CA file, every certificate of the CA directory and every certificate
/// of the trust directory. Unusable certificates are skipped with a warning;
/// the trust store scan reports them in detail.
///
/// # Errors
///
/// Returns an error if a configured CA file or CA directory cannot be read
pub async fn load_root_store(config: &TrustConfig) -> Result<RootCertStore> {
    let mut store = if config.default_roots {
        webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect()
    } else {
        RootCertStore::empty()
    };
    debug!("{} default trust anchors", store.len());

    if let Some(ca_file) = &config.ca_file {
        let certs = read_certificates(ca_file)
            .await
            .with_context(|| format!("failed to load CA file {}", ca_file.display()))?;
        add_all(&mut store, ca_file, certs);
    }

    if let Some(ca_path) = &config.ca_path {
        add_directory(&mut store, ca_path)
            .await
            .with_context(|| format!("failed to load CA directory {}", ca_path.display()))?;
    }

    if let Some(trust_dir) = &config.trust_dir
        && fs::try_exists(trust_dir).await.unwrap_or(false)
    {
        add_directory(&mut store, trust_dir).await.with_context(|| {
            format!("failed to load trust directory {}", trust_dir.display())
        })?;
    }

    debug!("{} trust anchors loaded", store.len());
    Ok(store)
}

async fn add_directory(store: &mut RootCertStore, dir: &Path) -> Result<()> {
    for path in certificate_files(dir).await? {
        match read_certificates(&path).await {
            Ok(certs) => add_all(store, &path, certs),
            Err(e) => warn!("skipping unreadable certificate {}: {e:#}", path.display()),
        }
    }
    Ok(())
}

fn add_all(store: &mut RootCertStore, path: &Path, certs: Vec<CertificateDer<'static>>) {
    let (added, ignored) = store.add_parsable_certificates(certs);
    if ignored > 0 {
        warn!(
            "ignored {ignored} unusable certificate(s) from {}",
            path.display()
        );
    }
    debug!("added {added} trust anchor(s) from {}", path.display());
}
