//! TLS connection and certificate inspection layer
//!
//! # Module Organization
//!
//! - `config` - Trust configuration and verification modes
//! - `policy` - Protocol version and cipher suite policies
//! - `roots` - Trust store assembly
//! - `probe` - TCP connections and TLS sessions
//! - `cache` - Per-run session cache
//! - `verifier` - Custom certificate verifiers
//! - `metadata` - Certificate and session facts
//! - `hostname` - Certificate identity matching
//!
//! # Example
//!
//! ```rust,ignore
//! use tlsdoctor::tls::{ConnectionFactory, DefaultPolicy, SessionCache, VerifyMode};
//!
//! let roots = load_root_store(&TrustConfig::default()).await?;
//! let factory = ConnectionFactory::new(Arc::new(DefaultPolicy), roots, DEFAULT_TIMEOUT);
//! let mut cache = SessionCache::new(factory);
//!
//! let session = cache.session(&endpoint, VerifyMode::VerifyPeer).await?;
//! session.handshake().await?;
//! cache.close_all().await;
//! ```

pub mod cache;
pub mod config;
pub mod hostname;
pub mod metadata;
pub mod policy;
pub mod probe;
pub mod roots;
pub mod verifier;

// Re-export commonly used types
pub use cache::SessionCache;
pub use config::{TrustConfig, VerifyMode};
pub use metadata::{PeerCertificate, TlsMetadata};
pub use policy::{CustomPolicy, DefaultPolicy, SslPolicy, TlsVersion};
pub use probe::{ConnectionFactory, DEFAULT_TIMEOUT, HandshakeFailure, TlsSession};
pub use roots::load_root_store;
