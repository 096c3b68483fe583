//! Diagnose why a TLS server certificate fails validation
//!
//! A check runs three stages against an endpoint: a scan of the local trust
//! directory, verification of the served certificate chain and verification
//! of the certificate identity against the requested host. Every failed
//! stage comes with a report explaining what is wrong and how to fix it.

pub mod cli;
pub mod doctor;
pub mod endpoint;
pub mod tls;
pub mod truststore;
