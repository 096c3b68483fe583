use super::{
    VerifyMode,
    probe::{ConnectionFactory, TlsSession},
};
use crate::endpoint::Endpoint;
use anyhow::Result;
use std::collections::{HashMap, hash_map::Entry};
use tracing::debug;

/// TLS sessions of a single run, at most one per `(endpoint, mode)`
///
/// Sessions are created on first use. [`SessionCache::close_all`] must be
/// called before the run returns; dropping the cache closes the sockets
/// without sending `close_notify`.
#[derive(Debug)]
pub struct SessionCache {
    factory: ConnectionFactory,
    sessions: HashMap<(Endpoint, VerifyMode), TlsSession>,
}

impl SessionCache {
    #[must_use]
    pub fn new(factory: ConnectionFactory) -> Self {
        Self {
            factory,
            sessions: HashMap::new(),
        }
    }

    /// Get the session for `(endpoint, mode)`, connecting on first use
    ///
    /// # Errors
    ///
    /// Returns an error if a new TCP connection cannot be opened
    pub async fn session(
        &mut self,
        endpoint: &Endpoint,
        mode: VerifyMode,
    ) -> Result<&mut TlsSession> {
        match self.sessions.entry((endpoint.clone(), mode)) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let session = self.factory.connect(endpoint, mode).await?;
                Ok(entry.insert(session))
            }
        }
    }

    /// Check if a session for `(endpoint, mode)` was already created
    #[must_use]
    pub fn contains(&self, endpoint: &Endpoint, mode: VerifyMode) -> bool {
        self.sessions.contains_key(&(endpoint.clone(), mode))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close and forget every session
    pub async fn close_all(&mut self) {
        for ((endpoint, mode), mut session) in self.sessions.drain() {
            debug!("closing {mode} session with {endpoint}");
            session.close().await;
        }
    }
}
