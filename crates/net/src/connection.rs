//! Session ownership and recycling

use crate::client::{NetClient, NetConfig};
use layerpull_errors::Error;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

struct SessionSlot {
    client: NetClient,
    created_at: Instant,
    generation: u64,
}

/// Owns the pooled HTTP session shared by every worker of a pull.
///
/// Workers borrow a [`NetClient`] for one request. The slot is swapped under
/// a plain mutex that is never held across an await; a replaced session is
/// closed once its last borrower drops it.
pub struct ConnectionManager {
    config: NetConfig,
    cancel: CancellationToken,
    slot: Mutex<SessionSlot>,
}

impl ConnectionManager {
    /// Create a manager with a fresh session
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: NetConfig) -> Result<Self, Error> {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Like [`ConnectionManager::new`], with every session bound to `cancel`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_cancellation(config: NetConfig, cancel: CancellationToken) -> Result<Self, Error> {
        let client = NetClient::new(config.clone())?.with_cancellation(cancel.clone());
        Ok(Self {
            config,
            cancel,
            slot: Mutex::new(SessionSlot {
                client,
                created_at: Instant::now(),
                generation: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Borrow the current session, replacing it first when it has outlived
    /// the refresh interval.
    ///
    /// # Errors
    ///
    /// Returns an error if a replacement client cannot be built.
    pub fn get_session(&self) -> Result<NetClient, Error> {
        let mut slot = self.lock();
        if slot.created_at.elapsed() >= self.config.session_refresh_interval {
            tracing::debug!(generation = slot.generation, "recycling expired HTTP session");
            self.replace(&mut slot)?;
        }
        Ok(slot.client.clone())
    }

    /// Drop the current session and start a new one
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement client cannot be built.
    pub fn refresh(&self) -> Result<(), Error> {
        let mut slot = self.lock();
        tracing::debug!(generation = slot.generation, "refreshing HTTP session");
        self.replace(&mut slot)
    }

    /// Number of times the session has been replaced
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    #[must_use]
    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    fn replace(&self, slot: &mut SessionSlot) -> Result<(), Error> {
        slot.client = NetClient::new(self.config.clone())?.with_cancellation(self.cancel.clone());
        slot.created_at = Instant::now();
        slot.generation += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn refresh_bumps_generation() {
        let manager = ConnectionManager::new(NetConfig::default()).unwrap();
        assert_eq!(manager.generation(), 0);
        manager.get_session().unwrap();
        assert_eq!(manager.generation(), 0);
        manager.refresh().unwrap();
        manager.refresh().unwrap();
        assert_eq!(manager.generation(), 2);
    }

    #[test]
    fn expired_session_is_replaced_lazily() {
        let manager = ConnectionManager::new(NetConfig {
            session_refresh_interval: Duration::ZERO,
            ..NetConfig::default()
        })
        .unwrap();
        manager.get_session().unwrap();
        manager.get_session().unwrap();
        assert_eq!(manager.generation(), 2);
    }
}
