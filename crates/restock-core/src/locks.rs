//! Per-provider run serialization.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use restock_protocols::ProviderId;

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;

/// One async mutex per provider.
///
/// Two runs against the same provider would interleave clicks in a
/// single browser session, so they queue here. Runs against distinct
/// providers own separate sessions and may overlap freely.
#[derive(Debug, Default)]
pub struct ProviderLocks {
    locks: Mutex<HashMap<ProviderId, Arc<AsyncMutex<()>>>>,
}

impl ProviderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the provider's lock, waiting while another run holds it.
    pub async fn acquire(&self, provider: ProviderId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(provider).or_default())
        };
        lock.lock_owned().await
    }
}
