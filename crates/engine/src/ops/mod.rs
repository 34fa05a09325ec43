use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::{
    CacheSnapshot, Coordinator, EngineError, EntityCache, LedgerService, ResultEngine,
    aggregation::{self, DashboardStats},
    coordinator::SharedCache,
    views::{ViewKey, ViewSignal, ViewSnapshot},
};

mod contributions;
mod deletions;
mod goals;
mod transactions;

pub use contributions::{ContributionOutcome, Direction};
pub use deletions::{DeleteMode, DeletionOutcome};

/// One client session against a ledger service.
///
/// Owns the entity cache (through the coordinator) and the remote handle.
/// Operations take `&self`, so several may be in flight at once; the
/// coordinator serializes those touching the same entity. A remote call that
/// was sent settles on its own task, so dropping an operation's future does
/// not undo what the service already recorded.
pub struct Ledger<R> {
    remote: Arc<R>,
    coordinator: Arc<Coordinator>,
}

impl<R> std::fmt::Debug for Ledger<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl<R: LedgerService> Ledger<R> {
    /// Return a builder for `Ledger`. Help to build the struct.
    pub fn builder() -> LedgerBuilder<R> {
        LedgerBuilder::default()
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Owned handle for calls that settle on their own task.
    fn remote_handle(&self) -> Arc<R> {
        Arc::clone(&self.remote)
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn cache(&self) -> &SharedCache {
        self.coordinator.cache()
    }

    pub fn view(&self, key: &ViewKey) -> ViewSnapshot {
        self.cache().lock().get_view(key)
    }

    pub fn subscribe(&self, key: ViewKey) -> watch::Receiver<ViewSignal> {
        self.cache().lock().subscribe(key)
    }

    pub fn close_view(&self, key: &ViewKey) {
        self.cache().lock().close_view(key);
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.cache().lock().snapshot()
    }

    /// Net balance of everything currently cached.
    pub fn available_balance(&self) -> crate::Money {
        aggregation::net_balance(&self.snapshot().transactions)
    }

    /// Dashboard figures recomputed from the current cache.
    pub fn stats(&self, today: NaiveDate) -> DashboardStats {
        aggregation::dashboard(&self.snapshot(), today)
    }
}

/// The builder for `Ledger`
pub struct LedgerBuilder<R> {
    remote: Option<R>,
    cache: EntityCache,
}

impl<R> Default for LedgerBuilder<R> {
    fn default() -> Self {
        Self {
            remote: None,
            cache: EntityCache::new(),
        }
    }
}

impl<R: LedgerService> LedgerBuilder<R> {
    /// Pass the required ledger service
    pub fn remote(mut self, remote: R) -> LedgerBuilder<R> {
        self.remote = Some(remote);
        self
    }

    /// Start from an already populated cache instead of an empty one.
    pub fn cache(mut self, cache: EntityCache) -> LedgerBuilder<R> {
        self.cache = cache;
        self
    }

    /// Build the `Ledger`. Call [`Ledger::refresh`] to populate it.
    pub fn build(self) -> ResultEngine<Ledger<R>> {
        let remote = self
            .remote
            .ok_or_else(|| EngineError::NotFound("ledger service".to_string()))?;
        Ok(Ledger {
            remote: Arc::new(remote),
            coordinator: Arc::new(Coordinator::new(Arc::new(Mutex::new(self.cache)))),
        })
    }
}
