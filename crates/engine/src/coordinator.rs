//! Optimistic mutation coordinator.
//!
//! A mutation goes through three phases:
//!
//! 1. [`Coordinator::begin`] waits until no other mutation holds any of the
//!    affected entity ids, snapshots those entities and applies the
//!    speculative patch. The patch is visible to every reader as soon as
//!    `begin` returns.
//! 2. The caller performs the remote call.
//! 3. [`Coordinator::commit`] drops the snapshot and applies the
//!    authoritative values of the service, or [`Coordinator::rollback`]
//!    restores the snapshot. Both release the entity ids.
//!
//! Rollback of an already settled token is a no-op.
//!
//! The in-flight table is only updated while the cache lock is held, so a
//! reader holding that lock sees patches and their tokens together.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use tokio::sync::{Mutex as QueueMutex, OwnedMutexGuard};

use crate::{
    Budget, EngineError, Entity, EntityCache, EntityKey, ResultEngine, SavingsGoal, Transaction,
    cache::PreImages,
};

/// Cache handle shared between the coordinator and readers.
pub type SharedCache = Arc<Mutex<EntityCache>>;

/// Identifies an in-flight mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationToken(u64);

impl MutationToken {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Authoritative values returned by the service, applied at commit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServerResult {
    pub upserts: Vec<Entity>,
    pub removals: Vec<EntityKey>,
}

impl ServerResult {
    /// The service confirmed without returning anything to merge.
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn upsert(mut self, entity: impl Into<Entity>) -> Self {
        self.upserts.push(entity.into());
        self
    }

    #[must_use]
    pub fn remove(mut self, key: EntityKey) -> Self {
        self.removals.push(key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

struct InFlight {
    label: &'static str,
    snapshot: PreImages,
    _permits: Vec<OwnedMutexGuard<()>>,
}

pub struct Coordinator {
    cache: SharedCache,
    in_flight: Mutex<HashMap<MutationToken, InFlight>>,
    queues: Mutex<HashMap<EntityKey, Arc<QueueMutex<()>>>>,
    next_token: AtomicU64,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn new(cache: SharedCache) -> Self {
        Self {
            cache,
            in_flight: Mutex::new(HashMap::new()),
            queues: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Number of mutations begun but not yet settled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_in_flight(&self, token: MutationToken) -> bool {
        self.in_flight.lock().contains_key(&token)
    }

    /// Starts a mutation over `affected` and applies `patch` speculatively.
    ///
    /// Waits while another mutation holds any of the affected ids. The patch
    /// must validate before writing: when it returns `Err` nothing is
    /// registered, no token is issued and any write it made is undone.
    /// Entities the patch writes beyond `affected` are snapshotted too.
    pub async fn begin<T, F>(
        &self,
        label: &'static str,
        affected: &[EntityKey],
        patch: F,
    ) -> ResultEngine<(MutationToken, T)>
    where
        F: FnOnce(&mut EntityCache) -> ResultEngine<T>,
    {
        let permits = self.acquire(affected).await;

        let mut cache = self.cache.lock();
        let mut snapshot: PreImages = Vec::with_capacity(affected.len());
        for key in affected {
            if !snapshot.iter().any(|(seen, _)| seen == key) {
                snapshot.push((*key, cache.get(*key)));
            }
        }

        let revision = cache.revision();
        cache.start_journal();
        let result = patch(&mut cache);
        let journal = cache.finish_journal();

        let value = match result {
            Ok(value) => value,
            Err(err) => {
                if cache.revision() != revision {
                    cache.restore(journal);
                }
                drop(cache);
                drop(permits);
                self.prune_queues();
                tracing::debug!(label, "mutation refused: {err}");
                return Err(err);
            }
        };

        for (key, before) in journal {
            if !snapshot.iter().any(|(seen, _)| *seen == key) {
                snapshot.push((key, before));
            }
        }

        let token = MutationToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(
            label,
            token = token.0,
            entities = snapshot.len(),
            "speculative patch applied"
        );
        self.in_flight.lock().insert(
            token,
            InFlight {
                label,
                snapshot,
                _permits: permits,
            },
        );
        drop(cache);
        Ok((token, value))
    }

    /// Confirms a mutation, merging the service's authoritative values.
    ///
    /// Returns `false` when the token was already settled.
    pub fn commit(&self, token: MutationToken, server: ServerResult) -> bool {
        let mut cache = self.cache.lock();
        let Some(in_flight) = self.in_flight.lock().remove(&token) else {
            tracing::debug!(token = token.0, "commit of settled mutation ignored");
            return false;
        };

        for entity in server.upserts {
            cache.upsert(entity);
        }
        for key in server.removals {
            cache.remove_by_id(key);
        }
        drop(cache);
        tracing::debug!(label = in_flight.label, token = token.0, "mutation committed");
        drop(in_flight);
        self.prune_queues();
        true
    }

    /// Restores every entity touched by the mutation.
    ///
    /// Returns `false` (and changes nothing) when the token was already
    /// settled, so calling it twice is harmless.
    pub fn rollback(&self, token: MutationToken) -> bool {
        let mut cache = self.cache.lock();
        let Some(in_flight) = self.in_flight.lock().remove(&token) else {
            tracing::debug!(token = token.0, "rollback of settled mutation ignored");
            return false;
        };

        let InFlight {
            label,
            snapshot,
            _permits,
        } = in_flight;
        cache.restore(snapshot);
        drop(cache);
        tracing::warn!(label, token = token.0, "mutation rolled back");
        drop(_permits);
        self.prune_queues();
        true
    }

    /// Replaces the whole cache with a fresh load of the service.
    ///
    /// Refused with [`EngineError::Busy`] while any mutation is unsettled,
    /// since its rollback would restore stale pre-images over the new data.
    pub fn replace_when_idle(
        &self,
        transactions: Vec<Transaction>,
        budgets: Vec<Budget>,
        goals: Vec<SavingsGoal>,
    ) -> ResultEngine<()> {
        let mut cache = self.cache.lock();
        let in_flight = self.in_flight.lock().len();
        if in_flight > 0 {
            return Err(EngineError::Busy(in_flight));
        }
        cache.replace_all(transactions, budgets, goals);
        Ok(())
    }

    /// Wraps `token` so that dropping it unsettled rolls it back.
    pub fn guard(self: &Arc<Self>, token: MutationToken) -> MutationGuard {
        MutationGuard {
            coordinator: Arc::clone(self),
            token: Some(token),
        }
    }

    async fn acquire(&self, affected: &[EntityKey]) -> Vec<OwnedMutexGuard<()>> {
        let mut keys = affected.to_vec();
        keys.sort();
        keys.dedup();

        let queues: Vec<Arc<QueueMutex<()>>> = {
            let mut map = self.queues.lock();
            keys.iter()
                .map(|key| map.entry(*key).or_default().clone())
                .collect()
        };

        let mut permits = Vec::with_capacity(queues.len());
        for queue in queues {
            permits.push(queue.lock_owned().await);
        }
        permits
    }

    /// Forgets queues nobody holds or waits on.
    fn prune_queues(&self) {
        self.queues
            .lock()
            .retain(|_, queue| Arc::strong_count(queue) > 1);
    }
}

/// RAII handle of an in-flight mutation.
///
/// Dropping the guard without settling it rolls the mutation back. The guard
/// owns its coordinator handle, so it can be moved into the task that
/// settles the mutation and outlive the caller that started it.
#[must_use = "dropping the guard rolls the mutation back"]
pub struct MutationGuard {
    coordinator: Arc<Coordinator>,
    token: Option<MutationToken>,
}

impl MutationGuard {
    pub fn token(&self) -> Option<MutationToken> {
        self.token
    }

    pub fn commit(mut self, server: ServerResult) -> bool {
        match self.token.take() {
            Some(token) => self.coordinator.commit(token, server),
            None => false,
        }
    }

    pub fn rollback(mut self) -> bool {
        match self.token.take() {
            Some(token) => self.coordinator.rollback(token),
            None => false,
        }
    }
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            tracing::warn!(token = token.0, "mutation abandoned before settlement");
            self.coordinator.rollback(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::{EngineError, Money, SavingsGoal, ValidationError};

    fn setup() -> (Arc<Coordinator>, SavingsGoal) {
        let goal = SavingsGoal::new(Uuid::new_v4(), "House", Money::new(100_000), "").unwrap();
        let mut cache = EntityCache::new();
        cache.upsert(goal.clone());
        (Arc::new(Coordinator::new(Arc::new(Mutex::new(cache)))), goal)
    }

    fn set_amount(goal_id: Uuid, cents: i64) -> impl FnOnce(&mut EntityCache) -> ResultEngine<()> {
        move |cache| {
            cache.patch_where::<SavingsGoal>(
                |g| g.id == goal_id,
                |g| g.set_amount(Money::new(cents)),
            );
            Ok(())
        }
    }

    fn current(coordinator: &Coordinator, goal_id: Uuid) -> Money {
        coordinator
            .cache()
            .lock()
            .goal(goal_id)
            .map(|g| g.current_amount)
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn rollback_restores_and_is_idempotent() {
        let (coordinator, goal) = setup();
        let key = EntityKey::Goal(goal.id);

        let (token, ()) = coordinator
            .begin("test", &[key], set_amount(goal.id, 500))
            .await
            .unwrap();
        assert_eq!(current(&coordinator, goal.id), Money::new(500));

        assert!(coordinator.rollback(token));
        let after_first = coordinator.cache().lock().snapshot();
        assert!(!coordinator.rollback(token));
        let after_second = coordinator.cache().lock().snapshot();

        assert_eq!(after_first, after_second);
        assert_eq!(current(&coordinator, goal.id), Money::ZERO);
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[tokio::test]
    async fn commit_applies_server_values() {
        let (coordinator, goal) = setup();
        let (token, ()) = coordinator
            .begin("test", &[EntityKey::Goal(goal.id)], set_amount(goal.id, 500))
            .await
            .unwrap();

        let mut confirmed = goal.clone();
        confirmed.set_amount(Money::new(600));
        assert!(coordinator.commit(token, ServerResult::none().upsert(confirmed)));
        assert_eq!(current(&coordinator, goal.id), Money::new(600));
        assert!(!coordinator.rollback(token));
        assert_eq!(current(&coordinator, goal.id), Money::new(600));
    }

    #[tokio::test]
    async fn refused_patch_leaves_no_trace() {
        let (coordinator, goal) = setup();
        let revision = coordinator.cache().lock().revision();

        let err = coordinator
            .begin("test", &[EntityKey::Goal(goal.id)], |_cache| {
                Err::<(), _>(ValidationError::NonPositiveAmount.into())
            })
            .await
            .unwrap_err();

        assert_eq!(err, EngineError::Validation(ValidationError::NonPositiveAmount));
        assert_eq!(coordinator.cache().lock().revision(), revision);
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[tokio::test]
    async fn dropped_guard_rolls_back() {
        let (coordinator, goal) = setup();
        let (token, ()) = coordinator
            .begin("test", &[EntityKey::Goal(goal.id)], set_amount(goal.id, 700))
            .await
            .unwrap();
        {
            let _guard = coordinator.guard(token);
        }
        assert_eq!(current(&coordinator, goal.id), Money::ZERO);
        assert!(!coordinator.is_in_flight(token));
    }

    #[tokio::test]
    async fn replace_is_refused_until_mutations_settle() {
        let (coordinator, goal) = setup();
        let (token, ()) = coordinator
            .begin("test", &[EntityKey::Goal(goal.id)], set_amount(goal.id, 300))
            .await
            .unwrap();

        let err = coordinator
            .replace_when_idle(vec![], vec![], vec![goal.clone()])
            .unwrap_err();
        assert_eq!(err, EngineError::Busy(1));
        assert_eq!(current(&coordinator, goal.id), Money::new(300));

        coordinator.rollback(token);
        let mut fresh = goal.clone();
        fresh.set_amount(Money::new(900));
        coordinator
            .replace_when_idle(vec![], vec![], vec![fresh])
            .unwrap();
        assert_eq!(current(&coordinator, goal.id), Money::new(900));
        assert!(!coordinator.rollback(token));
        assert_eq!(current(&coordinator, goal.id), Money::new(900));
    }

    #[tokio::test]
    async fn same_entity_mutations_are_serialized() {
        let (coordinator, goal) = setup();
        let key = EntityKey::Goal(goal.id);
        let (first, ()) = coordinator
            .begin("first", &[key], set_amount(goal.id, 100))
            .await
            .unwrap();

        let second_keys = [key];
        let second = coordinator.begin("second", &second_keys, set_amount(goal.id, 200));
        tokio::pin!(second);
        let waited = tokio::time::timeout(Duration::from_millis(20), &mut second).await;
        assert!(waited.is_err(), "second mutation must wait for the first");
        assert_eq!(current(&coordinator, goal.id), Money::new(100));

        coordinator.rollback(first);
        let (second, ()) = second.await.unwrap();
        assert_eq!(current(&coordinator, goal.id), Money::new(200));

        coordinator.rollback(second);
        assert_eq!(current(&coordinator, goal.id), Money::ZERO);
    }

    #[tokio::test]
    async fn disjoint_mutations_settle_independently() {
        let (coordinator, goal) = setup();
        let other = SavingsGoal::new(Uuid::new_v4(), "Bike", Money::new(1_000), "").unwrap();
        coordinator.cache().lock().upsert(other.clone());

        let (a, ()) = coordinator
            .begin("a", &[EntityKey::Goal(goal.id)], set_amount(goal.id, 10))
            .await
            .unwrap();
        let (b, ()) = coordinator
            .begin("b", &[EntityKey::Goal(other.id)], set_amount(other.id, 20))
            .await
            .unwrap();

        coordinator.rollback(b);
        coordinator.commit(a, ServerResult::none());
        assert_eq!(current(&coordinator, goal.id), Money::new(10));
        assert_eq!(current(&coordinator, other.id), Money::ZERO);
    }
}
