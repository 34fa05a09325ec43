//! Client-side entity cache.
//!
//! Entities are indexed by id per collection; every view is computed from
//! those indexes on read, so a write to one record is seen by every view
//! that projects it. Subscribers register a [`ViewKey`] and are notified only
//! when a write touches an entity their view matches (before or after the
//! write).
//!
//! Outside initial population the cache is written only by the
//! [`Coordinator`](crate::Coordinator).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    Budget, SavingsGoal, Transaction,
    views::{ViewKey, ViewSignal, ViewSnapshot},
};

/// Identifies one cached entity. Ordered so lock acquisition is deterministic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKey {
    Transaction(Uuid),
    Budget(Uuid),
    Goal(Uuid),
}

impl EntityKey {
    pub fn id(self) -> Uuid {
        match self {
            Self::Transaction(id) | Self::Budget(id) | Self::Goal(id) => id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Transaction(Transaction),
    Budget(Budget),
    Goal(SavingsGoal),
}

impl Entity {
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Transaction(tx) => EntityKey::Transaction(tx.id),
            Self::Budget(budget) => EntityKey::Budget(budget.id),
            Self::Goal(goal) => EntityKey::Goal(goal.id),
        }
    }
}

impl From<Transaction> for Entity {
    fn from(value: Transaction) -> Self {
        Self::Transaction(value)
    }
}

impl From<Budget> for Entity {
    fn from(value: Budget) -> Self {
        Self::Budget(value)
    }
}

impl From<SavingsGoal> for Entity {
    fn from(value: SavingsGoal) -> Self {
        Self::Goal(value)
    }
}

/// Entity types stored in the cache, each in its own id index.
pub trait Cached: Clone + PartialEq + Into<Entity> {
    fn id(&self) -> Uuid;

    fn key_of(id: Uuid) -> EntityKey;

    #[doc(hidden)]
    fn index(cache: &EntityCache) -> &HashMap<Uuid, Self>;
}

impl Cached for Transaction {
    fn id(&self) -> Uuid {
        self.id
    }

    fn key_of(id: Uuid) -> EntityKey {
        EntityKey::Transaction(id)
    }

    fn index(cache: &EntityCache) -> &HashMap<Uuid, Self> {
        &cache.transactions
    }
}

impl Cached for Budget {
    fn id(&self) -> Uuid {
        self.id
    }

    fn key_of(id: Uuid) -> EntityKey {
        EntityKey::Budget(id)
    }

    fn index(cache: &EntityCache) -> &HashMap<Uuid, Self> {
        &cache.budgets
    }
}

impl Cached for SavingsGoal {
    fn id(&self) -> Uuid {
        self.id
    }

    fn key_of(id: Uuid) -> EntityKey {
        EntityKey::Goal(id)
    }

    fn index(cache: &EntityCache) -> &HashMap<Uuid, Self> {
        &cache.goals
    }
}

/// Pre-images of the entities a mutation touched, in first-touch order.
/// `None` means the entity did not exist.
pub type PreImages = Vec<(EntityKey, Option<Entity>)>;

#[derive(Debug, Default)]
struct Journal {
    seen: HashSet<EntityKey>,
    entries: PreImages,
}

/// Owned copy of the whole cache, handed to the aggregation functions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub transactions: Vec<Transaction>,
    pub budgets: Vec<Budget>,
    pub goals: Vec<SavingsGoal>,
}

#[derive(Debug, Default)]
pub struct EntityCache {
    transactions: HashMap<Uuid, Transaction>,
    budgets: HashMap<Uuid, Budget>,
    goals: HashMap<Uuid, SavingsGoal>,
    subscribers: HashMap<ViewKey, watch::Sender<ViewSignal>>,
    journal: Option<Journal>,
    revision: u64,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of writes applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, key: EntityKey) -> Option<Entity> {
        match key {
            EntityKey::Transaction(id) => self.transactions.get(&id).cloned().map(Entity::from),
            EntityKey::Budget(id) => self.budgets.get(&id).cloned().map(Entity::from),
            EntityKey::Goal(id) => self.goals.get(&id).cloned().map(Entity::from),
        }
    }

    pub fn transaction(&self, id: Uuid) -> Option<&Transaction> {
        self.transactions.get(&id)
    }

    pub fn budget(&self, id: Uuid) -> Option<&Budget> {
        self.budgets.get(&id)
    }

    pub fn goal(&self, id: Uuid) -> Option<&SavingsGoal> {
        self.goals.get(&id)
    }

    /// Entities of collection `T` matching `predicate`, unordered.
    pub fn find<T: Cached>(&self, predicate: impl Fn(&T) -> bool) -> Vec<&T> {
        T::index(self).values().filter(|item| predicate(item)).collect()
    }

    pub fn len(&self) -> usize {
        self.transactions.len() + self.budgets.len() + self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materializes the view named by `key`.
    pub fn get_view(&self, key: &ViewKey) -> ViewSnapshot {
        match key {
            ViewKey::Transactions(filter) => {
                let mut rows: Vec<Transaction> = self
                    .transactions
                    .values()
                    .filter(|tx| filter.matches(tx))
                    .cloned()
                    .collect();
                rows.sort_by(|a, b| {
                    b.date
                        .cmp(&a.date)
                        .then_with(|| b.created_at.cmp(&a.created_at))
                        .then_with(|| a.id.cmp(&b.id))
                });
                if let Some(limit) = filter.limit {
                    rows.truncate(limit);
                }
                ViewSnapshot::Transactions(rows)
            }
            ViewKey::Goals => {
                let mut goals: Vec<SavingsGoal> = self.goals.values().cloned().collect();
                goals.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
                ViewSnapshot::Goals(goals)
            }
            ViewKey::Goal(id) => ViewSnapshot::Goal(self.goals.get(id).cloned()),
            ViewKey::Budgets => {
                let mut budgets: Vec<Budget> = self.budgets.values().cloned().collect();
                budgets.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
                ViewSnapshot::Budgets(budgets)
            }
            ViewKey::Budget(id) => ViewSnapshot::Budget(self.budgets.get(id).cloned()),
        }
    }

    /// Copy of every collection, ordered by id.
    pub fn snapshot(&self) -> CacheSnapshot {
        fn sorted<T: Cached>(index: &HashMap<Uuid, T>) -> Vec<T> {
            let mut items: Vec<T> = index.values().cloned().collect();
            items.sort_by_key(|item| item.id());
            items
        }
        CacheSnapshot {
            transactions: sorted(&self.transactions),
            budgets: sorted(&self.budgets),
            goals: sorted(&self.goals),
        }
    }

    /// Inserts or replaces an entity by id.
    pub fn upsert(&mut self, entity: impl Into<Entity>) {
        let entity = entity.into();
        self.write(entity.key(), Some(entity));
    }

    /// Removes an entity from every view. Returns the removed value.
    pub fn remove_by_id(&mut self, key: EntityKey) -> Option<Entity> {
        let before = self.get(key)?;
        self.write(key, None);
        Some(before)
    }

    /// Applies `patch` to every entity of collection `T` matching
    /// `predicate`. Returns how many entities actually changed.
    pub fn patch_where<T: Cached>(
        &mut self,
        predicate: impl Fn(&T) -> bool,
        mut patch: impl FnMut(&mut T),
    ) -> usize {
        let mut targets: Vec<T> = T::index(self)
            .values()
            .filter(|item| predicate(item))
            .cloned()
            .collect();
        targets.sort_by_key(|item| item.id());

        let mut changed = 0;
        for before in targets {
            let mut after = before.clone();
            patch(&mut after);
            if after != before {
                self.write(T::key_of(before.id()), Some(after.into()));
                changed += 1;
            }
        }
        changed
    }

    /// Replaces the whole content with what the service returned.
    ///
    /// This is the only write that bypasses the coordinator; every
    /// subscriber is told its view changed.
    pub fn replace_all(
        &mut self,
        transactions: Vec<Transaction>,
        budgets: Vec<Budget>,
        goals: Vec<SavingsGoal>,
    ) {
        self.transactions = transactions.into_iter().map(|tx| (tx.id, tx)).collect();
        self.budgets = budgets.into_iter().map(|b| (b.id, b)).collect();
        self.goals = goals.into_iter().map(|g| (g.id, g)).collect();
        self.revision += 1;

        let revision = self.revision;
        let closed: Vec<ViewKey> = self
            .subscribers
            .keys()
            .filter(|key| match key {
                ViewKey::Goal(id) => !self.goals.contains_key(id),
                ViewKey::Budget(id) => !self.budgets.contains_key(id),
                _ => false,
            })
            .cloned()
            .collect();
        self.subscribers.retain(|key, sender| {
            let signal = if closed.contains(key) {
                ViewSignal::Closed
            } else {
                ViewSignal::Changed(revision)
            };
            sender.send(signal).is_ok()
        });
    }

    /// Registers interest in a view.
    pub fn subscribe(&mut self, key: ViewKey) -> watch::Receiver<ViewSignal> {
        match self.subscribers.get(&key) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = watch::channel(ViewSignal::Fresh);
                self.subscribers.insert(key, sender);
                receiver
            }
        }
    }

    /// Tells the subscribers of `key` to close, and forgets them.
    pub fn close_view(&mut self, key: &ViewKey) {
        if let Some(sender) = self.subscribers.remove(key) {
            sender.send_replace(ViewSignal::Closed);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Restores pre-images captured by the journal. Entities already equal
    /// to their pre-image are left alone.
    pub(crate) fn restore(&mut self, pre_images: PreImages) {
        for (key, before) in pre_images {
            if self.get(key) != before {
                self.write(key, before);
            }
        }
    }

    /// Starts recording the pre-image of every entity written from now on.
    pub(crate) fn start_journal(&mut self) {
        self.journal = Some(Journal::default());
    }

    pub(crate) fn finish_journal(&mut self) -> PreImages {
        self.journal.take().map(|j| j.entries).unwrap_or_default()
    }

    fn write(&mut self, key: EntityKey, after: Option<Entity>) {
        let before = self.get(key);
        if let Some(journal) = self.journal.as_mut()
            && journal.seen.insert(key)
        {
            journal.entries.push((key, before.clone()));
        }

        match after.clone() {
            Some(Entity::Transaction(tx)) => {
                self.transactions.insert(tx.id, tx);
            }
            Some(Entity::Budget(budget)) => {
                self.budgets.insert(budget.id, budget);
            }
            Some(Entity::Goal(goal)) => {
                self.goals.insert(goal.id, goal);
            }
            None => match key {
                EntityKey::Transaction(id) => {
                    self.transactions.remove(&id);
                }
                EntityKey::Budget(id) => {
                    self.budgets.remove(&id);
                }
                EntityKey::Goal(id) => {
                    self.goals.remove(&id);
                }
            },
        }
        self.revision += 1;
        self.notify(before.as_ref(), after.as_ref());
    }

    fn notify(&mut self, before: Option<&Entity>, after: Option<&Entity>) {
        let revision = self.revision;
        self.subscribers.retain(|key, sender| {
            let removed_detail = after.is_none() && before.is_some_and(|e| key.is_detail_of(e));
            let signal = if removed_detail {
                ViewSignal::Closed
            } else if before.is_some_and(|e| key.contains(e))
                || after.is_some_and(|e| key.contains(e))
            {
                ViewSignal::Changed(revision)
            } else {
                return sender.receiver_count() > 0;
            };
            tracing::trace!(?key, ?signal, "view notified");
            sender.send(signal).is_ok()
        });
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::{GoalStatus, Money, TransactionKind, TransactionLink};

    fn goal(name: &str, current: i64) -> SavingsGoal {
        let mut goal =
            SavingsGoal::new(Uuid::new_v4(), name, Money::new(10_000), "").unwrap();
        goal.set_amount(Money::new(current));
        goal
    }

    fn contribution(goal_id: Uuid, cents: i64, day: u32) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            kind: TransactionKind::Expense,
            amount: Money::new(cents),
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            name: "deposit".to_string(),
            category: None,
            description: String::new(),
            link: TransactionLink::Goal { goal_id },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_is_visible_in_every_view() {
        let mut cache = EntityCache::new();
        let g = goal("Car", 0);
        cache.upsert(g.clone());

        cache.patch_where::<SavingsGoal>(|x| x.id == g.id, |x| x.set_amount(Money::new(500)));

        let list = cache.get_view(&ViewKey::Goals);
        let detail = cache.get_view(&ViewKey::Goal(g.id));
        assert_eq!(list.goals()[0].current_amount, Money::new(500));
        assert_eq!(detail.goals()[0].current_amount, Money::new(500));
    }

    #[test]
    fn remove_clears_all_views() {
        let mut cache = EntityCache::new();
        let g = goal("Car", 0);
        let tx = contribution(g.id, 100, 1);
        cache.upsert(g.clone());
        cache.upsert(tx.clone());

        let removed = cache.remove_by_id(EntityKey::Transaction(tx.id));
        assert_eq!(removed, Some(Entity::Transaction(tx)));
        assert!(cache.get_view(&ViewKey::all_transactions()).is_empty());
        assert!(cache.get_view(&ViewKey::goal_transactions(g.id)).is_empty());
        assert_eq!(cache.remove_by_id(EntityKey::Goal(Uuid::new_v4())), None);
    }

    #[test]
    fn transaction_views_are_ordered_and_limited() {
        let mut cache = EntityCache::new();
        let goal_id = Uuid::new_v4();
        for day in [3, 1, 2] {
            cache.upsert(contribution(goal_id, 100, day));
        }

        let rows = cache.get_view(&ViewKey::dashboard(2));
        let days: Vec<u32> = rows
            .transactions()
            .iter()
            .map(|tx| chrono::Datelike::day(&tx.date))
            .collect();
        assert_eq!(days, vec![3, 2]);
    }

    #[test]
    fn patch_where_counts_only_changes() {
        let mut cache = EntityCache::new();
        cache.upsert(goal("A", 0));
        cache.upsert(goal("B", 20_000));

        let revision = cache.revision();
        let changed = cache.patch_where::<SavingsGoal>(
            |_| true,
            |g| {
                let amount = g.current_amount;
                g.set_amount(amount);
            },
        );
        assert_eq!(changed, 0);
        assert_eq!(cache.revision(), revision);
        let completed = cache.find::<SavingsGoal>(|g| g.status == GoalStatus::Completed);
        assert_eq!(completed.len(), 1);
    }

    #[test]
    fn subscribers_are_notified_only_for_matching_writes() {
        let mut cache = EntityCache::new();
        let g = goal("Trip", 0);
        let other = goal("Other", 0);
        cache.upsert(g.clone());
        cache.upsert(other.clone());

        let detail = cache.subscribe(ViewKey::Goal(g.id));
        let budgets = cache.subscribe(ViewKey::Budgets);

        cache.patch_where::<SavingsGoal>(
            |x| x.id == other.id,
            |x| x.set_amount(Money::new(1)),
        );
        assert_eq!(*detail.borrow(), ViewSignal::Fresh);

        cache.patch_where::<SavingsGoal>(|x| x.id == g.id, |x| x.set_amount(Money::new(1)));
        assert_eq!(*detail.borrow(), ViewSignal::Changed(cache.revision()));
        assert_eq!(*budgets.borrow(), ViewSignal::Fresh);

        cache.remove_by_id(EntityKey::Goal(g.id));
        assert_eq!(*detail.borrow(), ViewSignal::Closed);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut cache = EntityCache::new();
        let g = goal("Trip", 0);
        cache.upsert(g.clone());
        drop(cache.subscribe(ViewKey::Goals));
        assert_eq!(cache.subscriber_count(), 1);

        cache.upsert(goal("Next", 0));
        assert_eq!(cache.subscriber_count(), 0);
    }

    #[test]
    fn journal_restores_pre_images() {
        let mut cache = EntityCache::new();
        let g = goal("Trip", 100);
        cache.upsert(g.clone());

        cache.start_journal();
        cache.patch_where::<SavingsGoal>(|_| true, |x| x.set_amount(Money::new(900)));
        let added = contribution(g.id, 800, 2);
        cache.upsert(added.clone());
        let journal = cache.finish_journal();
        assert_eq!(journal.len(), 2);

        cache.restore(journal);
        assert_eq!(cache.goal(g.id), Some(&g));
        assert!(cache.transaction(added.id).is_none());
    }
}
