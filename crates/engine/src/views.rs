//! Named projections over the entity cache.
//!
//! A view is a predicate plus an ordering; it never owns entities. Two views
//! showing the same goal read the same record from the id index.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{Budget, Entity, SavingsGoal, Transaction, TransactionKind, TransactionLink};

/// Which transactions a view shows with respect to their link.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LinkFilter {
    #[default]
    Any,
    Unlinked,
    Budget(Uuid),
    Goal(Uuid),
}

impl LinkFilter {
    fn matches(self, link: TransactionLink) -> bool {
        match self {
            Self::Any => true,
            Self::Unlinked => !link.is_linked(),
            Self::Budget(id) => link.budget_id() == Some(id),
            Self::Goal(id) => link.goal_id() == Some(id),
        }
    }
}

/// Filter signature of a transaction view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub link: LinkFilter,
    /// Keep only the newest `limit` rows.
    pub limit: Option<usize>,
}

impl TransactionFilter {
    #[must_use]
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    #[must_use]
    pub fn link(mut self, link: LinkFilter) -> Self {
        self.link = link;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Row predicate; `limit` is applied after ordering.
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.kind.is_none_or(|kind| tx.kind == kind)
            && self
                .category
                .as_deref()
                .is_none_or(|category| tx.category.as_deref() == Some(category))
            && self.from.is_none_or(|from| tx.date >= from)
            && self.to.is_none_or(|to| tx.date <= to)
            && self.link.matches(tx.link)
    }
}

/// Key of a named query.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ViewKey {
    Transactions(TransactionFilter),
    Goals,
    Goal(Uuid),
    Budgets,
    Budget(Uuid),
}

impl ViewKey {
    pub fn all_transactions() -> Self {
        Self::Transactions(TransactionFilter::default())
    }

    pub fn goal_transactions(goal_id: Uuid) -> Self {
        Self::Transactions(TransactionFilter::default().link(LinkFilter::Goal(goal_id)))
    }

    pub fn budget_transactions(budget_id: Uuid) -> Self {
        Self::Transactions(TransactionFilter::default().link(LinkFilter::Budget(budget_id)))
    }

    /// The "recent activity" list of the dashboard.
    pub fn dashboard(limit: usize) -> Self {
        Self::Transactions(TransactionFilter::default().limit(limit))
    }

    /// Whether `entity` belongs to this view.
    ///
    /// Limited transaction views answer for the unlimited predicate, so a
    /// write just outside the visible window may still notify them.
    pub fn contains(&self, entity: &Entity) -> bool {
        match (self, entity) {
            (Self::Transactions(filter), Entity::Transaction(tx)) => filter.matches(tx),
            (Self::Goals, Entity::Goal(_)) => true,
            (Self::Goal(id), Entity::Goal(goal)) => goal.id == *id,
            (Self::Budgets, Entity::Budget(_)) => true,
            (Self::Budget(id), Entity::Budget(budget)) => budget.id == *id,
            _ => false,
        }
    }

    /// Detail views stop making sense once their entity is gone.
    pub(crate) fn is_detail_of(&self, entity: &Entity) -> bool {
        match (self, entity) {
            (Self::Goal(id), Entity::Goal(goal)) => goal.id == *id,
            (Self::Budget(id), Entity::Budget(budget)) => budget.id == *id,
            _ => false,
        }
    }
}

/// Materialized content of a view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewSnapshot {
    Transactions(Vec<Transaction>),
    Goals(Vec<SavingsGoal>),
    Goal(Option<SavingsGoal>),
    Budgets(Vec<Budget>),
    Budget(Option<Budget>),
}

impl ViewSnapshot {
    pub fn transactions(&self) -> &[Transaction] {
        match self {
            Self::Transactions(items) => items,
            _ => &[],
        }
    }

    pub fn goals(&self) -> Vec<&SavingsGoal> {
        match self {
            Self::Goals(items) => items.iter().collect(),
            Self::Goal(item) => item.iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn budgets(&self) -> Vec<&Budget> {
        match self {
            Self::Budgets(items) => items.iter().collect(),
            Self::Budget(item) => item.iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Transactions(items) => items.is_empty(),
            Self::Goals(items) => items.is_empty(),
            Self::Goal(item) => item.is_none(),
            Self::Budgets(items) => items.is_empty(),
            Self::Budget(item) => item.is_none(),
        }
    }
}

/// What a subscriber of a view is told.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewSignal {
    /// Nothing has changed since subscribing.
    Fresh,
    /// The view content changed at the given cache revision.
    Changed(u64),
    /// The entity behind a detail view was removed; the view should close.
    Closed,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::Money;

    fn tx(kind: TransactionKind, category: Option<&str>, link: TransactionLink) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            kind,
            amount: Money::new(100),
            date: NaiveDate::from_ymd_opt(2024, 4, 15).unwrap(),
            name: "row".to_string(),
            category: category.map(str::to_string),
            description: String::new(),
            link,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn filter_combines_predicates() {
        let filter = TransactionFilter::default()
            .kind(TransactionKind::Expense)
            .category("food")
            .between(
                NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
            );

        assert!(filter.matches(&tx(
            TransactionKind::Expense,
            Some("food"),
            TransactionLink::Unlinked
        )));
        assert!(!filter.matches(&tx(
            TransactionKind::Income,
            Some("food"),
            TransactionLink::Unlinked
        )));
        assert!(!filter.matches(&tx(TransactionKind::Expense, None, TransactionLink::Unlinked)));
    }

    #[test]
    fn goal_views_match_only_their_goal() {
        let goal_id = Uuid::new_v4();
        let linked = tx(
            TransactionKind::Expense,
            None,
            TransactionLink::Goal { goal_id },
        );
        let other = tx(
            TransactionKind::Expense,
            None,
            TransactionLink::Goal {
                goal_id: Uuid::new_v4(),
            },
        );

        let view = ViewKey::goal_transactions(goal_id);
        assert!(view.contains(&Entity::Transaction(linked)));
        assert!(!view.contains(&Entity::Transaction(other)));
        assert!(!ViewKey::Goals.contains(&Entity::Transaction(tx(
            TransactionKind::Income,
            None,
            TransactionLink::Unlinked
        ))));
    }

    #[test]
    fn unlinked_filter() {
        let budget_id = Uuid::new_v4();
        let filter = TransactionFilter::default().link(LinkFilter::Unlinked);
        assert!(filter.matches(&tx(TransactionKind::Income, None, TransactionLink::Unlinked)));
        assert!(!filter.matches(&tx(
            TransactionKind::Expense,
            None,
            TransactionLink::Budget { budget_id }
        )));
    }
}
