//! Command structs for engine write operations.
//!
//! These types group the parameters of a transaction creation, keeping call
//! sites readable and avoiding long argument lists. The same command is what
//! a bulk importer produces for each record.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{Money, Transaction, TransactionKind, TransactionLink, ValidationError};

/// Create a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub amount: Money,
    pub date: NaiveDate,
    pub name: String,
    pub category: Option<String>,
    pub description: String,
    pub link: TransactionLink,
}

impl NewTransaction {
    #[must_use]
    pub fn new(
        kind: TransactionKind,
        amount: Money,
        date: NaiveDate,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            amount,
            date,
            name: name.into(),
            category: None,
            description: String::new(),
            link: TransactionLink::Unlinked,
        }
    }

    #[must_use]
    pub fn income(amount: Money, date: NaiveDate, name: impl Into<String>) -> Self {
        Self::new(TransactionKind::Income, amount, date, name)
    }

    #[must_use]
    pub fn expense(amount: Money, date: NaiveDate, name: impl Into<String>) -> Self {
        Self::new(TransactionKind::Expense, amount, date, name)
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn budget(mut self, budget_id: Uuid) -> Self {
        self.link = TransactionLink::Budget { budget_id };
        self
    }

    #[must_use]
    pub fn goal(mut self, goal_id: Uuid) -> Self {
        self.link = TransactionLink::Goal { goal_id };
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount);
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("transaction"));
        }
        Ok(())
    }

    /// The speculative record shown until the service assigns the real id.
    pub fn provisional(&self, id: Uuid, created_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            kind: self.kind,
            amount: self.amount,
            date: self.date,
            name: self.name.trim().to_string(),
            category: self.category.clone(),
            description: self.description.clone(),
            link: self.link,
            created_at,
        }
    }
}
