//! Transaction primitives.
//!
//! A `Transaction` moves money in or out of the general balance. It may be
//! linked to exactly one budget or one savings goal; the link is a tagged
//! variant so "both" is unrepresentable.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Money, ValidationError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

/// What a transaction is attached to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionLink {
    #[default]
    Unlinked,
    Budget {
        budget_id: Uuid,
    },
    Goal {
        goal_id: Uuid,
    },
}

impl TransactionLink {
    /// Builds a link from the two optional references of the wire format.
    pub fn from_refs(
        budget_id: Option<Uuid>,
        goal_id: Option<Uuid>,
    ) -> Result<Self, ValidationError> {
        match (budget_id, goal_id) {
            (None, None) => Ok(Self::Unlinked),
            (Some(budget_id), None) => Ok(Self::Budget { budget_id }),
            (None, Some(goal_id)) => Ok(Self::Goal { goal_id }),
            (Some(_), Some(_)) => Err(ValidationError::ConflictingLink),
        }
    }

    pub fn budget_id(self) -> Option<Uuid> {
        match self {
            Self::Budget { budget_id } => Some(budget_id),
            _ => None,
        }
    }

    pub fn goal_id(self) -> Option<Uuid> {
        match self {
            Self::Goal { goal_id } => Some(goal_id),
            _ => None,
        }
    }

    pub fn is_linked(self) -> bool {
        !matches!(self, Self::Unlinked)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    /// Always positive; `kind` gives the direction.
    pub amount: Money,
    pub date: NaiveDate,
    pub name: String,
    pub category: Option<String>,
    pub description: String,
    pub link: TransactionLink,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Effect on the general balance: income adds, expense subtracts.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }

    /// Effect on the linked goal's `current_amount`.
    ///
    /// A contribution is an expense (money leaves the general balance and
    /// enters the goal); a withdrawal is an income.
    pub fn goal_delta(&self) -> Money {
        -self.signed_amount()
    }

    pub fn is_contribution(&self) -> bool {
        self.link.goal_id().is_some() && self.kind == TransactionKind::Expense
    }

    pub fn is_withdrawal(&self) -> bool {
        self.link.goal_id().is_some() && self.kind == TransactionKind::Income
    }

    pub fn is_linked_to_goal(&self, goal_id: Uuid) -> bool {
        self.link.goal_id() == Some(goal_id)
    }

    pub fn is_linked_to_budget(&self, budget_id: Uuid) -> bool {
        self.link.budget_id() == Some(budget_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(kind: TransactionKind, link: TransactionLink) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            kind,
            amount: Money::new(1500),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            name: "test".to_string(),
            category: None,
            description: String::new(),
            link,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn link_rejects_both_references() {
        let err = TransactionLink::from_refs(Some(Uuid::new_v4()), Some(Uuid::new_v4()));
        assert_eq!(err, Err(ValidationError::ConflictingLink));
        assert_eq!(
            TransactionLink::from_refs(None, None),
            Ok(TransactionLink::Unlinked)
        );
    }

    #[test]
    fn contribution_and_withdrawal_signs() {
        let goal_id = Uuid::new_v4();
        let contribution = tx(TransactionKind::Expense, TransactionLink::Goal { goal_id });
        let withdrawal = tx(TransactionKind::Income, TransactionLink::Goal { goal_id });

        assert!(contribution.is_contribution());
        assert_eq!(contribution.signed_amount(), Money::new(-1500));
        assert_eq!(contribution.goal_delta(), Money::new(1500));
        assert!(withdrawal.is_withdrawal());
        assert_eq!(withdrawal.goal_delta(), Money::new(-1500));
    }

    #[test]
    fn budget_link_is_not_a_contribution() {
        let budget_id = Uuid::new_v4();
        let expense = tx(TransactionKind::Expense, TransactionLink::Budget { budget_id });
        assert!(!expense.is_contribution());
        assert!(expense.is_linked_to_budget(budget_id));
    }

    #[test]
    fn link_serializes_tagged() {
        let goal_id = Uuid::nil();
        let json = serde_json::to_value(TransactionLink::Goal { goal_id }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "goal", "goal_id": goal_id.to_string() })
        );
        let unlinked: TransactionLink =
            serde_json::from_value(serde_json::json!({ "kind": "unlinked" })).unwrap();
        assert_eq!(unlinked, TransactionLink::Unlinked);
    }
}
