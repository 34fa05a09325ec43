//! Savings goals.
//!
//! `current_amount` mirrors the signed sum of the goal's linked transactions
//! once every mutation touching it has settled. `status` follows the amount:
//! a goal is `Completed` exactly when `current_amount >= target_amount`.
//! Cancelled goals keep their status regardless of the amount.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Money, ValidationError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Completed,
    Cancelled,
}

impl GoalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsGoal {
    pub id: Uuid,
    pub name: String,
    pub target_amount: Money,
    pub current_amount: Money,
    pub description: String,
    pub status: GoalStatus,
}

impl SavingsGoal {
    pub fn new(
        id: Uuid,
        name: &str,
        target_amount: Money,
        description: &str,
    ) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName("goal"));
        }
        if !target_amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount);
        }
        Ok(Self {
            id,
            name: name.to_string(),
            target_amount,
            current_amount: Money::ZERO,
            description: description.trim().to_string(),
            status: GoalStatus::Active,
        })
    }

    /// Status the goal would have with `amount` saved.
    pub fn status_for(&self, amount: Money) -> GoalStatus {
        match self.status {
            GoalStatus::Cancelled => GoalStatus::Cancelled,
            _ if amount >= self.target_amount => GoalStatus::Completed,
            _ => GoalStatus::Active,
        }
    }

    /// Sets `current_amount` and recomputes `status`.
    pub fn set_amount(&mut self, amount: Money) {
        self.status = self.status_for(amount);
        self.current_amount = amount;
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == GoalStatus::Cancelled
    }
}

/// Editable fields of a goal. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GoalPatch {
    pub name: Option<String>,
    pub target_amount: Option<Money>,
    pub description: Option<String>,
    pub cancelled: Option<bool>,
}

impl GoalPatch {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn target_amount(mut self, amount: Money) -> Self {
        self.target_amount = Some(amount);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = Some(cancelled);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(ValidationError::EmptyName("goal"));
        }
        if let Some(target) = self.target_amount
            && !target.is_positive()
        {
            return Err(ValidationError::NonPositiveAmount);
        }
        Ok(())
    }

    /// Applies the patch in place, recomputing the status.
    pub fn apply(&self, goal: &mut SavingsGoal) {
        if let Some(name) = &self.name {
            goal.name = name.trim().to_string();
        }
        if let Some(target) = self.target_amount {
            goal.target_amount = target;
        }
        if let Some(description) = &self.description {
            goal.description = description.trim().to_string();
        }
        match self.cancelled {
            Some(true) => goal.status = GoalStatus::Cancelled,
            Some(false) if goal.is_cancelled() => goal.status = GoalStatus::Active,
            _ => {}
        }
        goal.set_amount(goal.current_amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal(target: i64, current: i64) -> SavingsGoal {
        let mut goal = SavingsGoal::new(Uuid::new_v4(), "Bike", Money::new(target), "").unwrap();
        goal.set_amount(Money::new(current));
        goal
    }

    #[test]
    fn completes_when_target_reached() {
        let mut g = goal(10_000, 9_000);
        assert_eq!(g.status, GoalStatus::Active);
        g.set_amount(Money::new(10_000));
        assert_eq!(g.status, GoalStatus::Completed);
        g.set_amount(Money::new(4_000));
        assert_eq!(g.status, GoalStatus::Active);
    }

    #[test]
    fn cancelled_is_sticky() {
        let mut g = goal(100, 0);
        GoalPatch::default().cancelled(true).apply(&mut g);
        g.set_amount(Money::new(500));
        assert_eq!(g.status, GoalStatus::Cancelled);

        GoalPatch::default().cancelled(false).apply(&mut g);
        assert_eq!(g.status, GoalStatus::Completed);
    }

    #[test]
    fn lowering_target_recomputes_status() {
        let mut g = goal(10_000, 5_000);
        GoalPatch::default()
            .target_amount(Money::new(5_000))
            .apply(&mut g);
        assert_eq!(g.status, GoalStatus::Completed);
    }

    #[test]
    fn patch_validation() {
        assert_eq!(
            GoalPatch::default().name("  ").validate(),
            Err(ValidationError::EmptyName("goal"))
        );
        assert_eq!(
            GoalPatch::default().target_amount(Money::ZERO).validate(),
            Err(ValidationError::NonPositiveAmount)
        );
    }
}
