//! Budgets: an allocation ceiling over a date window for one category.
//!
//! `spent` is never stored, see [`crate::aggregation::budget_spent`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Money, ValidationError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Active,
    NearLimit,
    Overspent,
    Expired,
    Completed,
}

impl BudgetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::NearLimit => "near_limit",
            Self::Overspent => "overspent",
            Self::Expired => "expired",
            Self::Completed => "completed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub name: String,
    pub amount: Money,
    pub category: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Budget {
    pub fn new(
        id: Uuid,
        name: &str,
        amount: Money,
        category: Option<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName("budget"));
        }
        if !amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount);
        }
        if end_date < start_date {
            return Err(ValidationError::InvalidDateRange);
        }
        Ok(Self {
            id,
            name: name.to_string(),
            amount,
            category,
            start_date,
            end_date,
        })
    }

    /// Inclusive on both ends.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}
