//! Wire types of the remote ledger service.
//!
//! Amounts travel as integer minor units (`amount_minor`), dates as
//! `YYYY-MM-DD` and timestamps as RFC3339.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Generic deletion receipt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Deleted {
    pub deleted: bool,
}

pub mod page {
    use super::*;

    /// Page metadata returned by list endpoints.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct PageMeta {
        pub page: u32,
        pub per_page: u32,
        pub total: u64,
        pub total_pages: u32,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionType {
        Income,
        Expense,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct TransactionFilter {
        pub page: Option<u32>,
        pub per_page: Option<u32>,
        #[serde(rename = "type")]
        pub kind: Option<TransactionType>,
        pub category: Option<String>,
        pub budget_id: Option<Uuid>,
        pub saving_goal_id: Option<Uuid>,
        pub from: Option<NaiveDate>,
        pub to: Option<NaiveDate>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        pub date: NaiveDate,
        pub amount_minor: i64,
        #[serde(rename = "type")]
        pub kind: TransactionType,
        pub name: String,
        pub category: Option<String>,
        #[serde(default)]
        pub description: String,
        pub budget_id: Option<Uuid>,
        pub saving_goal_id: Option<Uuid>,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub data: Vec<TransactionView>,
        pub meta: page::PageMeta,
    }

    /// Request body for creating a transaction.
    ///
    /// At most one of `budget_id` / `saving_goal_id` may be set.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TransactionNew {
        pub date: NaiveDate,
        /// Must be > 0. The type defines the direction.
        pub amount_minor: i64,
        #[serde(rename = "type")]
        pub kind: TransactionType,
        pub name: String,
        pub category: Option<String>,
        pub description: String,
        pub budget_id: Option<Uuid>,
        pub saving_goal_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionCreated {
        #[serde(flatten)]
        pub transaction: TransactionView,
        /// Set when the service removed the linked goal as a side effect
        /// (a withdrawal that empties it).
        #[serde(default)]
        pub saving_goal_deleted: bool,
    }
}

pub mod savings_goal {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum GoalStatus {
        Active,
        Completed,
        Cancelled,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SavingsGoalView {
        pub id: Uuid,
        pub name: String,
        pub target_amount_minor: i64,
        pub current_amount_minor: i64,
        #[serde(default)]
        pub description: String,
        pub status: GoalStatus,
    }

    /// Partial update; absent fields are left untouched by the service.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct SavingsGoalUpdate {
        pub name: Option<String>,
        pub target_amount_minor: Option<i64>,
        pub current_amount_minor: Option<i64>,
        pub description: Option<String>,
        pub status: Option<GoalStatus>,
    }
}

pub mod budget {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BudgetView {
        pub id: Uuid,
        pub name: String,
        pub amount_minor: i64,
        pub category: Option<String>,
        pub start_date: NaiveDate,
        pub end_date: NaiveDate,
    }

    #[derive(Debug, Clone, Copy, Serialize, Deserialize)]
    pub struct BudgetDeleted {
        pub deleted: bool,
        #[serde(default)]
        pub transaction_count: u64,
    }
}
