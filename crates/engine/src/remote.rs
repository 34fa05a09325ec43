//! Contract of the remote ledger service.
//!
//! The engine never talks HTTP; a client crate implements
//! [`LedgerService`] and converts its wire types into the domain types used
//! here.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    Budget, GoalPatch, NewTransaction, RemoteError, SavingsGoal, Transaction, TransactionKind,
};

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Page size used when the engine pages through `list_transactions`.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Query of `list_transactions`. Pages are 1-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionQuery {
    pub page: u32,
    pub per_page: u32,
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    pub budget_id: Option<Uuid>,
    pub goal_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
            kind: None,
            category: None,
            budget_id: None,
            goal_id: None,
            from: None,
            to: None,
        }
    }
}

impl TransactionQuery {
    #[must_use]
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl PageMeta {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionPage {
    pub data: Vec<Transaction>,
    pub page: PageMeta,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedTransaction {
    pub transaction: Transaction,
    /// The service removed the linked goal as a side effect.
    pub goal_deleted: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BudgetDeleted {
    pub deleted: bool,
    pub transaction_count: u64,
}

/// The remote ledger service.
///
/// Calls must be `Send`: once sent, a call is driven to completion on its own
/// task. Implementations can use plain `async fn`.
pub trait LedgerService: Send + Sync + 'static {
    fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> impl Future<Output = RemoteResult<TransactionPage>> + Send;

    fn create_transaction(
        &self,
        payload: &NewTransaction,
    ) -> impl Future<Output = RemoteResult<CreatedTransaction>> + Send;

    /// Resolves to the service's `deleted` flag.
    fn delete_transaction(&self, id: Uuid) -> impl Future<Output = RemoteResult<bool>> + Send;

    fn list_savings_goals(&self) -> impl Future<Output = RemoteResult<Vec<SavingsGoal>>> + Send;

    fn update_savings_goal(
        &self,
        id: Uuid,
        patch: &GoalPatch,
    ) -> impl Future<Output = RemoteResult<SavingsGoal>> + Send;

    fn delete_savings_goal(&self, id: Uuid) -> impl Future<Output = RemoteResult<bool>> + Send;

    fn list_budgets(&self) -> impl Future<Output = RemoteResult<Vec<Budget>>> + Send;

    fn delete_budget(&self, id: Uuid) -> impl Future<Output = RemoteResult<BudgetDeleted>> + Send;
}

/// Turns a `deleted: false` answer into an error.
pub(crate) fn ensure_deleted(deleted: bool, what: impl FnOnce() -> String) -> RemoteResult<()> {
    if deleted {
        Ok(())
    } else {
        Err(RemoteError::Rejected(what()))
    }
}
