//! Client-side reconciliation engine for a personal ledger.
//!
//! A [`Ledger`] keeps an [`EntityCache`] of transactions, budgets and savings
//! goals in sync with a remote [`LedgerService`]. Every write is applied
//! optimistically through the [`Coordinator`] and confirmed or rolled back
//! once the service answers.

pub use budgets::{Budget, BudgetStatus};
pub use cache::{CacheSnapshot, Cached, Entity, EntityCache, EntityKey};
pub use commands::NewTransaction;
pub use coordinator::{Coordinator, MutationGuard, MutationToken, ServerResult, SharedCache};
pub use error::{EngineError, RemoteError, ValidationError};
pub use money::Money;
pub use ops::{
    ContributionOutcome, DeleteMode, DeletionOutcome, Direction, Ledger, LedgerBuilder,
};
pub use remote::LedgerService;
pub use savings_goals::{GoalPatch, GoalStatus, SavingsGoal};
pub use transactions::{Transaction, TransactionKind, TransactionLink};

pub mod aggregation;
mod budgets;
mod cache;
mod commands;
mod coordinator;
mod error;
mod money;
mod ops;
pub mod remote;
mod saga;
mod savings_goals;
mod transactions;
pub mod views;

pub type ResultEngine<T> = Result<T, EngineError>;
