//! The module contains the errors the engine can return.
//!
//! The taxonomy is:
//!
//! - [`Validation`] raised before any cache write or remote call; nothing has
//!   to be rolled back.
//! - [`Remote`] the ledger service rejected the call; the associated mutation
//!   has already been rolled back when the caller sees it.
//! - [`PartialCascadeFailure`] a cascade deletion failed after some remote
//!   deletions went through; the cache holds the full pre-operation snapshot.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`Remote`]: EngineError::Remote
//!  [`PartialCascadeFailure`]: EngineError::PartialCascadeFailure
use thiserror::Error;
use uuid::Uuid;

use crate::Money;

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(
        "cascade deletion failed after {} remote deletion(s); local state restored: {source}",
        .deleted.len()
    )]
    PartialCascadeFailure {
        /// Transactions the service already deleted before the failure.
        deleted: Vec<Uuid>,
        /// The transaction (or owning entity) whose deletion failed.
        failed: Uuid,
        source: RemoteError,
    },
    #[error("\"{0}\" not found!")]
    NotFound(String),
    /// A refresh was requested while mutations were still unsettled.
    #[error("{0} mutation(s) still in flight")]
    Busy(usize),
}

impl EngineError {
    /// Returns `true` for errors raised before anything was mutated.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Client-side constraint violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Money, available: Money },
    #[error("insufficient goal balance: requested {requested}, available {available}")]
    InsufficientGoalBalance { requested: Money, available: Money },
    #[error("goal \"{0}\" is cancelled")]
    GoalCancelled(String),
    #[error("a transaction cannot reference both a budget and a savings goal")]
    ConflictingLink,
    #[error("{0} name must not be empty")]
    EmptyName(&'static str),
    #[error("budget ends before it starts")]
    InvalidDateRange,
}

/// Failures reported by the remote ledger service.
///
/// Transport failures carry the rendered message so the engine stays
/// independent from the HTTP client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("rejected by the service: {0}")]
    Validation(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered but reported the deletion as not performed.
    #[error("the service did not delete {0}")]
    Rejected(String),
}
