//! Mapping between the wire types of `api_types` and the engine's domain
//! types.

use api_types::{
    budget::{BudgetDeleted as WireBudgetDeleted, BudgetView},
    page,
    savings_goal::{self as wire_goal, SavingsGoalUpdate, SavingsGoalView},
    transaction::{
        TransactionCreated, TransactionFilter, TransactionListResponse, TransactionNew,
        TransactionType, TransactionView,
    },
};
use engine::{
    Budget, GoalPatch, GoalStatus, Money, NewTransaction, RemoteError, SavingsGoal, Transaction,
    TransactionKind, TransactionLink,
    remote::{BudgetDeleted, CreatedTransaction, PageMeta, TransactionPage, TransactionQuery},
};

pub fn kind_to_wire(kind: TransactionKind) -> TransactionType {
    match kind {
        TransactionKind::Income => TransactionType::Income,
        TransactionKind::Expense => TransactionType::Expense,
    }
}

pub fn kind_from_wire(kind: TransactionType) -> TransactionKind {
    match kind {
        TransactionType::Income => TransactionKind::Income,
        TransactionType::Expense => TransactionKind::Expense,
    }
}

fn status_from_wire(status: wire_goal::GoalStatus) -> GoalStatus {
    match status {
        wire_goal::GoalStatus::Active => GoalStatus::Active,
        wire_goal::GoalStatus::Completed => GoalStatus::Completed,
        wire_goal::GoalStatus::Cancelled => GoalStatus::Cancelled,
    }
}

/// A record carrying both references is malformed; it is reported as a
/// service-side validation failure.
pub fn transaction_from_wire(view: TransactionView) -> Result<Transaction, RemoteError> {
    let link = TransactionLink::from_refs(view.budget_id, view.saving_goal_id)
        .map_err(|err| RemoteError::Validation(format!("transaction {}: {err}", view.id)))?;
    Ok(Transaction {
        id: view.id,
        kind: kind_from_wire(view.kind),
        amount: Money::new(view.amount_minor),
        date: view.date,
        name: view.name,
        category: view.category,
        description: view.description,
        link,
        created_at: view.created_at,
    })
}

pub fn transaction_to_wire(payload: &NewTransaction) -> TransactionNew {
    TransactionNew {
        date: payload.date,
        amount_minor: payload.amount.cents(),
        kind: kind_to_wire(payload.kind),
        name: payload.name.trim().to_string(),
        category: payload.category.clone(),
        description: payload.description.clone(),
        budget_id: payload.link.budget_id(),
        saving_goal_id: payload.link.goal_id(),
    }
}

pub fn created_from_wire(created: TransactionCreated) -> Result<CreatedTransaction, RemoteError> {
    Ok(CreatedTransaction {
        transaction: transaction_from_wire(created.transaction)?,
        goal_deleted: created.saving_goal_deleted,
    })
}

pub fn query_to_wire(query: &TransactionQuery) -> TransactionFilter {
    TransactionFilter {
        page: Some(query.page),
        per_page: Some(query.per_page),
        kind: query.kind.map(kind_to_wire),
        category: query.category.clone(),
        budget_id: query.budget_id,
        saving_goal_id: query.goal_id,
        from: query.from,
        to: query.to,
    }
}

fn page_from_wire(meta: page::PageMeta) -> PageMeta {
    PageMeta {
        page: meta.page,
        per_page: meta.per_page,
        total: meta.total,
        total_pages: meta.total_pages,
    }
}

pub fn page_from_response(response: TransactionListResponse) -> Result<TransactionPage, RemoteError> {
    let data = response
        .data
        .into_iter()
        .map(transaction_from_wire)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TransactionPage {
        data,
        page: page_from_wire(response.meta),
    })
}

pub fn goal_from_wire(view: SavingsGoalView) -> SavingsGoal {
    SavingsGoal {
        id: view.id,
        name: view.name,
        target_amount: Money::new(view.target_amount_minor),
        current_amount: Money::new(view.current_amount_minor),
        description: view.description,
        status: status_from_wire(view.status),
    }
}

/// The current amount is never sent: it only moves through transactions.
pub fn goal_patch_to_wire(patch: &GoalPatch) -> SavingsGoalUpdate {
    SavingsGoalUpdate {
        name: patch.name.clone(),
        target_amount_minor: patch.target_amount.map(Money::cents),
        current_amount_minor: None,
        description: patch.description.clone(),
        status: patch.cancelled.map(|cancelled| {
            if cancelled {
                wire_goal::GoalStatus::Cancelled
            } else {
                wire_goal::GoalStatus::Active
            }
        }),
    }
}

pub fn budget_from_wire(view: BudgetView) -> Budget {
    Budget {
        id: view.id,
        name: view.name,
        amount: Money::new(view.amount_minor),
        category: view.category,
        start_date: view.start_date,
        end_date: view.end_date,
    }
}

pub fn budget_deleted_from_wire(receipt: WireBudgetDeleted) -> BudgetDeleted {
    BudgetDeleted {
        deleted: receipt.deleted,
        transaction_count: receipt.transaction_count,
    }
}
