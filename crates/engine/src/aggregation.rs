//! Derived figures, recomputed from a cache snapshot on every read.
//!
//! Nothing here is stored: a mutation followed by a read always yields
//! figures consistent with the mutation.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    Budget, BudgetStatus, CacheSnapshot, Money, SavingsGoal, Transaction, TransactionKind,
};

/// Spent share (in percent) from which a budget counts as near its limit.
pub const NEAR_LIMIT_PERCENT: i64 = 80;

pub const UNCATEGORIZED: &str = "uncategorized";

pub fn total_income(transactions: &[Transaction]) -> Money {
    sum_kind(transactions, TransactionKind::Income)
}

pub fn total_expenses(transactions: &[Transaction]) -> Money {
    sum_kind(transactions, TransactionKind::Expense)
}

/// `Σincome − Σexpense`. Goal contributions are expenses of the general
/// balance and withdrawals are income.
pub fn net_balance(transactions: &[Transaction]) -> Money {
    transactions.iter().map(Transaction::signed_amount).sum()
}

/// Sum of goal contributions (goal-linked expenses).
pub fn total_contributions(transactions: &[Transaction]) -> Money {
    transactions
        .iter()
        .filter(|tx| tx.is_contribution())
        .map(|tx| tx.amount)
        .sum()
}

/// `Σcontributions / Σincome`, with withdrawals from goals not counted as
/// income. Zero income yields `0.0`.
pub fn savings_rate(transactions: &[Transaction]) -> f64 {
    let earned: Money = transactions
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Income && !tx.is_withdrawal())
        .map(|tx| tx.amount)
        .sum();
    if !earned.is_positive() {
        return 0.0;
    }
    total_contributions(transactions).as_f64() / earned.as_f64()
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GoalProgress {
    pub goal_id: Uuid,
    /// `min(current / target · 100, 100)`.
    pub percent: f64,
    /// `max(target − current, 0)`.
    pub remaining: Money,
}

pub fn goal_progress(goal: &SavingsGoal) -> GoalProgress {
    let percent = if goal.target_amount.is_positive() {
        (goal.current_amount.as_f64() / goal.target_amount.as_f64() * 100.0).clamp(0.0, 100.0)
    } else {
        100.0
    };
    GoalProgress {
        goal_id: goal.id,
        percent,
        remaining: (goal.target_amount - goal.current_amount).max_zero(),
    }
}

/// Signed sum of the transactions linked to `goal_id`.
pub fn goal_ledger_sum(goal_id: Uuid, transactions: &[Transaction]) -> Money {
    transactions
        .iter()
        .filter(|tx| tx.is_linked_to_goal(goal_id))
        .map(Transaction::goal_delta)
        .sum()
}

/// `current_amount − Σ linked`. Zero for every goal of a settled ledger.
pub fn goal_ledger_drift(goal: &SavingsGoal, transactions: &[Transaction]) -> Money {
    goal.current_amount - goal_ledger_sum(goal.id, transactions)
}

/// Expenses linked to the budget and dated inside its window.
pub fn budget_spent(budget: &Budget, transactions: &[Transaction]) -> Money {
    transactions
        .iter()
        .filter(|tx| {
            tx.kind == TransactionKind::Expense
                && tx.is_linked_to_budget(budget.id)
                && budget.covers(tx.date)
        })
        .map(|tx| tx.amount)
        .sum()
}

/// Status from spend, allocation and the date window.
///
/// Past the window a budget is `Completed` if it stayed within its
/// allocation and `Expired` otherwise.
pub fn budget_status(budget: &Budget, spent: Money, today: NaiveDate) -> BudgetStatus {
    let over = spent > budget.amount;
    if today > budget.end_date {
        return if over {
            BudgetStatus::Expired
        } else {
            BudgetStatus::Completed
        };
    }
    if over {
        BudgetStatus::Overspent
    } else if i128::from(spent.cents()) * 100
        >= i128::from(budget.amount.cents()) * i128::from(NEAR_LIMIT_PERCENT)
    {
        BudgetStatus::NearLimit
    } else {
        BudgetStatus::Active
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BudgetCompliance {
    pub budget_id: Uuid,
    pub name: String,
    pub allocated: Money,
    pub spent: Money,
    /// May be negative when overspent.
    pub remaining: Money,
    pub is_over: bool,
    pub status: BudgetStatus,
}

pub fn budget_compliance(
    budget: &Budget,
    transactions: &[Transaction],
    today: NaiveDate,
) -> BudgetCompliance {
    let spent = budget_spent(budget, transactions);
    BudgetCompliance {
        budget_id: budget.id,
        name: budget.name.clone(),
        allocated: budget.amount,
        spent,
        remaining: budget.amount - spent,
        is_over: spent > budget.amount,
        status: budget_status(budget, spent, today),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Money,
}

/// Expenses grouped by category, largest first (ties by name).
pub fn expense_breakdown(transactions: &[Transaction]) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<&str, Money> = BTreeMap::new();
    for tx in transactions
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Expense)
    {
        let category = tx.category.as_deref().unwrap_or(UNCATEGORIZED);
        *totals.entry(category).or_default() += tx.amount;
    }

    let mut breakdown: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, total)| CategoryTotal {
            category: category.to_string(),
            total,
        })
        .collect();
    breakdown.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.category.cmp(&b.category))
    });
    breakdown
}

/// Everything the dashboard shows, derived in one pass over a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardStats {
    pub net_balance: Money,
    pub total_income: Money,
    pub total_expenses: Money,
    pub savings_rate: f64,
    pub goals: Vec<GoalProgress>,
    pub budgets: Vec<BudgetCompliance>,
    pub expense_breakdown: Vec<CategoryTotal>,
}

pub fn dashboard(snapshot: &CacheSnapshot, today: NaiveDate) -> DashboardStats {
    let transactions = &snapshot.transactions;

    let mut goals: Vec<&SavingsGoal> = snapshot.goals.iter().collect();
    goals.sort_by(|a, b| a.name.cmp(&b.name));
    let mut budgets: Vec<&Budget> = snapshot.budgets.iter().collect();
    budgets.sort_by(|a, b| a.name.cmp(&b.name));

    DashboardStats {
        net_balance: net_balance(transactions),
        total_income: total_income(transactions),
        total_expenses: total_expenses(transactions),
        savings_rate: savings_rate(transactions),
        goals: goals.into_iter().map(goal_progress).collect(),
        budgets: budgets
            .into_iter()
            .map(|budget| budget_compliance(budget, transactions, today))
            .collect(),
        expense_breakdown: expense_breakdown(transactions),
    }
}

fn sum_kind(transactions: &[Transaction], kind: TransactionKind) -> Money {
    transactions
        .iter()
        .filter(|tx| tx.kind == kind)
        .map(|tx| tx.amount)
        .sum()
}
