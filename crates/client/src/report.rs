use std::fmt::Write as _;

use engine::{ContributionOutcome, DeletionOutcome, aggregation::DashboardStats};

/// Plain-text dashboard.
pub fn summary(stats: &DashboardStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Net balance:   {}", stats.net_balance);
    let _ = writeln!(out, "Income:        {}", stats.total_income);
    let _ = writeln!(out, "Expenses:      {}", stats.total_expenses);
    let _ = writeln!(out, "Savings rate:  {:.1}%", stats.savings_rate * 100.0);

    if !stats.goals.is_empty() {
        let _ = writeln!(out, "\nGoals");
        for goal in &stats.goals {
            let _ = writeln!(
                out,
                "  {}  {:>5.1}%  {} to go",
                goal.goal_id, goal.percent, goal.remaining
            );
        }
    }

    if !stats.budgets.is_empty() {
        let _ = writeln!(out, "\nBudgets");
        for budget in &stats.budgets {
            let _ = writeln!(
                out,
                "  {:<20} {} / {}  [{}]",
                budget.name,
                budget.spent,
                budget.allocated,
                budget.status.as_str()
            );
        }
    }

    if !stats.expense_breakdown.is_empty() {
        let _ = writeln!(out, "\nExpenses by category");
        for row in &stats.expense_breakdown {
            let _ = writeln!(out, "  {:<20} {}", row.category, row.total);
        }
    }
    out
}

pub fn contribution(outcome: &ContributionOutcome) -> String {
    match &outcome.goal {
        Some(goal) => format!(
            "{} {} recorded; {} now at {} of {} ({})",
            outcome.transaction.name,
            outcome.transaction.amount,
            goal.name,
            goal.current_amount,
            goal.target_amount,
            goal.status.as_str()
        ),
        None => format!(
            "{} {} recorded; the goal was closed by the service",
            outcome.transaction.name, outcome.transaction.amount
        ),
    }
}

pub fn deletion(outcome: &DeletionOutcome) -> String {
    let mut out = format!(
        "removed {} transaction(s), detached {}",
        outcome.removed_transactions.len(),
        outcome.detached.len()
    );
    if !outcome.refunded.is_zero() {
        let _ = write!(out, ", balance changed by {}", outcome.refunded);
    }
    out
}
