use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    EngineError, EntityKey, LedgerService, Money, NewTransaction, ResultEngine, SavingsGoal,
    Transaction, ValidationError, coordinator::ServerResult, remote::CreatedTransaction,
    saga::Saga,
};

use super::Ledger;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Move money from the general balance into the goal.
    Contribute,
    /// Move money from the goal back to the general balance.
    Withdraw,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContributionOutcome {
    /// The linked transaction as recorded by the service.
    pub transaction: Transaction,
    /// The goal after settlement; `None` when the service deleted it.
    pub goal: Option<SavingsGoal>,
    /// Any open detail view of the goal should be closed.
    pub close_goal_detail: bool,
}

impl<R: LedgerService> Ledger<R> {
    /// Deposits into or withdraws from a savings goal.
    ///
    /// The goal balance is patched speculatively, then the linked transaction
    /// is created; that creation is the operation of record. If it fails the
    /// balance patch is rolled back and no transaction exists.
    ///
    /// Validation (amount, available balance, goal balance) happens before
    /// anything is written or sent.
    pub async fn apply_to_goal(
        &self,
        goal_id: Uuid,
        direction: Direction,
        amount: Money,
        available_balance: Money,
    ) -> ResultEngine<ContributionOutcome> {
        if !amount.is_positive() {
            return Err(ValidationError::NonPositiveAmount.into());
        }
        if direction == Direction::Contribute && amount > available_balance {
            return Err(ValidationError::InsufficientFunds {
                requested: amount,
                available: available_balance,
            }
            .into());
        }

        let today = Utc::now().date_naive();
        let (saga, payload) = Saga::begin(
            &self.coordinator,
            "goal_transfer",
            &[EntityKey::Goal(goal_id)],
            |cache| {
                let goal = cache
                    .goal(goal_id)
                    .ok_or_else(|| EngineError::NotFound(format!("goal {goal_id}")))?;
                let new_amount = match direction {
                    Direction::Contribute => {
                        if goal.is_cancelled() {
                            return Err(ValidationError::GoalCancelled(goal.name.clone()).into());
                        }
                        goal.current_amount + amount
                    }
                    Direction::Withdraw => {
                        if amount > goal.current_amount {
                            return Err(ValidationError::InsufficientGoalBalance {
                                requested: amount,
                                available: goal.current_amount,
                            }
                            .into());
                        }
                        (goal.current_amount - amount).max_zero()
                    }
                };
                let payload = linked_transaction(goal, direction, amount, today);

                cache.patch_where::<SavingsGoal>(|g| g.id == goal_id, |g| g.set_amount(new_amount));
                Ok(payload)
            },
        )
        .await?;

        let remote = self.remote_handle();
        let created = saga
            .record(
                async move { remote.create_transaction(&payload).await },
                |created| settle_created(created, None),
            )
            .await?;

        if created.goal_deleted {
            tracing::info!(%goal_id, "goal removed by the service after withdrawal");
        }
        let goal = self.cache().lock().goal(goal_id).cloned();
        Ok(ContributionOutcome {
            transaction: created.transaction,
            close_goal_detail: goal.is_none(),
            goal,
        })
    }

    pub async fn contribute(
        &self,
        goal_id: Uuid,
        amount: Money,
        available_balance: Money,
    ) -> ResultEngine<ContributionOutcome> {
        self.apply_to_goal(goal_id, Direction::Contribute, amount, available_balance)
            .await
    }

    /// Contributes using the cached net balance as the available balance.
    pub async fn contribute_from_balance(
        &self,
        goal_id: Uuid,
        amount: Money,
    ) -> ResultEngine<ContributionOutcome> {
        let available = self.available_balance();
        self.contribute(goal_id, amount, available).await
    }

    pub async fn withdraw(&self, goal_id: Uuid, amount: Money) -> ResultEngine<ContributionOutcome> {
        // The general balance is not a constraint for withdrawals.
        self.apply_to_goal(goal_id, Direction::Withdraw, amount, Money::ZERO)
            .await
    }
}

fn linked_transaction(
    goal: &SavingsGoal,
    direction: Direction,
    amount: Money,
    date: NaiveDate,
) -> NewTransaction {
    let payload = match direction {
        Direction::Contribute => {
            NewTransaction::expense(amount, date, format!("Contribution to {}", goal.name))
        }
        Direction::Withdraw => {
            NewTransaction::income(amount, date, format!("Withdrawal from {}", goal.name))
        }
    };
    payload.category("savings").goal(goal.id)
}

/// Authoritative values after a transaction creation: the recorded
/// transaction replaces the provisional one (if any), and a goal the service
/// deleted disappears from every view.
pub(super) fn settle_created(
    created: &CreatedTransaction,
    provisional: Option<Uuid>,
) -> ServerResult {
    let mut result = ServerResult::none();
    if let Some(id) = provisional
        && id != created.transaction.id
    {
        result = result.remove(EntityKey::Transaction(id));
    }
    result = result.upsert(created.transaction.clone());
    if created.goal_deleted
        && let Some(goal_id) = created.transaction.link.goal_id()
    {
        result = result.remove(EntityKey::Goal(goal_id));
    }
    result
}
