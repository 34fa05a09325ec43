use chrono::Utc;
use uuid::Uuid;

use crate::{
    EngineError, EntityKey, LedgerService, NewTransaction, ResultEngine, SavingsGoal, Transaction,
    TransactionKind, ValidationError,
    remote::TransactionQuery,
    saga::Saga,
};

use super::{Ledger, contributions::settle_created};

impl<R: LedgerService> Ledger<R> {
    /// Records a new transaction.
    ///
    /// A provisional copy is shown under a local id until the service
    /// answers; on commit it is replaced by the recorded transaction. A
    /// goal-linked transaction moves the goal balance in the same mutation.
    pub async fn create_transaction(&self, payload: NewTransaction) -> ResultEngine<Transaction> {
        payload.validate()?;

        let provisional_id = Uuid::new_v4();
        let provisional = payload.provisional(provisional_id, Utc::now());
        let mut affected = vec![EntityKey::Transaction(provisional_id)];
        if let Some(goal_id) = payload.link.goal_id() {
            affected.push(EntityKey::Goal(goal_id));
        }

        let (saga, ()) = Saga::begin(&self.coordinator, "create_transaction", &affected, |cache| {
            if let Some(budget_id) = payload.link.budget_id()
                && cache.budget(budget_id).is_none()
            {
                return Err(EngineError::NotFound(format!("budget {budget_id}")));
            }
            if let Some(goal_id) = payload.link.goal_id() {
                let goal = cache
                    .goal(goal_id)
                    .ok_or_else(|| EngineError::NotFound(format!("goal {goal_id}")))?;
                match payload.kind {
                    TransactionKind::Expense if goal.is_cancelled() => {
                        return Err(ValidationError::GoalCancelled(goal.name.clone()).into());
                    }
                    TransactionKind::Income if payload.amount > goal.current_amount => {
                        return Err(ValidationError::InsufficientGoalBalance {
                            requested: payload.amount,
                            available: goal.current_amount,
                        }
                        .into());
                    }
                    _ => {}
                }
                let new_amount = (goal.current_amount + provisional.goal_delta()).max_zero();
                cache.patch_where::<SavingsGoal>(|g| g.id == goal_id, |g| g.set_amount(new_amount));
            }
            cache.upsert(provisional.clone());
            Ok(())
        })
        .await?;

        let remote = self.remote_handle();
        let created = saga
            .record(
                async move { remote.create_transaction(&payload).await },
                move |created| settle_created(created, Some(provisional_id)),
            )
            .await?;
        tracing::debug!(id = %created.transaction.id, "transaction recorded");
        Ok(created.transaction)
    }

    /// Reloads every collection from the service and replaces the cache.
    ///
    /// Refused while mutations are unsettled: their rollback snapshots would
    /// otherwise be restored over fresh data. The final check and the
    /// replacement happen under one cache lock.
    pub async fn refresh(&self) -> ResultEngine<()> {
        let in_flight = self.coordinator().in_flight();
        if in_flight > 0 {
            return Err(EngineError::Busy(in_flight));
        }

        let mut transactions = Vec::new();
        let mut query = TransactionQuery::default();
        loop {
            let page = self.remote().list_transactions(&query).await?;
            let fetched = page.data.len();
            transactions.extend(page.data);
            if fetched == 0 || !page.page.has_next() {
                break;
            }
            let next = query.page + 1;
            query = query.page(next);
        }
        let goals = self.remote().list_savings_goals().await?;
        let budgets = self.remote().list_budgets().await?;

        let (tx_count, goal_count, budget_count) = (transactions.len(), goals.len(), budgets.len());
        self.coordinator.replace_when_idle(transactions, budgets, goals)?;
        tracing::info!(
            transactions = tx_count,
            goals = goal_count,
            budgets = budget_count,
            "cache refreshed"
        );
        Ok(())
    }
}
