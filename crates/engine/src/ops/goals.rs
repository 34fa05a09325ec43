use uuid::Uuid;

use crate::{
    EngineError, EntityKey, GoalPatch, LedgerService, ResultEngine, SavingsGoal,
    coordinator::ServerResult, saga::Saga,
};

use super::Ledger;

impl<R: LedgerService> Ledger<R> {
    /// Edits name, target, description or cancellation of a goal.
    ///
    /// The current amount is never edited here; it only moves through
    /// linked transactions.
    pub async fn update_goal(&self, goal_id: Uuid, patch: GoalPatch) -> ResultEngine<SavingsGoal> {
        patch.validate()?;

        let (saga, ()) = Saga::begin(
            &self.coordinator,
            "update_goal",
            &[EntityKey::Goal(goal_id)],
            |cache| {
                if cache.goal(goal_id).is_none() {
                    return Err(EngineError::NotFound(format!("goal {goal_id}")));
                }
                cache.patch_where::<SavingsGoal>(|g| g.id == goal_id, |g| patch.apply(g));
                Ok(())
            },
        )
        .await?;

        let remote = self.remote_handle();
        saga.record(
            async move { remote.update_savings_goal(goal_id, &patch).await },
            |goal| ServerResult::none().upsert(goal.clone()),
        )
        .await
    }
}
