use uuid::Uuid;

use crate::{
    EngineError, EntityCache, EntityKey, LedgerService, Money, RemoteError, ResultEngine,
    SavingsGoal, Transaction, TransactionLink, ValidationError,
    coordinator::ServerResult,
    remote::{RemoteResult, ensure_deleted},
    saga::Saga,
};

use super::Ledger;

/// How linked transactions are resolved when their goal or budget goes away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteMode {
    /// Keep the transactions in history with their link cleared.
    Detach,
    /// Delete the transactions too; their effect on the net balance goes
    /// away with them.
    CascadeRefund,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeletionOutcome {
    /// Change of the net balance caused by the removed transactions.
    pub refunded: Money,
    /// Transactions that survived with their link cleared.
    pub detached: Vec<Uuid>,
    /// Transactions removed from the ledger.
    pub removed_transactions: Vec<Uuid>,
    /// Linked-transaction count reported by the service on budget deletion.
    pub server_transaction_count: Option<u64>,
}

struct Plan {
    linked: Vec<Uuid>,
    refunded: Money,
}

impl<R: LedgerService> Ledger<R> {
    /// Deletes one transaction, reverting its effect on a linked goal.
    ///
    /// A removed contribution is subtracted from the goal, a removed
    /// withdrawal added back. A reversal that would take the goal below zero
    /// is refused. Goal and transaction are restored together if the service
    /// refuses.
    pub async fn delete_transaction(&self, transaction_id: Uuid) -> ResultEngine<DeletionOutcome> {
        let key = EntityKey::Transaction(transaction_id);
        let (saga, removed) = loop {
            let link = self
                .cache()
                .lock()
                .transaction(transaction_id)
                .map(|tx| tx.link)
                .ok_or_else(|| EngineError::NotFound(format!("transaction {transaction_id}")))?;

            let mut affected = vec![key];
            if let Some(goal_id) = link.goal_id() {
                affected.push(EntityKey::Goal(goal_id));
            }

            let (saga, removed) = Saga::begin(
                &self.coordinator,
                "delete_transaction",
                &affected,
                |cache| {
                    let tx = cache.transaction(transaction_id).cloned().ok_or_else(|| {
                        EngineError::NotFound(format!("transaction {transaction_id}"))
                    })?;
                    // The queues held are those of the link seen before waiting.
                    if tx.link != link {
                        return Ok(None);
                    }
                    if let Some(goal_id) = tx.link.goal_id()
                        && let Some(goal) = cache.goal(goal_id)
                    {
                        let delta = tx.goal_delta();
                        let reverted = goal.current_amount - delta;
                        if reverted < Money::ZERO {
                            return Err(ValidationError::InsufficientGoalBalance {
                                requested: delta,
                                available: goal.current_amount,
                            }
                            .into());
                        }
                        cache.patch_where::<SavingsGoal>(
                            |g| g.id == goal_id,
                            |g| g.set_amount(reverted),
                        );
                    }
                    cache.remove_by_id(key);
                    Ok(Some(tx))
                },
            )
            .await?;

            match removed {
                Some(tx) => break (saga, tx),
                None => {
                    tracing::debug!(%transaction_id, "link changed while queued, retrying");
                    saga.release();
                }
            }
        };

        let remote = self.remote_handle();
        saga.record(
            async move {
                let deleted = remote.delete_transaction(transaction_id).await?;
                ensure_deleted(deleted, || format!("transaction {transaction_id}"))
            },
            |_| ServerResult::none(),
        )
        .await?;

        Ok(DeletionOutcome {
            refunded: -removed.signed_amount(),
            removed_transactions: vec![transaction_id],
            ..Default::default()
        })
    }

    pub async fn delete_goal(&self, goal_id: Uuid, mode: DeleteMode) -> ResultEngine<DeletionOutcome> {
        self.delete_owner(EntityKey::Goal(goal_id), mode).await
    }

    pub async fn delete_budget(
        &self,
        budget_id: Uuid,
        mode: DeleteMode,
    ) -> ResultEngine<DeletionOutcome> {
        self.delete_owner(EntityKey::Budget(budget_id), mode).await
    }

    /// Deletes a goal or budget together with its linked transactions
    /// (cascade) or after unlinking them (detach). All-or-nothing: any remote
    /// failure reinstates the entity and every transaction.
    async fn delete_owner(&self, owner: EntityKey, mode: DeleteMode) -> ResultEngine<DeletionOutcome> {
        let (saga, plan) = loop {
            let locked = linked_ids(&self.cache().lock(), owner)?;
            let mut affected = vec![owner];
            affected.extend(locked.iter().copied().map(EntityKey::Transaction));

            let (saga, plan) =
                Saga::begin(&self.coordinator, "delete_owner", &affected, |cache| {
                    let linked = linked_ids(cache, owner)?;
                    if linked != locked {
                        return Ok(None);
                    }

                    let refunded = match mode {
                        DeleteMode::Detach => {
                            cache.patch_where::<Transaction>(
                                |tx| links_to(tx, owner),
                                |tx| tx.link = TransactionLink::Unlinked,
                            );
                            Money::ZERO
                        }
                        DeleteMode::CascadeRefund => {
                            let mut refunded = Money::ZERO;
                            for id in &linked {
                                if let Some(tx) = cache.transaction(*id) {
                                    refunded -= tx.signed_amount();
                                }
                                cache.remove_by_id(EntityKey::Transaction(*id));
                            }
                            refunded
                        }
                    };
                    cache.remove_by_id(owner);

                    Ok(Some(Plan { linked, refunded }))
                })
                .await?;

            match plan {
                Some(plan) => break (saga, plan),
                None => {
                    tracing::debug!(owner = %describe(owner), "linked set changed while queued, retrying");
                    saga.release();
                }
            }
        };

        let remote = self.remote_handle();
        match mode {
            DeleteMode::Detach => {
                let count = saga
                    .record(
                        async move { delete_owner_remote(remote.as_ref(), owner).await },
                        |_| ServerResult::none(),
                    )
                    .await?;
                tracing::info!(owner = %describe(owner), detached = plan.linked.len(), "deleted");
                Ok(DeletionOutcome {
                    detached: plan.linked,
                    server_transaction_count: count,
                    ..Default::default()
                })
            }
            DeleteMode::CascadeRefund => {
                let linked = plan.linked;
                let (deleted, count) = saga
                    .record(
                        async move {
                            let mut deleted = Vec::with_capacity(linked.len());
                            for id in linked {
                                let result = remote
                                    .delete_transaction(id)
                                    .await
                                    .and_then(|flag| {
                                        ensure_deleted(flag, || format!("transaction {id}"))
                                    });
                                if let Err(source) = result {
                                    return Err(cascade_failure(deleted, id, source));
                                }
                                deleted.push(id);
                            }
                            match delete_owner_remote(remote.as_ref(), owner).await {
                                Ok(count) => Ok((deleted, count)),
                                Err(source) => Err(cascade_failure(deleted, owner.id(), source)),
                            }
                        },
                        |_| ServerResult::none(),
                    )
                    .await?;
                tracing::info!(
                    owner = %describe(owner),
                    removed = deleted.len(),
                    refunded = %plan.refunded,
                    "cascade deleted"
                );
                Ok(DeletionOutcome {
                    refunded: plan.refunded,
                    removed_transactions: deleted,
                    server_transaction_count: count,
                    ..Default::default()
                })
            }
        }
    }
}

async fn delete_owner_remote<R: LedgerService>(
    remote: &R,
    owner: EntityKey,
) -> RemoteResult<Option<u64>> {
    match owner {
        EntityKey::Goal(id) => {
            let deleted = remote.delete_savings_goal(id).await?;
            ensure_deleted(deleted, || describe(owner))?;
            Ok(None)
        }
        EntityKey::Budget(id) => {
            let receipt = remote.delete_budget(id).await?;
            ensure_deleted(receipt.deleted, || describe(owner))?;
            Ok(Some(receipt.transaction_count))
        }
        EntityKey::Transaction(id) => {
            let deleted = remote.delete_transaction(id).await?;
            ensure_deleted(deleted, || describe(owner))?;
            Ok(None)
        }
    }
}

/// Ids of the transactions linked to `owner`, sorted.
fn linked_ids(cache: &EntityCache, owner: EntityKey) -> ResultEngine<Vec<Uuid>> {
    if cache.get(owner).is_none() {
        return Err(EngineError::NotFound(describe(owner)));
    }
    let mut ids: Vec<Uuid> = cache
        .find::<Transaction>(|tx| links_to(tx, owner))
        .into_iter()
        .map(|tx| tx.id)
        .collect();
    ids.sort();
    Ok(ids)
}

fn links_to(tx: &Transaction, owner: EntityKey) -> bool {
    match owner {
        EntityKey::Goal(id) => tx.is_linked_to_goal(id),
        EntityKey::Budget(id) => tx.is_linked_to_budget(id),
        EntityKey::Transaction(_) => false,
    }
}

fn describe(key: EntityKey) -> String {
    match key {
        EntityKey::Transaction(id) => format!("transaction {id}"),
        EntityKey::Budget(id) => format!("budget {id}"),
        EntityKey::Goal(id) => format!("goal {id}"),
    }
}

/// Nothing reached the service yet: a plain remote error. Otherwise the
/// caller must know which deletions went through.
fn cascade_failure(deleted: Vec<Uuid>, failed: Uuid, source: RemoteError) -> EngineError {
    if deleted.is_empty() {
        EngineError::Remote(source)
    } else {
        EngineError::PartialCascadeFailure {
            deleted,
            failed,
            source,
        }
    }
}
