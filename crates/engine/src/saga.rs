//! Two-phase operations presented as one.
//!
//! A [`Saga`] owns the speculative patch of step 1 (applied through the
//! coordinator) and defines its compensation: rolling that patch back. The
//! remote call of step 2 is the operation of record; the saga commits only
//! when it succeeds.
//!
//! Once step 2 is sent, its outcome settles the mutation even if the caller
//! stops waiting: the call runs on its own task, which owns the guard. A
//! saga dropped before step 2 rolls back.

use std::{fmt::Display, future::Future, sync::Arc};

use crate::{
    Coordinator, EngineError, EntityCache, EntityKey, ResultEngine,
    coordinator::{MutationGuard, ServerResult},
};

pub(crate) struct Saga {
    name: &'static str,
    guard: MutationGuard,
}

impl Saga {
    /// Step 1: apply the speculative patch over `affected`.
    pub(crate) async fn begin<T, F>(
        coordinator: &Arc<Coordinator>,
        name: &'static str,
        affected: &[EntityKey],
        patch: F,
    ) -> ResultEngine<(Saga, T)>
    where
        F: FnOnce(&mut EntityCache) -> ResultEngine<T>,
    {
        let (token, value) = coordinator.begin(name, affected, patch).await?;
        Ok((
            Self {
                name,
                guard: coordinator.guard(token),
            },
            value,
        ))
    }

    /// Ends a saga whose patch wrote nothing, without a remote call.
    pub(crate) fn release(self) {
        self.guard.commit(ServerResult::none());
    }

    /// Step 2: run the operation of record, then commit with whatever
    /// `settle` derives from its output, or compensate on failure.
    pub(crate) async fn record<O, E, Fut, S>(self, operation: Fut, settle: S) -> ResultEngine<O>
    where
        O: Send + 'static,
        E: Into<EngineError> + Display + Send + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
        S: FnOnce(&O) -> ServerResult + Send + 'static,
    {
        let Saga { name, guard } = self;
        let settlement = tokio::spawn(async move {
            match operation.await {
                Ok(output) => {
                    guard.commit(settle(&output));
                    Ok(output)
                }
                Err(err) => {
                    tracing::warn!(saga = name, "operation of record failed: {err}");
                    guard.rollback();
                    Err(err.into())
                }
            }
        });

        match settlement.await {
            Ok(result) => result,
            // The guard was dropped with the panicking task, so the patch is
            // already rolled back.
            Err(join) => std::panic::resume_unwind(join.into_panic()),
        }
    }
}
