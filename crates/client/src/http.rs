use api_types::{
    Deleted, ErrorResponse,
    budget::{BudgetDeleted as WireBudgetDeleted, BudgetView},
    savings_goal::SavingsGoalView,
    transaction::{TransactionCreated, TransactionListResponse},
};
use engine::{
    Budget, GoalPatch, NewTransaction, RemoteError, SavingsGoal,
    remote::{
        BudgetDeleted, CreatedTransaction, LedgerService, RemoteResult, TransactionPage,
        TransactionQuery,
    },
};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::{
    convert,
    error::{AppError, Result},
};

/// [`LedgerService`] over the JSON HTTP API, authenticated with basic auth.
#[derive(Debug, Clone)]
pub struct HttpLedger {
    base_url: Url,
    http: reqwest::Client,
    username: String,
    password: String,
}

impl HttpLedger {
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self> {
        // A trailing slash keeps `join` from dropping the last path segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|err| AppError::BaseUrl(err.to_string()))?;
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> RemoteResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| RemoteError::Transport(format!("invalid endpoint {path}: {err}")))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        let res = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(transport)?;

        if res.status().is_success() {
            return res.json::<T>().await.map_err(transport);
        }
        Err(error_from_response(res).await)
    }
}

fn transport(err: reqwest::Error) -> RemoteError {
    RemoteError::Transport(err.to_string())
}

async fn error_from_response(res: Response) -> RemoteError {
    let status = res.status();
    let body = res
        .json::<ErrorResponse>()
        .await
        .map(|err| err.error)
        .unwrap_or_else(|_| "unknown error".to_string());
    tracing::debug!(%status, "service refused request: {body}");
    status_error(status, body)
}

pub(crate) fn status_error(status: StatusCode, body: String) -> RemoteError {
    match status.as_u16() {
        401 => RemoteError::Unauthorized,
        403 => RemoteError::Forbidden,
        404 => RemoteError::NotFound,
        409 => RemoteError::Conflict(body),
        422 => RemoteError::Validation(body),
        _ => RemoteError::Server(body),
    }
}

impl LedgerService for HttpLedger {
    async fn list_transactions(&self, query: &TransactionQuery) -> RemoteResult<TransactionPage> {
        let endpoint = self.endpoint("transactions")?;
        let response: TransactionListResponse = self
            .send(self.http.get(endpoint).query(&convert::query_to_wire(query)))
            .await?;
        convert::page_from_response(response)
    }

    async fn create_transaction(
        &self,
        payload: &NewTransaction,
    ) -> RemoteResult<CreatedTransaction> {
        let endpoint = self.endpoint("transactions")?;
        let created: TransactionCreated = self
            .send(self.http.post(endpoint).json(&convert::transaction_to_wire(payload)))
            .await?;
        convert::created_from_wire(created)
    }

    async fn delete_transaction(&self, id: Uuid) -> RemoteResult<bool> {
        let endpoint = self.endpoint(&format!("transactions/{id}"))?;
        let receipt: Deleted = self.send(self.http.delete(endpoint)).await?;
        Ok(receipt.deleted)
    }

    async fn list_savings_goals(&self) -> RemoteResult<Vec<SavingsGoal>> {
        let endpoint = self.endpoint("savings-goals")?;
        let goals: Vec<SavingsGoalView> = self.send(self.http.get(endpoint)).await?;
        Ok(goals.into_iter().map(convert::goal_from_wire).collect())
    }

    async fn update_savings_goal(&self, id: Uuid, patch: &GoalPatch) -> RemoteResult<SavingsGoal> {
        let endpoint = self.endpoint(&format!("savings-goals/{id}"))?;
        let goal: SavingsGoalView = self
            .send(self.http.patch(endpoint).json(&convert::goal_patch_to_wire(patch)))
            .await?;
        Ok(convert::goal_from_wire(goal))
    }

    async fn delete_savings_goal(&self, id: Uuid) -> RemoteResult<bool> {
        let endpoint = self.endpoint(&format!("savings-goals/{id}"))?;
        let receipt: Deleted = self.send(self.http.delete(endpoint)).await?;
        Ok(receipt.deleted)
    }

    async fn list_budgets(&self) -> RemoteResult<Vec<Budget>> {
        let endpoint = self.endpoint("budgets")?;
        let budgets: Vec<BudgetView> = self.send(self.http.get(endpoint)).await?;
        Ok(budgets.into_iter().map(convert::budget_from_wire).collect())
    }

    async fn delete_budget(&self, id: Uuid) -> RemoteResult<BudgetDeleted> {
        let endpoint = self.endpoint(&format!("budgets/{id}"))?;
        let receipt: WireBudgetDeleted = self.send(self.http.delete(endpoint)).await?;
        Ok(convert::budget_deleted_from_wire(receipt))
    }
}
