use std::sync::{Arc, Mutex};

use api_types::{
    Deleted, ErrorResponse,
    budget::BudgetView,
    page::PageMeta,
    savings_goal::{GoalStatus, SavingsGoalUpdate, SavingsGoalView},
    transaction::{
        TransactionCreated, TransactionFilter, TransactionListResponse, TransactionNew,
        TransactionType, TransactionView,
    },
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get},
};
use chrono::{NaiveDate, Utc};
use engine::{
    DeleteMode, EngineError, Ledger, Money, RemoteError, TransactionKind,
    remote::{LedgerService, TransactionQuery},
};
use ledger_client::HttpLedger;
use uuid::Uuid;

/// `alice:secret`
const CREDENTIALS: &str = "Basic YWxpY2U6c2VjcmV0";

type Refusal = (StatusCode, Json<ErrorResponse>);

#[derive(Default)]
struct Data {
    transactions: Vec<TransactionView>,
    goals: Vec<SavingsGoalView>,
    budgets: Vec<BudgetView>,
    last_query: Option<TransactionFilter>,
}

#[derive(Clone, Default)]
struct Server {
    data: Arc<Mutex<Data>>,
}

fn refuse(status: StatusCode, message: &str) -> Refusal {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn authorize(headers: &HeaderMap) -> Result<(), Refusal> {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == CREDENTIALS => Ok(()),
        _ => Err(refuse(StatusCode::UNAUTHORIZED, "bad credentials")),
    }
}

async fn list_transactions(
    State(server): State<Server>,
    headers: HeaderMap,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<TransactionListResponse>, Refusal> {
    authorize(&headers)?;
    let mut data = server.data.lock().unwrap();
    let rows: Vec<TransactionView> = data
        .transactions
        .iter()
        .filter(|tx| filter.kind.is_none_or(|kind| tx.kind == kind))
        .cloned()
        .collect();
    data.last_query = Some(filter.clone());
    let total = rows.len() as u64;
    Ok(Json(TransactionListResponse {
        data: rows,
        meta: PageMeta {
            page: filter.page.unwrap_or(1),
            per_page: filter.per_page.unwrap_or(100),
            total,
            total_pages: 1,
        },
    }))
}

async fn create_transaction(
    State(server): State<Server>,
    headers: HeaderMap,
    Json(payload): Json<TransactionNew>,
) -> Result<Json<TransactionCreated>, Refusal> {
    authorize(&headers)?;
    let mut data = server.data.lock().unwrap();
    if let Some(goal_id) = payload.saving_goal_id {
        let goal = data
            .goals
            .iter_mut()
            .find(|g| g.id == goal_id)
            .ok_or_else(|| refuse(StatusCode::NOT_FOUND, "goal not found"))?;
        match payload.kind {
            TransactionType::Expense => goal.current_amount_minor += payload.amount_minor,
            TransactionType::Income => goal.current_amount_minor -= payload.amount_minor,
        }
    }
    let view = TransactionView {
        id: Uuid::new_v4(),
        date: payload.date,
        amount_minor: payload.amount_minor,
        kind: payload.kind,
        name: payload.name,
        category: payload.category,
        description: payload.description,
        budget_id: payload.budget_id,
        saving_goal_id: payload.saving_goal_id,
        created_at: Utc::now(),
    };
    data.transactions.push(view.clone());
    Ok(Json(TransactionCreated {
        transaction: view,
        saving_goal_deleted: false,
    }))
}

async fn delete_transaction(
    State(server): State<Server>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Deleted>, Refusal> {
    authorize(&headers)?;
    let mut data = server.data.lock().unwrap();
    let before = data.transactions.len();
    data.transactions.retain(|tx| tx.id != id);
    Ok(Json(Deleted {
        deleted: data.transactions.len() != before,
    }))
}

async fn list_goals(
    State(server): State<Server>,
    headers: HeaderMap,
) -> Result<Json<Vec<SavingsGoalView>>, Refusal> {
    authorize(&headers)?;
    Ok(Json(server.data.lock().unwrap().goals.clone()))
}

async fn update_goal(
    State(server): State<Server>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(update): Json<SavingsGoalUpdate>,
) -> Result<Json<SavingsGoalView>, Refusal> {
    authorize(&headers)?;
    let mut data = server.data.lock().unwrap();
    let goal = data
        .goals
        .iter_mut()
        .find(|g| g.id == id)
        .ok_or_else(|| refuse(StatusCode::NOT_FOUND, "goal not found"))?;
    if let Some(name) = update.name {
        goal.name = name;
    }
    if let Some(status) = update.status {
        goal.status = status;
    }
    Ok(Json(goal.clone()))
}

async fn delete_goal(
    State(server): State<Server>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Deleted>, Refusal> {
    authorize(&headers)?;
    let mut data = server.data.lock().unwrap();
    data.goals.retain(|g| g.id != id);
    Ok(Json(Deleted { deleted: true }))
}

async fn list_budgets(
    State(server): State<Server>,
    headers: HeaderMap,
) -> Result<Json<Vec<BudgetView>>, Refusal> {
    authorize(&headers)?;
    Ok(Json(server.data.lock().unwrap().budgets.clone()))
}

async fn delete_budget(headers: HeaderMap, Path(_id): Path<Uuid>) -> Refusal {
    if let Err(refusal) = authorize(&headers) {
        return refusal;
    }
    refuse(StatusCode::CONFLICT, "budget is locked")
}

fn router(server: Server) -> Router {
    Router::new()
        .route(
            "/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route("/transactions/{id}", delete(delete_transaction))
        .route("/savings-goals", get(list_goals))
        .route(
            "/savings-goals/{id}",
            delete(delete_goal).patch(update_goal),
        )
        .route("/budgets", get(list_budgets))
        .route("/budgets/{id}", delete(delete_budget))
        .with_state(server)
}

async fn spawn(server: Server) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(server)).await.unwrap();
    });
    format!("http://{addr}")
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

fn seeded() -> (Server, Uuid, Uuid) {
    let goal_id = Uuid::new_v4();
    let budget_id = Uuid::new_v4();
    let server = Server::default();
    {
        let mut data = server.data.lock().unwrap();
        data.goals.push(SavingsGoalView {
            id: goal_id,
            name: "Bike".to_string(),
            target_amount_minor: 10_000,
            current_amount_minor: 1_000,
            description: String::new(),
            status: GoalStatus::Active,
        });
        data.budgets.push(BudgetView {
            id: budget_id,
            name: "Groceries".to_string(),
            amount_minor: 20_000,
            category: Some("food".to_string()),
            start_date: day(1),
            end_date: day(30),
        });
        data.transactions.push(TransactionView {
            id: Uuid::new_v4(),
            date: day(1),
            amount_minor: 5_000,
            kind: TransactionType::Income,
            name: "Salary".to_string(),
            category: None,
            description: String::new(),
            budget_id: None,
            saving_goal_id: None,
            created_at: Utc::now(),
        });
    }
    (server, goal_id, budget_id)
}

async fn ledger_for(server: &Server, password: &str) -> Ledger<HttpLedger> {
    let base_url = spawn(server.clone()).await;
    let remote = HttpLedger::new(&base_url, "alice", password).unwrap();
    Ledger::<HttpLedger>::builder().remote(remote).build().unwrap()
}

#[tokio::test]
async fn refresh_and_contribute_over_http() {
    let (server, goal_id, _) = seeded();
    let ledger = ledger_for(&server, "secret").await;

    ledger.refresh().await.unwrap();
    let snapshot = ledger.snapshot();
    assert_eq!(snapshot.transactions.len(), 1);
    assert_eq!(snapshot.goals.len(), 1);
    assert_eq!(snapshot.budgets.len(), 1);
    assert_eq!(ledger.available_balance(), Money::new(5_000));

    let outcome = ledger
        .contribute_from_balance(goal_id, Money::new(2_000))
        .await
        .unwrap();

    assert_eq!(outcome.goal.unwrap().current_amount, Money::new(3_000));
    assert_eq!(ledger.available_balance(), Money::new(3_000));
    let data = server.data.lock().unwrap();
    assert_eq!(data.transactions.len(), 2);
    assert_eq!(data.goals[0].current_amount_minor, 3_000);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let (server, _, _) = seeded();
    let ledger = ledger_for(&server, "guess").await;

    let err = ledger.refresh().await.unwrap_err();

    assert_eq!(err, EngineError::Remote(RemoteError::Unauthorized));
    assert!(ledger.snapshot().transactions.is_empty());
}

#[tokio::test]
async fn refused_budget_deletion_is_rolled_back() {
    let (server, _, budget_id) = seeded();
    let ledger = ledger_for(&server, "secret").await;
    ledger.refresh().await.unwrap();

    let err = ledger
        .delete_budget(budget_id, DeleteMode::Detach)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        EngineError::Remote(RemoteError::Conflict("budget is locked".to_string()))
    );
    assert!(ledger.cache().lock().budget(budget_id).is_some());
}

#[tokio::test]
async fn unknown_goal_edit_is_not_found() {
    let (server, _, _) = seeded();
    let base_url = spawn(server).await;
    let remote = HttpLedger::new(&base_url, "alice", "secret").unwrap();

    let err = remote
        .update_savings_goal(Uuid::new_v4(), &engine::GoalPatch::default().name("Car"))
        .await
        .unwrap_err();

    assert_eq!(err, RemoteError::NotFound);
}

#[tokio::test]
async fn query_is_sent_as_parameters() {
    let (server, _, _) = seeded();
    let base_url = spawn(server.clone()).await;
    let remote = HttpLedger::new(&base_url, "alice", "secret").unwrap();

    let query = TransactionQuery {
        kind: Some(TransactionKind::Expense),
        ..TransactionQuery::default()
    };
    let page = remote.list_transactions(&query).await.unwrap();

    assert!(page.data.is_empty());
    let last = server.data.lock().unwrap().last_query.clone().unwrap();
    assert_eq!(last.kind, Some(TransactionType::Expense));
    assert_eq!(last.page, Some(1));
    assert_eq!(last.per_page, Some(100));
}
