use chrono::Utc;
use engine::Ledger;
use ledger_client::{
    HttpLedger,
    config::{self, Command},
    error::Result,
    report,
};

#[tokio::main]
async fn main() -> Result<()> {
    let (settings, command) = config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledger_client={level},engine={level}",
            level = settings.level
        ))
        .init();

    let remote = HttpLedger::new(&settings.base_url, &settings.username, &settings.password)?;
    let ledger = Ledger::builder().remote(remote).build()?;
    tracing::info!(base_url = %settings.base_url, "loading ledger");
    ledger.refresh().await?;

    match command {
        Command::Summary { json } => {
            let stats = ledger.stats(Utc::now().date_naive());
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{}", report::summary(&stats));
            }
        }
        Command::Contribute { goal, amount } => {
            let outcome = ledger.contribute_from_balance(goal, amount).await?;
            println!("{}", report::contribution(&outcome));
        }
        Command::Withdraw { goal, amount } => {
            let outcome = ledger.withdraw(goal, amount).await?;
            println!("{}", report::contribution(&outcome));
        }
        Command::DeleteTransaction { id } => {
            let outcome = ledger.delete_transaction(id).await?;
            println!("{}", report::deletion(&outcome));
        }
        Command::DeleteGoal { id, mode } => {
            let outcome = ledger.delete_goal(id, mode.into()).await?;
            println!("{}", report::deletion(&outcome));
        }
        Command::DeleteBudget { id, mode } => {
            let outcome = ledger.delete_budget(id, mode.into()).await?;
            println!("{}", report::deletion(&outcome));
        }
    }

    Ok(())
}
