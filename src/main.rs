use clap::Parser;
use miette::{IntoDiagnostic, Result, miette};
use payflow::application::dispatcher::ActionDispatcher;
use payflow::application::ledger::TransactionLedger;
use payflow::application::reconciler::ReconciliationEngine;
use payflow::application::registry::GatewayRegistry;
use payflow::domain::action::{ActionRequest, DispatchOutcome};
use payflow::domain::gateway::{GatewayConfig, PaymentGateway};
use payflow::domain::transaction::{Actor, EventKind, TransactionEvent};
use payflow::gateways::mock::{MockBehavior, MockGateway};
use payflow::infrastructure::in_memory::InMemoryTransactionStore;
use payflow::interfaces::csv::action_reader::{ActionReader, ActionRow, OpKind};
use payflow::interfaces::csv::ledger_writer::LedgerWriter;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Replays a CSV of payment actions against mock gateways and prints the
/// resulting ledger state.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input actions CSV file
    input: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let file = File::open(&cli.input).into_diagnostic()?;
    let mut rows = Vec::new();
    for row in ActionReader::new(file).actions() {
        match row {
            Ok(row) => rows.push(row),
            Err(e) => eprintln!("Error reading action: {e}"),
        }
    }

    let registry = Arc::new(GatewayRegistry::new());
    registry.refresh(gateway_entries(&rows)).await;

    let ledger = Arc::new(TransactionLedger::new(Box::new(
        InMemoryTransactionStore::new(),
    )));
    let reconciler = Arc::new(ReconciliationEngine::new(Arc::clone(&ledger)));
    let dispatcher = ActionDispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&ledger),
        Arc::clone(&reconciler),
    );

    // File-local handle -> ledger id, in first-seen order for the output.
    let mut handles: Vec<String> = Vec::new();
    let mut transactions: HashMap<String, Uuid> = HashMap::new();

    for row in rows {
        if let Err(e) = replay_row(&ledger, &dispatcher, &mut handles, &mut transactions, row).await
        {
            eprintln!("Error processing action: {e}");
        }
    }

    let mut entries = Vec::new();
    for handle in handles {
        if let Some(id) = transactions.get(&handle) {
            let tx = ledger
                .current_state(*id)
                .await
                .map_err(|e| miette!("{e}"))?;
            entries.push((handle, tx));
        }
    }

    let stdout = io::stdout();
    let mut writer = LedgerWriter::new(stdout.lock());
    writer.write_summaries(&entries).map_err(|e| miette!("{e}"))?;

    Ok(())
}

/// One scripted mock gateway per gateway id referenced by an `open` row,
/// supporting the currencies those rows use.
fn gateway_entries(rows: &[ActionRow]) -> Vec<(GatewayConfig, Arc<dyn PaymentGateway>)> {
    let mut currencies: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        if row.op == OpKind::Open
            && let (Some(gateway), Some(currency)) = (&row.gateway, &row.currency)
        {
            let supported = currencies.entry(gateway.clone()).or_default();
            if !supported.contains(currency) {
                supported.push(currency.clone());
            }
        }
    }
    currencies
        .into_iter()
        .map(|(gateway_id, supported)| {
            let refs: Vec<&str> = supported.iter().map(String::as_str).collect();
            (
                GatewayConfig::new(&gateway_id, &gateway_id, &refs),
                Arc::new(MockGateway::new(&gateway_id, MockBehavior::Succeed))
                    as Arc<dyn PaymentGateway>,
            )
        })
        .collect()
}

async fn replay_row(
    ledger: &TransactionLedger,
    dispatcher: &ActionDispatcher,
    handles: &mut Vec<String>,
    transactions: &mut HashMap<String, Uuid>,
    row: ActionRow,
) -> payflow::error::Result<()> {
    use payflow::error::PaymentError;

    match row.op {
        OpKind::Open => {
            let gateway = row.gateway.as_deref().ok_or_else(|| {
                PaymentError::ValidationError("open requires a gateway".to_string())
            })?;
            let currency = row.currency.as_deref().ok_or_else(|| {
                PaymentError::ValidationError("open requires a currency".to_string())
            })?;
            let tx = ledger.open(gateway, currency).await?;
            if transactions.insert(row.transaction.clone(), tx.id).is_none() {
                handles.push(row.transaction);
            }
            Ok(())
        }
        OpKind::Authorize => {
            let id = lookup(transactions, &row.transaction)?;
            let amount = row.amount.ok_or_else(|| {
                PaymentError::ValidationError("authorize requires an amount".to_string())
            })?;
            // Recorded by the request side, not via a gateway dispatch.
            ledger
                .append(
                    id,
                    TransactionEvent::new(EventKind::Authorization, amount, Actor::Request),
                )
                .await?;
            Ok(())
        }
        OpKind::Charge | OpKind::Refund | OpKind::Cancel => {
            let id = lookup(transactions, &row.transaction)?;
            let currency = ledger.current_state(id).await?.currency;
            let request = match row.op {
                OpKind::Charge => ActionRequest::Charge {
                    transaction_id: id,
                    amount: row.amount,
                    currency,
                },
                OpKind::Refund => ActionRequest::Refund {
                    transaction_id: id,
                    amount: row.amount,
                    currency,
                    refund_data: None,
                    lines: None,
                },
                _ => ActionRequest::Cancel {
                    transaction_id: id,
                    amount: row.amount,
                    currency,
                },
            };
            match dispatcher.dispatch(Uuid::new_v4(), request).await? {
                DispatchOutcome::Applied(_) | DispatchOutcome::Pending(_) => Ok(()),
                DispatchOutcome::Rejected(reason) => {
                    eprintln!("Action rejected: {reason}");
                    Ok(())
                }
            }
        }
    }
}

fn lookup(
    transactions: &HashMap<String, Uuid>,
    handle: &str,
) -> payflow::error::Result<Uuid> {
    transactions.get(handle).copied().ok_or_else(|| {
        payflow::error::PaymentError::ValidationError(format!("unknown transaction handle {handle}"))
    })
}
