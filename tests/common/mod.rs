#![allow(dead_code)]

use payflow::application::dispatcher::ActionDispatcher;
use payflow::application::ledger::TransactionLedger;
use payflow::application::reconciler::ReconciliationEngine;
use payflow::application::registry::GatewayRegistry;
use payflow::domain::gateway::{GatewayConfig, PaymentGateway};
use payflow::domain::transaction::{Actor, EventKind, TransactionEvent};
use payflow::gateways::mock::{MockBehavior, MockGateway};
use payflow::infrastructure::in_memory::InMemoryTransactionStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

pub struct Harness {
    pub registry: Arc<GatewayRegistry>,
    pub ledger: Arc<TransactionLedger>,
    pub reconciler: Arc<ReconciliationEngine>,
    pub dispatcher: ActionDispatcher,
    pub gateway: Arc<MockGateway>,
}

/// Wires a full core with a single scripted mock gateway called "mockpay".
pub async fn harness(behavior: MockBehavior) -> Harness {
    let registry = Arc::new(GatewayRegistry::new());
    let gateway = Arc::new(MockGateway::new("mockpay", behavior));
    registry
        .refresh(vec![(
            GatewayConfig::new("mockpay", "Mock Pay", &["USD"]),
            Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
        )])
        .await;

    let ledger = Arc::new(TransactionLedger::new(Box::new(
        InMemoryTransactionStore::new(),
    )));
    let reconciler = Arc::new(ReconciliationEngine::new(Arc::clone(&ledger)));
    let dispatcher = ActionDispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&ledger),
        Arc::clone(&reconciler),
    );

    Harness {
        registry,
        ledger,
        reconciler,
        dispatcher,
        gateway,
    }
}

/// Opens a transaction on "mockpay" and seeds it with a confirmed
/// authorization for `amount` USD.
pub async fn authorized_transaction(harness: &Harness, amount: Decimal) -> Uuid {
    let tx = harness.ledger.open("mockpay", "USD").await.unwrap();
    harness
        .ledger
        .append(
            tx.id,
            TransactionEvent::new(EventKind::Authorization, amount, Actor::Request),
        )
        .await
        .unwrap();
    tx.id
}
