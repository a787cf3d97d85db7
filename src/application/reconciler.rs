use crate::application::ledger::{TransactionLedger, TransactionLocks};
use crate::domain::gateway::ActionResult;
use crate::domain::transaction::{Actor, EventKind, Transaction, TransactionEvent};
use crate::error::Result;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// An action id registered as awaiting a gateway confirmation.
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub transaction_id: Uuid,
    pub kind: EventKind,
}

/// Merges gateway results into the ledger at most once per action id.
///
/// Called by the dispatcher on the synchronous path and by the external
/// webhook layer on the asynchronous one. Unknown or already-retired action
/// ids are replays: logged and discarded without touching any transaction.
pub struct ReconciliationEngine {
    ledger: Arc<TransactionLedger>,
    locks: Arc<TransactionLocks>,
    pending: RwLock<HashMap<Uuid, PendingAction>>,
    retired: RwLock<HashSet<Uuid>>,
}

impl ReconciliationEngine {
    pub fn new(ledger: Arc<TransactionLedger>) -> Self {
        Self {
            ledger,
            locks: Arc::new(TransactionLocks::default()),
            pending: RwLock::new(HashMap::new()),
            retired: RwLock::new(HashSet::new()),
        }
    }

    pub(crate) fn locks(&self) -> Arc<TransactionLocks> {
        Arc::clone(&self.locks)
    }

    /// Registers an action id as awaiting confirmation. Re-registering the
    /// same id (an idempotent retry) is a no-op overwrite.
    pub async fn register(&self, action_id: Uuid, pending: PendingAction) {
        self.pending.write().await.insert(action_id, pending);
    }

    pub async fn is_retired(&self, action_id: Uuid) -> bool {
        self.retired.read().await.contains(&action_id)
    }

    /// True while any action against this transaction awaits confirmation.
    /// Operators poll this to surface stuck transactions; the core itself
    /// never times a pending action out.
    pub async fn is_awaiting_confirmation(&self, transaction_id: Uuid) -> bool {
        self.pending
            .read()
            .await
            .values()
            .any(|pending| pending.transaction_id == transaction_id)
    }

    /// Asynchronous ingress: correlates the result back through the action
    /// id, acquires the transaction's exclusion scope and merges the result.
    /// Returns `None` for absorbed duplicates.
    pub async fn reconcile(
        &self,
        action_id: Uuid,
        result: impl Into<ActionResult> + Send,
    ) -> Result<Option<Transaction>> {
        let transaction_id = {
            self.pending
                .read()
                .await
                .get(&action_id)
                .map(|pending| pending.transaction_id)
        };
        let Some(transaction_id) = transaction_id else {
            tracing::warn!(%action_id, "discarding duplicate or unknown confirmation");
            return Ok(None);
        };
        let _guard = self.locks.acquire(transaction_id).await;
        self.reconcile_locked(action_id, result.into()).await
    }

    /// Merge path for callers already inside the transaction's exclusion
    /// scope (the dispatcher's synchronous path).
    pub(crate) async fn reconcile_locked(
        &self,
        action_id: Uuid,
        result: ActionResult,
    ) -> Result<Option<Transaction>> {
        let pending = self.pending.write().await.remove(&action_id);
        let Some(pending) = pending else {
            tracing::warn!(%action_id, "discarding duplicate or unknown confirmation");
            return Ok(None);
        };
        // Retired before the append: even a failed append consumes the id.
        self.retired.write().await.insert(action_id);

        let tx = self.ledger.current_state(pending.transaction_id).await?;
        let event = match result {
            ActionResult::Success {
                kind,
                amount,
                psp_reference,
                message,
                already_processed,
            } => {
                if kind != pending.kind {
                    tracing::warn!(
                        %action_id,
                        registered = ?pending.kind,
                        confirmed = ?kind,
                        "confirmation kind differs from the dispatched action"
                    );
                }
                // The gateway settled this action on an earlier attempt; if
                // the settled event is already in the history, this
                // confirmation carries nothing new.
                if already_processed
                    && tx.events.iter().any(|event| {
                        event.kind == kind
                            && event.amount == amount
                            && event.psp_reference == psp_reference
                    })
                {
                    tracing::debug!(
                        %action_id,
                        transaction = %tx.id,
                        "confirmation for an already settled action, absorbed"
                    );
                    return Ok(Some(tx));
                }
                let message = annotate_reference_conflict(&tx, &psp_reference, message);
                TransactionEvent::new(kind, amount, Actor::Gateway)
                    .with_reference(psp_reference)
                    .with_message(message)
            }
            ActionResult::Failure { message } => {
                TransactionEvent::new(EventKind::Failure, Decimal::ZERO, Actor::Gateway)
                    .with_message(Some(message))
            }
        };
        self.ledger.append(pending.transaction_id, event).await.map(Some)
    }
}

/// Gateways may legitimately rotate references across retries, so a
/// conflicting reference is annotated on the event and logged, never
/// overwritten onto the transaction.
fn annotate_reference_conflict(
    tx: &Transaction,
    psp_reference: &Option<String>,
    message: Option<String>,
) -> Option<String> {
    match (psp_reference, &tx.psp_reference) {
        (Some(incoming), Some(existing)) if incoming != existing => {
            tracing::warn!(
                transaction = %tx.id,
                %incoming,
                %existing,
                "psp reference conflict"
            );
            let note =
                format!("psp reference conflict: gateway sent {incoming}, keeping {existing}");
            Some(match message {
                Some(message) => format!("{message}; {note}"),
                None => note,
            })
        }
        _ => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryTransactionStore;
    use rust_decimal_macros::dec;

    async fn engine_with_tx() -> (ReconciliationEngine, Uuid) {
        let ledger = Arc::new(TransactionLedger::new(Box::new(
            InMemoryTransactionStore::new(),
        )));
        let tx = ledger.open("mockpay", "USD").await.unwrap();
        ledger
            .append(
                tx.id,
                TransactionEvent::new(EventKind::Authorization, dec!(100.00), Actor::Gateway),
            )
            .await
            .unwrap();
        (ReconciliationEngine::new(ledger), tx.id)
    }

    fn success(amount: Decimal, psp: &str) -> ActionResult {
        ActionResult::Success {
            kind: EventKind::Charge,
            amount,
            psp_reference: Some(psp.to_string()),
            message: None,
            already_processed: false,
        }
    }

    async fn register(engine: &ReconciliationEngine, tx_id: Uuid, kind: EventKind) -> Uuid {
        let action_id = Uuid::new_v4();
        engine
            .register(
                action_id,
                PendingAction {
                    transaction_id: tx_id,
                    kind,
                },
            )
            .await;
        action_id
    }

    #[tokio::test]
    async fn test_duplicate_confirmation_is_absorbed() {
        let (engine, tx_id) = engine_with_tx().await;
        let action_id = Uuid::new_v4();
        engine
            .register(
                action_id,
                PendingAction {
                    transaction_id: tx_id,
                    kind: EventKind::Charge,
                },
            )
            .await;

        let first = engine
            .reconcile(action_id, success(dec!(50.00), "psp-1"))
            .await
            .unwrap();
        assert!(first.is_some());

        // Same webhook delivered twice: second copy is discarded.
        let second = engine
            .reconcile(action_id, success(dec!(50.00), "psp-1"))
            .await
            .unwrap();
        assert!(second.is_none());

        let tx = first.unwrap();
        assert_eq!(tx.totals().charged, dec!(50.00));
        assert!(engine.is_retired(action_id).await);
        assert!(!engine.is_awaiting_confirmation(tx_id).await);
    }

    #[tokio::test]
    async fn test_unregistered_action_id_is_absorbed() {
        let (engine, _tx_id) = engine_with_tx().await;
        let result = engine
            .reconcile(Uuid::new_v4(), success(dec!(10.00), "psp-x"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_failure_result_appends_failure_event() {
        let (engine, tx_id) = engine_with_tx().await;
        let action_id = Uuid::new_v4();
        engine
            .register(
                action_id,
                PendingAction {
                    transaction_id: tx_id,
                    kind: EventKind::Charge,
                },
            )
            .await;

        let tx = engine
            .reconcile(
                action_id,
                ActionResult::Failure {
                    message: "insufficient funds".to_string(),
                },
            )
            .await
            .unwrap()
            .unwrap();

        let last = tx.events.last().unwrap();
        assert_eq!(last.kind, EventKind::Failure);
        assert_eq!(last.message.as_deref(), Some("insufficient funds"));
        assert_eq!(tx.totals().charged, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_reference_conflict_is_annotated_not_overwritten() {
        let (engine, tx_id) = engine_with_tx().await;
        for psp in ["psp-1", "psp-2"] {
            let action_id = Uuid::new_v4();
            engine
                .register(
                    action_id,
                    PendingAction {
                        transaction_id: tx_id,
                        kind: EventKind::Charge,
                    },
                )
                .await;
            engine
                .reconcile(action_id, success(dec!(10.00), psp))
                .await
                .unwrap();
        }

        let tx = engine
            .reconcile(Uuid::new_v4(), success(dec!(1.00), "psp-3"))
            .await
            .unwrap();
        assert!(tx.is_none());
    }

    #[tokio::test]
    async fn test_reference_conflict_message() {
        let (engine, tx_id) = engine_with_tx().await;
        let first = Uuid::new_v4();
        engine
            .register(
                first,
                PendingAction {
                    transaction_id: tx_id,
                    kind: EventKind::Charge,
                },
            )
            .await;
        engine
            .reconcile(first, success(dec!(10.00), "psp-1"))
            .await
            .unwrap();

        let second = Uuid::new_v4();
        engine
            .register(
                second,
                PendingAction {
                    transaction_id: tx_id,
                    kind: EventKind::Charge,
                },
            )
            .await;
        let tx = engine
            .reconcile(second, success(dec!(10.00), "psp-2"))
            .await
            .unwrap()
            .unwrap();

        // The original reference survives; the conflict lands on the event.
        assert_eq!(tx.psp_reference.as_deref(), Some("psp-1"));
        let last = tx.events.last().unwrap();
        assert!(last.message.as_deref().unwrap().contains("conflict"));
        assert_eq!(last.psp_reference.as_deref(), Some("psp-2"));
    }

    #[tokio::test]
    async fn test_already_settled_confirmation_is_absorbed() {
        let (engine, tx_id) = engine_with_tx().await;
        let first = register(&engine, tx_id, EventKind::Charge).await;
        engine
            .reconcile(first, success(dec!(50.00), "psp-1"))
            .await
            .unwrap();

        // A retry's confirmation reports the settlement the ledger already
        // recorded; nothing new is appended.
        let second = register(&engine, tx_id, EventKind::Charge).await;
        let tx = engine
            .reconcile(
                second,
                ActionResult::Success {
                    kind: EventKind::Charge,
                    amount: dec!(50.00),
                    psp_reference: Some("psp-1".to_string()),
                    message: None,
                    already_processed: true,
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(tx.events.len(), 2);
        assert_eq!(tx.totals().charged, dec!(50.00));
        assert!(engine.is_retired(second).await);
    }

    #[tokio::test]
    async fn test_already_processed_without_matching_event_is_recorded() {
        let (engine, tx_id) = engine_with_tx().await;
        let action_id = register(&engine, tx_id, EventKind::Charge).await;

        // Flag set, but the settled event never made it into the history:
        // the confirmation is its first record.
        let tx = engine
            .reconcile(
                action_id,
                ActionResult::Success {
                    kind: EventKind::Charge,
                    amount: dec!(25.00),
                    psp_reference: Some("psp-1".to_string()),
                    message: None,
                    already_processed: true,
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(tx.totals().charged, dec!(25.00));
    }

    #[tokio::test]
    async fn test_kind_mismatch_still_records_the_confirmed_kind() {
        let (engine, tx_id) = engine_with_tx().await;
        let action_id = register(&engine, tx_id, EventKind::Refund).await;

        // The gateway's word wins on kind; the mismatch is only logged.
        let tx = engine
            .reconcile(action_id, success(dec!(10.00), "psp-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.events.last().unwrap().kind, EventKind::Charge);
        assert_eq!(tx.totals().charged, dec!(10.00));
    }

    #[tokio::test]
    async fn test_retired_even_when_append_fails() {
        let (engine, tx_id) = engine_with_tx().await;
        let action_id = Uuid::new_v4();
        engine
            .register(
                action_id,
                PendingAction {
                    transaction_id: tx_id,
                    kind: EventKind::Charge,
                },
            )
            .await;

        // Charging over the authorization violates the ledger invariant.
        let result = engine
            .reconcile(action_id, success(dec!(500.00), "psp-1"))
            .await;
        assert!(result.is_err());
        assert!(engine.is_retired(action_id).await);
        assert!(!engine.is_awaiting_confirmation(tx_id).await);
    }
}
