use crate::domain::ports::{LedgerObserver, TransactionStoreBox};
use crate::domain::transaction::{Transaction, TransactionEvent};
use crate::error::{PaymentError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Per-transaction exclusion scopes. Operations for one transaction are
/// serialized; different transactions run fully in parallel.
#[derive(Default)]
pub struct TransactionLocks {
    inner: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl TransactionLocks {
    pub async fn acquire(&self, transaction_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            locks.entry(transaction_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// The append-only transaction ledger: exclusive owner of event history and
/// the only mutable shared resource in the core.
///
/// `append` is the sole linearization point: it holds the transaction's own
/// exclusion scope across its read-validate-write cycle, so direct callers
/// get the same atomicity as those going through the dispatcher.
pub struct TransactionLedger {
    store: TransactionStoreBox,
    observers: Vec<Arc<dyn LedgerObserver>>,
    locks: TransactionLocks,
}

impl TransactionLedger {
    pub fn new(store: TransactionStoreBox) -> Self {
        Self {
            store,
            observers: Vec::new(),
            locks: TransactionLocks::default(),
        }
    }

    /// Registers an observer notified after every successful append.
    pub fn add_observer(&mut self, observer: Arc<dyn LedgerObserver>) {
        self.observers.push(observer);
    }

    /// Creates a new transaction owned by `gateway_id`.
    pub async fn open(&self, gateway_id: &str, currency: &str) -> Result<Transaction> {
        let tx = Transaction::new(gateway_id, currency);
        self.store.store(tx.clone()).await?;
        Ok(tx)
    }

    /// Validates the amount invariants and atomically appends the event,
    /// returning the updated aggregate. A failed append leaves the stored
    /// transaction untouched.
    pub async fn append(
        &self,
        transaction_id: Uuid,
        event: TransactionEvent,
    ) -> Result<Transaction> {
        let _guard = self.locks.acquire(transaction_id).await;
        let mut tx = self
            .store
            .get(transaction_id)
            .await?
            .ok_or(PaymentError::UnknownTransaction(transaction_id))?;
        tx.apply(event.clone())?;
        self.store.store(tx.clone()).await?;

        tracing::debug!(
            transaction = %tx.id,
            kind = ?event.kind,
            amount = %event.amount,
            "ledger event appended"
        );
        for observer in &self.observers {
            observer.on_event(&tx, &event).await;
        }
        Ok(tx)
    }

    /// Pure read of the latest aggregate.
    pub async fn current_state(&self, transaction_id: Uuid) -> Result<Transaction> {
        self.store
            .get(transaction_id)
            .await?
            .ok_or(PaymentError::UnknownTransaction(transaction_id))
    }

    pub async fn all(&self) -> Result<Vec<Transaction>> {
        self.store.all().await
    }
}
