use crate::domain::transaction::{Transaction, TransactionEvent};
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence seam for transactions. The in-memory implementation is the
/// default; the trait keeps the storage engine out of the core.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Inserts or replaces the transaction.
    async fn store(&self, tx: Transaction) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Transaction>>;
    async fn all(&self) -> Result<Vec<Transaction>>;
}

pub type TransactionStoreBox = Box<dyn TransactionStore>;

/// Notified after every successful ledger append. This is the unit of
/// observability the order engine reacts to.
#[async_trait]
pub trait LedgerObserver: Send + Sync {
    async fn on_event(&self, transaction: &Transaction, event: &TransactionEvent);
}
