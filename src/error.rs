use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy for the payment core.
///
/// Duplicate confirmations and psp-reference conflicts are deliberately not
/// errors: both are expected under at-least-once delivery and are absorbed
/// (logged) by the reconciliation engine instead of being surfaced to callers.
#[derive(Error, Debug)]
pub enum PaymentError {
    /// No gateway with this identifier is configured in the registry.
    #[error("unknown gateway: {0}")]
    UnknownGateway(String),
    /// The target transaction does not exist in the ledger.
    #[error("unknown transaction: {0}")]
    UnknownTransaction(Uuid),
    /// Appending the event would break the ledger's amount invariants.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// Transport-level gateway failure. Retryable with the same action id.
    #[error("gateway unreachable: {0}")]
    GatewayUnreachable(String),
    /// A refund was requested but the computed amount is zero and no explicit
    /// override was supplied.
    #[error("nothing to refund")]
    NothingToRefund,
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PaymentError>;
