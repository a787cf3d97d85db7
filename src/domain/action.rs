use crate::domain::refunds::PaymentLines;
use crate::domain::transaction::{EventKind, TransactionEvent};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A line marked for refund, resolved against the authoritative line data at
/// calculation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRefund {
    pub line_id: u64,
    pub quantity: u32,
}

/// Aggregates the order and fulfillment lines to refund.
///
/// When `refund_amount_is_automatically_calculated` is set the line
/// aggregation is the sole source of the refund amount; otherwise the
/// caller-supplied amount is authoritative and the lines are informational.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RefundData {
    pub order_lines_to_refund: Vec<LineRefund>,
    pub fulfillment_lines_to_refund: Vec<LineRefund>,
    pub refund_shipping_costs: bool,
    pub refund_amount_is_automatically_calculated: bool,
}

/// A requested money-moving action against a transaction.
///
/// An omitted amount means "the transaction's full eligible amount": the
/// remaining authorization for charges and cancels, the remaining charged
/// amount for refunds.
#[derive(Debug, Clone)]
pub enum ActionRequest {
    Charge {
        transaction_id: Uuid,
        amount: Option<Decimal>,
        currency: String,
    },
    Refund {
        transaction_id: Uuid,
        amount: Option<Decimal>,
        currency: String,
        refund_data: Option<RefundData>,
        /// Line snapshot from the order engine, resolved at call time for the
        /// refund calculator. Required when the refund amount is
        /// automatically calculated.
        lines: Option<PaymentLines>,
    },
    Cancel {
        transaction_id: Uuid,
        amount: Option<Decimal>,
        currency: String,
    },
}

impl ActionRequest {
    pub fn transaction_id(&self) -> Uuid {
        match self {
            Self::Charge { transaction_id, .. }
            | Self::Refund { transaction_id, .. }
            | Self::Cancel { transaction_id, .. } => *transaction_id,
        }
    }

    pub fn currency(&self) -> &str {
        match self {
            Self::Charge { currency, .. }
            | Self::Refund { currency, .. }
            | Self::Cancel { currency, .. } => currency,
        }
    }

    pub fn amount(&self) -> Option<Decimal> {
        match self {
            Self::Charge { amount, .. }
            | Self::Refund { amount, .. }
            | Self::Cancel { amount, .. } => *amount,
        }
    }

    /// The event kind a successful confirmation of this action produces.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Charge { .. } => EventKind::Charge,
            Self::Refund { .. } => EventKind::Refund,
            Self::Cancel { .. } => EventKind::Cancel,
        }
    }
}

/// Why a dispatch was rejected, normalized away from raw gateway error text
/// so the calling layer can decide whether to retry or surface a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Transport-level failure. Retry with the same action id.
    GatewayUnreachable(String),
    /// The gateway processed the action and declined it.
    GatewayDeclined(String),
    /// The action id was already reconciled; this dispatch is a replay.
    DuplicateAction,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GatewayUnreachable(message) => {
                write!(f, "gateway unreachable, retry with the same action id: {message}")
            }
            Self::GatewayDeclined(message) => write!(f, "gateway declined: {message}"),
            Self::DuplicateAction => write!(f, "action id already reconciled"),
        }
    }
}

/// Outcome of dispatching one action.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// The gateway answered inline with success and the event is in the ledger.
    Applied(TransactionEvent),
    /// The result arrives later; the action id is the correlation key.
    Pending(Uuid),
    Rejected(RejectReason),
}
