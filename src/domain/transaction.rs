use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of ledger event kinds. Folding code matches exhaustively, so a
/// new kind is a compile-checked extension, never a silent fallthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Authorization,
    Charge,
    Refund,
    Cancel,
    Failure,
}

/// Who produced an event: our own action request, or a gateway confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Request,
    Gateway,
}

/// One immutable occurrence against a transaction. Corrections are new
/// events, never edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub kind: EventKind,
    pub amount: Decimal,
    pub psp_reference: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub actor: Actor,
}

impl TransactionEvent {
    pub fn new(kind: EventKind, amount: Decimal, actor: Actor) -> Self {
        Self {
            kind,
            amount,
            psp_reference: None,
            message: None,
            created_at: Utc::now(),
            actor,
        }
    }

    pub fn with_reference(mut self, psp_reference: Option<String>) -> Self {
        self.psp_reference = psp_reference;
        self
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }
}

/// Running totals derived by folding a transaction's events.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Totals {
    pub authorized: Decimal,
    pub charged: Decimal,
    pub refunded: Decimal,
    pub cancelled: Decimal,
}

impl Totals {
    fn accumulate(&mut self, event: &TransactionEvent) {
        match event.kind {
            EventKind::Authorization => self.authorized += event.amount,
            EventKind::Charge => self.charged += event.amount,
            EventKind::Refund => self.refunded += event.amount,
            EventKind::Cancel => self.cancelled += event.amount,
            EventKind::Failure => {}
        }
    }

    /// Amount bounds that must hold after every append. Charges and cancels
    /// consume the authorization; refunds consume the charged pool.
    fn check(&self) -> Result<()> {
        if self.charged + self.cancelled > self.authorized {
            return Err(PaymentError::InvariantViolation(format!(
                "charged {} + cancelled {} exceeds authorized {}",
                self.charged, self.cancelled, self.authorized
            )));
        }
        if self.refunded > self.charged {
            return Err(PaymentError::InvariantViolation(format!(
                "refunded {} exceeds charged {}",
                self.refunded, self.charged
            )));
        }
        Ok(())
    }
}

/// One payment instrument's lifecycle against one order or checkout.
///
/// The event list is the source of truth; totals are always recomputed by
/// folding events in timestamp order (ties broken by append order). There is
/// no separate mutable summary that could diverge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    /// Identifier of the owning gateway/app.
    pub gateway_id: String,
    pub currency: String,
    /// External reference assigned by the gateway, adopted from the first
    /// confirmed event that carries one.
    pub psp_reference: Option<String>,
    pub events: Vec<TransactionEvent>,
}

impl Transaction {
    pub fn new(gateway_id: &str, currency: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            gateway_id: gateway_id.to_string(),
            currency: currency.to_string(),
            psp_reference: None,
            events: Vec::new(),
        }
    }

    /// Folds all events into the current totals, in timestamp order with
    /// append order as the tiebreak.
    pub fn totals(&self) -> Totals {
        let mut ordered: Vec<&TransactionEvent> = self.events.iter().collect();
        ordered.sort_by_key(|event| event.created_at);
        let mut totals = Totals::default();
        for event in ordered {
            totals.accumulate(event);
        }
        totals
    }

    /// Authorization not yet consumed by charges or cancels.
    pub fn chargeable(&self) -> Decimal {
        let totals = self.totals();
        totals.authorized - totals.charged - totals.cancelled
    }

    /// Charged amount not yet refunded.
    pub fn refundable(&self) -> Decimal {
        let totals = self.totals();
        totals.charged - totals.refunded
    }

    /// Actions that still make sense given the current totals.
    pub fn available_actions(&self) -> Vec<&'static str> {
        let mut actions = Vec::new();
        if self.chargeable() > Decimal::ZERO {
            actions.push("charge");
            actions.push("cancel");
        }
        if self.refundable() > Decimal::ZERO {
            actions.push("refund");
        }
        actions
    }

    /// Validates the amount invariants and appends the event. On failure the
    /// transaction is left untouched.
    pub fn apply(&mut self, event: TransactionEvent) -> Result<()> {
        if event.amount < Decimal::ZERO {
            return Err(PaymentError::InvariantViolation(format!(
                "event amount {} is negative",
                event.amount
            )));
        }
        let mut next = self.totals();
        next.accumulate(&event);
        next.check()?;

        if self.psp_reference.is_none()
            && let Some(reference) = &event.psp_reference
        {
            self.psp_reference = Some(reference.clone());
        }
        self.events.push(event);
        Ok(())
    }
}
