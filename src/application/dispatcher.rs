use crate::application::ledger::{TransactionLedger, TransactionLocks};
use crate::application::reconciler::{PendingAction, ReconciliationEngine};
use crate::application::registry::GatewayRegistry;
use crate::domain::action::{ActionRequest, DispatchOutcome, RejectReason};
use crate::domain::gateway::{ActionContext, ActionData, GatewayReply};
use crate::domain::money::Amount;
use crate::domain::refunds::compute_refund_amount;
use crate::domain::transaction::Transaction;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Translates ledger-requested actions into gateway calls.
///
/// The caller supplies the action id: it is the idempotency key scoping one
/// logical action, and a retry after `GatewayUnreachable` must reuse it so a
/// duplicate downstream confirmation is recognized as a replay. Never mutates
/// transactions directly; results flow through the reconciliation engine.
pub struct ActionDispatcher {
    registry: Arc<GatewayRegistry>,
    ledger: Arc<TransactionLedger>,
    reconciler: Arc<ReconciliationEngine>,
    locks: Arc<TransactionLocks>,
}

impl ActionDispatcher {
    pub fn new(
        registry: Arc<GatewayRegistry>,
        ledger: Arc<TransactionLedger>,
        reconciler: Arc<ReconciliationEngine>,
    ) -> Self {
        let locks = reconciler.locks();
        Self {
            registry,
            ledger,
            reconciler,
            locks,
        }
    }

    pub async fn dispatch(
        &self,
        action_id: Uuid,
        request: ActionRequest,
    ) -> Result<DispatchOutcome> {
        self.dispatch_with_context(action_id, request, ActionContext::default())
            .await
    }

    /// Dispatches one action inside the transaction's exclusion scope. The
    /// scope is held from amount resolution through the synchronous
    /// reconcile and released when this call returns, so a `Pending` outcome
    /// leaves the transaction free for the eventual confirmation.
    pub async fn dispatch_with_context(
        &self,
        action_id: Uuid,
        request: ActionRequest,
        context: ActionContext,
    ) -> Result<DispatchOutcome> {
        if self.reconciler.is_retired(action_id).await {
            tracing::warn!(%action_id, "dispatch replay for a reconciled action id");
            return Ok(DispatchOutcome::Rejected(RejectReason::DuplicateAction));
        }

        let transaction_id = request.transaction_id();
        let _guard = self.locks.acquire(transaction_id).await;

        let tx = self.ledger.current_state(transaction_id).await?;
        if request.currency() != tx.currency {
            return Err(PaymentError::InvariantViolation(format!(
                "action currency {} does not match transaction currency {}",
                request.currency(),
                tx.currency
            )));
        }
        let entry = self.registry.get(&tx.gateway_id).await?;
        if !entry.config.supports_currency(&tx.currency) {
            return Err(PaymentError::ValidationError(format!(
                "gateway {} does not support {}",
                tx.gateway_id, tx.currency
            )));
        }

        let amount = resolve_amount(&request, &tx)?;
        self.reconciler
            .register(
                action_id,
                PendingAction {
                    transaction_id,
                    kind: request.kind(),
                },
            )
            .await;

        let action = ActionData {
            action_id,
            transaction_id,
            kind: request.kind(),
            amount,
            currency: tx.currency.clone(),
            billing: context.billing,
            shipping: context.shipping,
            data: context.data,
        };
        tracing::debug!(
            %action_id,
            transaction = %transaction_id,
            kind = ?action.kind,
            amount = %amount,
            gateway = %tx.gateway_id,
            "dispatching action"
        );

        match entry.app.process_action(action).await {
            Ok(GatewayReply::Immediate(response)) => {
                if response.action_required {
                    // Customer interaction pending; the final result arrives
                    // as a session confirmation for this action id.
                    return Ok(DispatchOutcome::Pending(action_id));
                }
                let succeeded = response.is_success;
                let declined = response.error.clone();
                if succeeded && response.currency != tx.currency {
                    return Err(PaymentError::InvariantViolation(format!(
                        "gateway confirmed {} but the transaction is in {}",
                        response.currency, tx.currency
                    )));
                }
                let updated = self
                    .reconciler
                    .reconcile_locked(action_id, response.into())
                    .await?;
                let Some(updated) = updated else {
                    return Ok(DispatchOutcome::Rejected(RejectReason::DuplicateAction));
                };
                if succeeded {
                    let event = updated.events.last().cloned().ok_or_else(|| {
                        PaymentError::ValidationError(
                            "reconciled transaction has no events".to_string(),
                        )
                    })?;
                    Ok(DispatchOutcome::Applied(event))
                } else {
                    Ok(DispatchOutcome::Rejected(RejectReason::GatewayDeclined(
                        declined.unwrap_or_else(|| "gateway reported failure".to_string()),
                    )))
                }
            }
            Ok(GatewayReply::Session) => Ok(DispatchOutcome::Pending(action_id)),
            Err(PaymentError::GatewayUnreachable(message)) => {
                // The registration stays: the request may have reached the
                // gateway, and a late confirmation must still reconcile.
                tracing::warn!(%action_id, %message, "gateway unreachable");
                Ok(DispatchOutcome::Rejected(RejectReason::GatewayUnreachable(
                    message,
                )))
            }
            Err(err) => Err(err),
        }
    }

    pub async fn is_awaiting_confirmation(&self, transaction_id: Uuid) -> bool {
        self.reconciler.is_awaiting_confirmation(transaction_id).await
    }
}

/// Resolves the amount an action moves. An omitted amount means the full
/// eligible amount; an explicit amount is authoritative and left for the
/// ledger's invariants to bound.
fn resolve_amount(request: &ActionRequest, tx: &Transaction) -> Result<Decimal> {
    match request {
        ActionRequest::Charge { amount, .. } | ActionRequest::Cancel { amount, .. } => {
            match amount {
                Some(explicit) => Ok(Amount::new(*explicit)?.value()),
                None => {
                    let eligible = tx.chargeable();
                    if eligible > Decimal::ZERO {
                        Ok(eligible)
                    } else {
                        Err(PaymentError::InvariantViolation(
                            "no remaining authorization".to_string(),
                        ))
                    }
                }
            }
        }
        ActionRequest::Refund {
            amount,
            refund_data,
            lines,
            ..
        } => {
            if let Some(refund_data) = refund_data
                && refund_data.refund_amount_is_automatically_calculated
            {
                let lines = lines.as_ref().ok_or_else(|| {
                    PaymentError::ValidationError(
                        "automatically calculated refund requires line data".to_string(),
                    )
                })?;
                return compute_refund_amount(refund_data, lines, tx.refundable());
            }
            match amount {
                Some(explicit) => Ok(Amount::new(*explicit)?.value()),
                None => {
                    let refundable = tx.refundable();
                    if refundable > Decimal::ZERO {
                        Ok(refundable)
                    } else {
                        Err(PaymentError::NothingToRefund)
                    }
                }
            }
        }
    }
}
