use crate::domain::action::RefundData;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One order line as seen by the payment layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLine {
    pub line_id: u64,
    pub unit_amount: Decimal,
    pub quantity: u32,
    pub product_name: String,
    pub product_sku: Option<String>,
}

/// Snapshot of an order's lines and shipping/voucher amounts, resolved by the
/// order engine and passed in at call time. Never cached by the core.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PaymentLines {
    pub shipping_amount: Decimal,
    pub voucher_amount: Decimal,
    pub lines: Vec<PaymentLine>,
}

impl PaymentLines {
    fn unit_amount(&self, line_id: u64) -> Result<Decimal> {
        self.lines
            .iter()
            .find(|line| line.line_id == line_id)
            .map(|line| line.unit_amount)
            .ok_or_else(|| {
                PaymentError::ValidationError(format!("unknown refund line {line_id}"))
            })
    }
}

/// Computes the refundable amount for the marked lines.
///
/// Sums `unit_amount * quantity` for every order and fulfillment line marked
/// for refund, adds shipping when requested, and caps the result at the
/// transaction's currently refundable remainder. Pure function: no side
/// effects, no I/O.
pub fn compute_refund_amount(
    refund_data: &RefundData,
    lines: &PaymentLines,
    refundable: Decimal,
) -> Result<Decimal> {
    let mut total = Decimal::ZERO;
    for marked in refund_data
        .order_lines_to_refund
        .iter()
        .chain(refund_data.fulfillment_lines_to_refund.iter())
    {
        total += lines.unit_amount(marked.line_id)? * Decimal::from(marked.quantity);
    }
    if refund_data.refund_shipping_costs {
        total += lines.shipping_amount;
    }
    if total <= Decimal::ZERO {
        return Err(PaymentError::NothingToRefund);
    }
    Ok(total.min(refundable))
}
