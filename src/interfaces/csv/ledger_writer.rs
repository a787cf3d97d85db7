use crate::domain::transaction::Transaction;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct SummaryRow<'a> {
    transaction: &'a str,
    authorized: Decimal,
    charged: Decimal,
    refunded: Decimal,
    cancelled: Decimal,
    psp_reference: &'a str,
}

/// Writes final transaction summaries as CSV.
pub struct LedgerWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LedgerWriter<W> {
    pub fn new(dest: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(dest),
        }
    }

    pub fn write_summaries(&mut self, entries: &[(String, Transaction)]) -> Result<()> {
        for (handle, tx) in entries {
            let totals = tx.totals();
            self.writer.serialize(SummaryRow {
                transaction: handle,
                authorized: totals.authorized,
                charged: totals.charged,
                refunded: totals.refunded,
                cancelled: totals.cancelled,
                psp_reference: tx.psp_reference.as_deref().unwrap_or(""),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
