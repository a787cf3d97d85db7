use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    /// Create a transaction owned by `gateway` in `currency`.
    Open,
    /// Record a gateway authorization directly in the ledger.
    Authorize,
    Charge,
    Refund,
    Cancel,
}

/// One replay row. `transaction` is a file-local handle, not a ledger id.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ActionRow {
    pub op: OpKind,
    pub transaction: String,
    pub gateway: Option<String>,
    pub currency: Option<String>,
    /// Parsed from the string form so the written scale survives; the
    /// inferred path would round-trip money through a float.
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub amount: Option<Decimal>,
}

/// Reads action rows from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// yielding rows lazily so large replay files stream.
pub struct ActionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ActionReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn actions(self) -> impl Iterator<Item = Result<ActionRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}
