//! Application layer orchestrating the payment core.
//!
//! The ledger is the sole writer of transaction history; the dispatcher only
//! submits actions and forwards gateway replies to the reconciliation engine,
//! which merges each result into the ledger at most once per action id.

pub mod dispatcher;
pub mod ledger;
pub mod methods;
pub mod reconciler;
pub mod registry;
