//! Transaction ledger and gateway-action dispatcher.
//!
//! Sits between an order/checkout engine and external payment gateways:
//! every money-moving intent (charge, refund, cancel) is an idempotent,
//! auditable action dispatched to the owning gateway, and the gateway's
//! reply -- inline or via a later confirmation -- is reconciled into a
//! single append-only transaction history exactly once.

pub mod error;

pub mod domain {
    pub mod action;
    pub mod gateway;
    pub mod money;
    pub mod ports;
    pub mod refunds;
    pub mod transaction;
}

pub mod application;

pub mod infrastructure {
    pub mod in_memory;
}

pub mod gateways {
    pub mod mock;
}

pub mod interfaces {
    pub mod csv {
        pub mod action_reader;
        pub mod ledger_writer;
    }
}
