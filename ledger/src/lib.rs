//! # Ticket Registry Ledger Adapter
//!
//! Production [`LedgerClient`](ticket_registry_core::LedgerClient)
//! implementation speaking JSON-RPC 2.0 to a registry node.
//!
//! Transport failures surface as `LedgerError::Transient`; the node's
//! business-rule error codes map to typed `RejectionReason`s. Write
//! operations are submit-then-await-finality: the adapter submits, receives
//! a transaction hash, and polls the receipt until the node reports it
//! final. A write whose receipt never arrives is reported transient - the
//! caller reconciles by re-reading before any retry, per the protocol's
//! write rules.

pub mod rpc;

pub use rpc::{FinalityPolicy, JsonRpcLedgerClient};
