//! Ledger domain module.
//!
//! The append-only purchase/sale log and the rules that move a product's stock:
//! positive quantities, no overselling, price resolution. Decisions are made by
//! the [`StockPosition`] aggregate; persisting them is left to the infra layer.

pub mod position;
pub mod reconcile;
pub mod transaction;

pub use position::{LedgerCommand, LedgerEvent, RecordTransaction, StockPosition};
pub use reconcile::{Reconciliation, net_quantity, reconcile};
pub use transaction::{Transaction, TransactionId, TransactionKind, opening_entry};
