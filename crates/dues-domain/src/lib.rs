//! dues-domain
//!
//! Pure domain models (BillingPeriod, PaymentRecord, ScheduledBilling, LedgerEntry, etc.).
//! No I/O, no storage. Only data types, snapshots and the arithmetic they own.

pub mod account;
pub mod billing;
pub mod common;
pub mod differential;
pub mod ledger;
pub mod roster;

pub use account::*;
pub use billing::*;
pub use common::*;
pub use differential::*;
pub use ledger::*;
pub use roster::*;
