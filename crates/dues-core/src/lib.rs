//! dues-core
//!
//! Billing, payment and ledger services for club dues.
//! Depends on dues-domain. Persistence goes through the `ClubStorage` trait.

pub mod amount_calculator;
pub mod billing_service;
pub mod error;
pub mod format;
pub mod ledger_service;
pub mod messaging;
pub mod notification;
pub mod payment_status;
pub mod repository;
pub mod scheduled_service;
pub mod storage;
pub mod time;

pub use amount_calculator::*;
pub use billing_service::*;
pub use error::{CoreError, CoreResult};
pub use format::*;
pub use ledger_service::*;
pub use messaging::*;
pub use notification::*;
pub use payment_status::*;
pub use repository::ClubRepository;
pub use scheduled_service::*;
pub use storage::*;
pub use time::*;

#[cfg(test)]
mod tests;
