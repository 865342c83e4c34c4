//! Club dues billing and ledger reconciliation.
//!
//! The root crate wires configuration, JSON storage and the core services
//! into a [`DuesEngine`], and owns process-wide tracing setup.

pub mod engine;
pub mod errors;
pub mod logging;

pub use dues_config::{self, Config, ConfigManager};
pub use dues_core::{self, CoreError};
pub use dues_domain;
pub use dues_storage_json::{self, JsonClubStorage};
pub use engine::DuesEngine;
pub use errors::EngineError;
pub use logging::init_tracing;

/// Initializes global tracing with the default filter.
pub fn init() {
    logging::init_tracing(dues_config::model::DEFAULT_LOG_FILTER);
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init();
    }
}
