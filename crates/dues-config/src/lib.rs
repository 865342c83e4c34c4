//! dues-config
//!
//! Persistent engine configuration: where club data lives, logging, the
//! deposit notification listener, the club bank account and differential rules.

pub mod error;
pub mod manager;
pub mod model;

pub use error::ConfigError;
pub use manager::ConfigManager;
pub use model::{Config, NotificationSettings};
