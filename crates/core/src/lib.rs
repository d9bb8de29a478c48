//! Shared domain model for the TailorBiz CRM core: client snapshots, the
//! funnel aggregate, configuration, errors and the event bus.

pub mod config;
pub mod error;
pub mod event_bus;
pub mod funnel;
pub mod types;

pub use config::AppConfig;
pub use error::{CrmError, CrmResult};
