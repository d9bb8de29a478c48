//! Funnel stage management — lead placement and progression through the
//! ordered stages of a nurturing funnel, with versioned persistence.

pub mod manager;
pub mod store;

pub use manager::{FunnelStageManager, StageChange};
pub use store::{FunnelRepository, InMemoryFunnelStore};
