//! Migration driver module.

mod orchestrator;
mod stats;

pub use orchestrator::{Migration, MigrationPlan};
pub use stats::MigrationStats;
