//! Command implementations.

mod bench;
mod run;
mod seed;
mod validate;
mod worker;

pub use bench::run_bench;
pub use run::run_migration;
pub use seed::run_seed;
pub use validate::run_validate;
pub use worker::run_worker;

use std::path::Path;

use contracts::MigrationConfig;

use crate::error::{CliError, Result};

/// Load and validate the configuration at `path`.
pub(crate) fn load_config(path: &Path) -> Result<MigrationConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path));
    }
    Ok(config_loader::ConfigLoader::load_from_path(path)?)
}
