//! Config validation
//!
//! Rules:
//! - cluster.size >= 1
//! - source.page_size >= 1
//! - source.total_records >= 1 when set
//! - cluster.startup_timeout_secs >= 1 when set
//! - sink name is not empty
//! - file sinks declare `params.dir`

use contracts::{ContractError, MigrationConfig, SinkType};

/// Validate a MigrationConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &MigrationConfig) -> Result<(), ContractError> {
    validate_cluster(config)?;
    validate_source(config)?;
    validate_sink(config)?;
    Ok(())
}

fn validate_cluster(config: &MigrationConfig) -> Result<(), ContractError> {
    if config.cluster.size == 0 {
        return Err(ContractError::config_validation(
            "cluster.size",
            "cluster size must be >= 1, got 0",
        ));
    }
    if config.cluster.startup_timeout_secs == Some(0) {
        return Err(ContractError::config_validation(
            "cluster.startup_timeout_secs",
            "startup timeout must be >= 1 second when set",
        ));
    }
    Ok(())
}

fn validate_source(config: &MigrationConfig) -> Result<(), ContractError> {
    if config.source.page_size == 0 {
        return Err(ContractError::config_validation(
            "source.page_size",
            "page size must be >= 1, got 0",
        ));
    }
    if config.source.total_records == Some(0) {
        return Err(ContractError::config_validation(
            "source.total_records",
            "total_records must be >= 1 when set",
        ));
    }
    if config.source.path.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "source.path",
            "source path cannot be empty",
        ));
    }
    Ok(())
}

fn validate_sink(config: &MigrationConfig) -> Result<(), ContractError> {
    let sink = &config.sink;
    if sink.name.is_empty() {
        return Err(ContractError::config_validation(
            "sink.name",
            "sink name cannot be empty",
        ));
    }
    if sink.sink_type == SinkType::File && !sink.params.contains_key("dir") {
        return Err(ContractError::config_validation(
            "sink.params.dir",
            "file sink requires a 'dir' parameter",
        ));
    }
    Ok(())
}
