//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::MigrationConfig;
use tracing::{info, warn};

use super::load_config;
use crate::cli::{LogSettings, Overrides, RunArgs};
use crate::pipeline::{Migration, MigrationPlan};

/// Execute the `run` command
pub async fn run_migration(args: &RunArgs, logging: LogSettings) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(implementation) = args.implementation {
        info!(%implementation, "Overriding cluster implementation from CLI");
        config.cluster.implementation = implementation;
    }
    apply_overrides(&mut config, &args.overrides)?;

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let migration = Migration::new(MigrationPlan {
        config,
        config_path: args.config.clone(),
        dry_run: args.overrides.dry_run,
        show_progress: !args.overrides.no_progress,
        logging,
    });

    let shutdown_signal = shutdown_signal();

    tokio::select! {
        result = migration.run() => {
            let stats = result.context("Migration failed")?;
            stats.print_summary();
            println!(
                "Migration completed in {:.2} seconds ({} records submitted, {} inserted)",
                stats.duration.as_secs_f64(),
                stats.records_submitted(),
                stats.records_inserted(),
            );
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping migration without drain");
        }
    }

    Ok(())
}

/// Apply CLI overrides, then re-validate the result.
pub(crate) fn apply_overrides(config: &mut MigrationConfig, overrides: &Overrides) -> Result<()> {
    if let Some(size) = overrides.cluster_size {
        info!(size, "Overriding cluster size from CLI");
        config.cluster.size = size;
    }
    if let Some(page_size) = overrides.page_size {
        info!(page_size, "Overriding page size from CLI");
        config.source.page_size = page_size;
    }
    if let Some(total) = overrides.total_records {
        config.source.total_records = Some(total);
    }
    config_loader::validate(config).context("Invalid CLI override")?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ClusterConfig, InsertMode, SinkConfig, SinkType, SourceConfig};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config() -> MigrationConfig {
        MigrationConfig {
            cluster: ClusterConfig {
                size: 90,
                implementation: Default::default(),
                startup_timeout_secs: None,
            },
            source: SourceConfig {
                path: PathBuf::from("users.jsonl"),
                page_size: 8000,
                total_records: None,
            },
            sink: SinkConfig {
                name: "users".to_string(),
                sink_type: SinkType::Log,
                insert_mode: InsertMode::Bulk,
                params: HashMap::new(),
            },
        }
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = config();
        let overrides = Overrides {
            cluster_size: Some(4),
            page_size: Some(100),
            total_records: Some(1000),
            ..Default::default()
        };
        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.cluster.size, 4);
        assert_eq!(config.source.page_size, 100);
        assert_eq!(config.source.total_records, Some(1000));
    }

    #[test]
    fn test_zero_cluster_size_override_rejected() {
        let mut config = config();
        let overrides = Overrides {
            cluster_size: Some(0),
            ..Default::default()
        };
        assert!(apply_overrides(&mut config, &overrides).is_err());
    }
}
