//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ClusterImplementation, MigrationConfig, SinkType};
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    implementation: String,
    cluster_size: usize,
    page_size: usize,
    source: String,
    sink: String,
    sink_type: SinkType,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_config(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    implementation: config.cluster.implementation.to_string(),
                    cluster_size: config.cluster.size,
                    page_size: config.source.page_size,
                    source: config.source.path.display().to_string(),
                    sink: config.sink.name.clone(),
                    sink_type: config.sink.sink_type,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &MigrationConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.source.path.exists() {
        warnings.push(format!(
            "Source file {} does not exist yet",
            config.source.path.display()
        ));
    }

    if config.sink.sink_type == SinkType::Memory {
        warnings.push("Memory sink keeps records in process memory only".to_string());
    }

    if config.sink.sink_type == SinkType::Memory
        && config.cluster.implementation == ClusterImplementation::Multiprocessing
    {
        warnings.push(
            "Memory sink with multiprocessing: inserted records are lost when workers exit"
                .to_string(),
        );
    }

    if let Some(total) = config.source.total_records {
        let pages = total.div_ceil(config.source.page_size as u64);
        if pages < config.cluster.size as u64 {
            warnings.push(format!(
                "Only {} pages for {} workers: some workers will stay idle",
                pages, config.cluster.size
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Implementation: {}", summary.implementation);
            println!("  Workers: {}", summary.cluster_size);
            println!("  Page size: {}", summary.page_size);
            println!("  Source: {}", summary.source);
            println!("  Sink: {} ({:?})", summary.sink, summary.sink_type);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("migrate.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let args = ValidateArgs {
            config: dir.path().join("absent.toml"),
            json: true,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_idle_workers_warned() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            r#"
[cluster]
size = 3
implementation = "threading"

[source]
path = "users.jsonl"
page_size = 2
total_records = 4

[sink]
name = "users"
sink_type = "log"
"#,
        );
        let result = validate_config(&ValidateArgs { config, json: false });
        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("2 pages for 3 workers")));
    }

    #[test]
    fn test_zero_size_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            dir.path(),
            r#"
[cluster]
size = 0

[source]
path = "users.jsonl"

[sink]
name = "users"
sink_type = "log"
"#,
        );
        let result = validate_config(&ValidateArgs { config, json: false });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("cluster.size"));
    }
}
