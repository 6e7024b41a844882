//! `bench` command implementation.
//!
//! Runs the same migration once per cluster implementation, pausing between
//! runs, then prints a comparison table and writes the results as JSON.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use contracts::{ClusterImplementation, MigrationConfig};
use serde::Serialize;
use tracing::{error, info};

use super::load_config;
use super::run::apply_overrides;
use crate::cli::{BenchArgs, LogSettings};
use crate::pipeline::{Migration, MigrationPlan};

/// Outcome of one benchmark run
#[derive(Debug, Clone, Serialize)]
struct BenchRun {
    implementation: ClusterImplementation,
    execution_time: f64,
    users_migrated: u64,
    error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

#[derive(Debug, Serialize)]
struct BenchConfig {
    cluster_size: usize,
    page_size: usize,
    total_records: Option<u64>,
    sink: String,
    dry_run: bool,
}

/// Contents of the results file
#[derive(Debug, Serialize)]
struct BenchResults {
    timestamp: String,
    config: BenchConfig,
    results: Vec<BenchRun>,
}

/// Execute the `bench` command
pub async fn run_bench(args: &BenchArgs, logging: LogSettings) -> Result<()> {
    let mut config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    apply_overrides(&mut config, &args.overrides)?;

    let mut results = Vec::with_capacity(ClusterImplementation::ALL.len());
    for (i, implementation) in ClusterImplementation::ALL.into_iter().enumerate() {
        if i > 0 && args.pause_secs > 0 {
            info!(seconds = args.pause_secs, "Pausing before next run");
            tokio::time::sleep(Duration::from_secs(args.pause_secs)).await;
        }

        println!("\nTesting {} implementation...", implementation);
        let run = bench_one(args, &config, implementation, logging).await;
        if run.error {
            println!("  Failed: {}", run.error_message.as_deref().unwrap_or("unknown error"));
        } else {
            println!(
                "  {} users in {:.2} seconds",
                run.users_migrated, run.execution_time
            );
        }
        results.push(run);
    }

    print_table(&results);

    let output = BenchResults {
        timestamp: Local::now().to_rfc3339(),
        config: BenchConfig {
            cluster_size: config.cluster.size,
            page_size: config.source.page_size,
            total_records: config.source.total_records,
            sink: config.sink.name.clone(),
            dry_run: args.overrides.dry_run,
        },
        results,
    };
    write_results(&args.output, &output)?;
    println!("\nResults saved to {}", args.output.display());
    Ok(())
}

async fn bench_one(
    args: &BenchArgs,
    config: &MigrationConfig,
    implementation: ClusterImplementation,
    logging: LogSettings,
) -> BenchRun {
    let mut config = config.clone();
    config.cluster.implementation = implementation;

    let migration = Migration::new(MigrationPlan {
        config,
        config_path: args.config.clone(),
        dry_run: args.overrides.dry_run,
        show_progress: !args.overrides.no_progress,
        logging,
    });

    let start = Instant::now();
    match migration.run().await {
        Ok(stats) => BenchRun {
            implementation,
            execution_time: stats.duration.as_secs_f64(),
            users_migrated: stats.records_submitted(),
            error: false,
            error_message: None,
        },
        Err(e) => {
            error!(%implementation, error = %e, "Benchmark run failed");
            BenchRun {
                implementation,
                execution_time: start.elapsed().as_secs_f64(),
                users_migrated: 0,
                error: true,
                error_message: Some(e.to_string()),
            }
        }
    }
}

/// Successful runs, fastest first
fn ranked(results: &[BenchRun]) -> Vec<&BenchRun> {
    let mut ok: Vec<&BenchRun> = results.iter().filter(|r| !r.error).collect();
    ok.sort_by(|a, b| a.execution_time.total_cmp(&b.execution_time));
    ok
}

/// How many times faster the fastest run was than the slowest
fn speedup(ranked: &[&BenchRun]) -> Option<f64> {
    let (fastest, slowest) = (ranked.first()?, ranked.last()?);
    if ranked.len() < 2 || fastest.execution_time <= 0.0 {
        return None;
    }
    Some(slowest.execution_time / fastest.execution_time)
}

fn print_table(results: &[BenchRun]) {
    println!("\n{}", "=".repeat(60));
    println!("BENCHMARK SUMMARY");
    println!("{}", "=".repeat(60));
    println!("{:<18} {:>12} {:>12} {:>12}", "Implementation", "Time (s)", "Users", "Users/s");
    println!("{}", "-".repeat(60));

    let ranked = ranked(results);
    for run in &ranked {
        let rate = if run.execution_time > 0.0 {
            run.users_migrated as f64 / run.execution_time
        } else {
            0.0
        };
        println!(
            "{:<18} {:>12.2} {:>12} {:>12.0}",
            run.implementation.as_str(),
            run.execution_time,
            run.users_migrated,
            rate
        );
    }
    for run in results.iter().filter(|r| r.error) {
        println!("{:<18} {:>12} {:>12} {:>12}", run.implementation.as_str(), "failed", "-", "-");
    }

    if let (Some(fastest), Some(slowest), Some(ratio)) =
        (ranked.first(), ranked.last(), speedup(&ranked))
    {
        println!(
            "\nFastest: {} is {:.2}x faster than {}",
            fastest.implementation, ratio, slowest.implementation
        );
    }
}

fn write_results(path: &Path, results: &BenchResults) -> Result<()> {
    let json = serde_json::to_string_pretty(results).context("Failed to serialize results")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write results to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(implementation: ClusterImplementation, time: f64, error: bool) -> BenchRun {
        BenchRun {
            implementation,
            execution_time: time,
            users_migrated: if error { 0 } else { 100 },
            error,
            error_message: error.then(|| "boom".to_string()),
        }
    }

    #[test]
    fn test_ranked_sorts_by_time_and_skips_errors() {
        let results = vec![
            run(ClusterImplementation::Asyncio, 3.0, false),
            run(ClusterImplementation::Threading, 1.5, false),
            run(ClusterImplementation::Multiprocessing, 0.1, true),
        ];
        let ranked = ranked(&results);
        let order: Vec<_> = ranked.iter().map(|r| r.implementation).collect();
        assert_eq!(
            order,
            vec![ClusterImplementation::Threading, ClusterImplementation::Asyncio]
        );
        assert_eq!(speedup(&ranked), Some(2.0));
    }

    #[test]
    fn test_no_speedup_with_single_success() {
        let results = vec![
            run(ClusterImplementation::Asyncio, 3.0, false),
            run(ClusterImplementation::Threading, 1.0, true),
        ];
        assert_eq!(speedup(&ranked(&results)), None);
    }

    #[test]
    fn test_results_file_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.json");
        let results = BenchResults {
            timestamp: Local::now().to_rfc3339(),
            config: BenchConfig {
                cluster_size: 3,
                page_size: 2,
                total_records: Some(8),
                sink: "users".to_string(),
                dry_run: true,
            },
            results: vec![run(ClusterImplementation::Threading, 1.0, true)],
        };
        write_results(&path, &results).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["config"]["cluster_size"], 3);
        assert_eq!(value["results"][0]["implementation"], "threading");
        assert_eq!(value["results"][0]["error"], true);
        assert_eq!(value["results"][0]["error_message"], "boom");
    }
}
