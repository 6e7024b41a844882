//! # Integration Tests
//!
//! Cross-crate end-to-end tests.
//!
//! Covers:
//! - config loading feeding the cluster factory
//! - source -> page stream -> cluster -> sink, for the in-process strategies
//! - containment of sink failures and dead workers
//!
//! The process-isolated strategy needs the real binary and is tested from the
//! `cli` crate.

#[cfg(test)]
mod contract_tests {
    use contracts::{Batch, WorkerMessage};

    #[test]
    fn test_empty_batch_is_not_the_sentinel() {
        let empty = WorkerMessage::Batch(Batch::default());
        assert!(!empty.is_shutdown());
        assert!(WorkerMessage::Shutdown.is_shutdown());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::path::Path;

    use cluster::sinks::MemoryStore;
    use cluster::{
        ClusterOptions, ClusterReport, InsertTaskFactory, LocalClusterMigration, StockSinkFactory,
    };
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ClusterImplementation, InsertMode, RecordSource, SinkConfig, SinkType, UserRecord,
        WorkerId,
    };
    use ingestion::{JsonLinesSource, MemorySource, PageStream};

    fn memory_sink() -> SinkConfig {
        SinkConfig {
            name: "users".to_string(),
            sink_type: SinkType::Memory,
            insert_mode: InsertMode::Bulk,
            params: HashMap::new(),
        }
    }

    /// Drive `source` through a cluster exactly like the CLI driver does.
    async fn migrate<S: RecordSource>(
        source: S,
        page_size: usize,
        sinks: StockSinkFactory,
        cluster_size: usize,
        implementation: ClusterImplementation,
    ) -> ClusterReport {
        let mode = sinks.config().insert_mode;
        let mut cluster = cluster::create(
            InsertTaskFactory::new(sinks, mode),
            cluster_size,
            implementation,
            ClusterOptions::default(),
        )
        .unwrap();
        cluster.initialize_processes().await.unwrap();

        let mut pages = PageStream::new(source, page_size).unwrap();
        while let Some(batch) = pages.next_page().await.unwrap() {
            cluster.start_process(batch).await.unwrap();
        }
        cluster.awaiting_completion_processes().await.unwrap()
    }

    fn batches_per_worker(report: &ClusterReport) -> Vec<u64> {
        report
            .workers
            .iter()
            .map(|w| w.task_report().map_or(0, |r| r.batches_received))
            .collect()
    }

    /// Source -> PageStream -> cluster -> MemoryStore, 3 workers, pages of 2
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_in_process_strategies_agree() {
        for implementation in [ClusterImplementation::Asyncio, ClusterImplementation::Threading] {
            let store = MemoryStore::default();
            let sinks = StockSinkFactory::new(memory_sink()).with_memory_store(store.clone());

            let report = migrate(MemorySource::generated(8), 2, sinks, 3, implementation).await;

            assert_eq!(report.implementation, implementation);
            assert_eq!(report.batches_dispatched, 4);
            assert_eq!(report.records_submitted, 8);
            assert_eq!(report.records_inserted(), 8);
            assert_eq!(batches_per_worker(&report), vec![2, 1, 1]);
            assert!(report.is_clean());

            let mut names: Vec<String> = store.records().into_iter().map(|r| r.username).collect();
            names.sort();
            let mut expected: Vec<String> = (1..=8).map(|n| format!("u{n}")).collect();
            expected.sort();
            assert_eq!(names, expected);
        }
    }

    /// More workers than pages: idle workers still get their sentinel and report
    #[tokio::test]
    async fn test_e2e_idle_workers_report() {
        let sinks = StockSinkFactory::new(memory_sink());
        let report = migrate(
            MemorySource::generated(3),
            2,
            sinks,
            5,
            ClusterImplementation::Asyncio,
        )
        .await;

        assert_eq!(report.workers.len(), 5);
        assert_eq!(batches_per_worker(&report), vec![1, 1, 0, 0, 0]);
        assert!(report.failed_workers().is_empty());
    }

    /// An empty source dispatches nothing but still drains cleanly
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_empty_source() {
        let sinks = StockSinkFactory::new(memory_sink());
        let report = migrate(
            MemorySource::default(),
            8000,
            sinks,
            4,
            ClusterImplementation::Threading,
        )
        .await;

        assert_eq!(report.batches_dispatched, 0);
        assert_eq!(batches_per_worker(&report), vec![0, 0, 0, 0]);
    }

    /// Rejected batches are contained in their worker and never stop the run
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_rejected_batches_are_contained() {
        let mut records = MemorySource::generated(6).records().to_vec();
        // page 3 repeats u1: its bulk insert is rejected as a whole
        records.extend([
            UserRecord::new("u1", "dup@example.com", 40),
            UserRecord::new("u7", "u7@example.com", 41),
        ]);
        let store = MemoryStore::unique_usernames();
        let sinks = StockSinkFactory::new(memory_sink()).with_memory_store(store.clone());

        let report = migrate(
            MemorySource::new(records),
            2,
            sinks,
            2,
            ClusterImplementation::Threading,
        )
        .await;

        assert_eq!(report.records_submitted, 8);
        assert_eq!(report.records_inserted(), 6);
        assert_eq!(report.totals().failed_batches, 1);
        assert_eq!(report.totals().failed_records, 2);
        assert!(report.failed_workers().is_empty());
        assert!(!report.is_clean());
        assert_eq!(store.len(), 6);
    }

    /// Single-row mode keeps the rows before a rejected one
    #[tokio::test]
    async fn test_e2e_single_mode_keeps_prefix() {
        let records = vec![
            UserRecord::new("a", "a@example.com", 20),
            UserRecord::new("b", "b@example.com", 21),
            UserRecord::new("a", "a2@example.com", 22),
            UserRecord::new("c", "c@example.com", 23),
        ];
        let store = MemoryStore::unique_usernames();
        let mut config = memory_sink();
        config.insert_mode = InsertMode::Single;
        let sinks = StockSinkFactory::new(config).with_memory_store(store.clone());

        let report = migrate(
            MemorySource::new(records),
            4,
            sinks,
            1,
            ClusterImplementation::Asyncio,
        )
        .await;

        // "a" and "b" land, the duplicate "a" aborts the rest of the batch
        assert_eq!(report.records_inserted(), 2);
        assert_eq!(report.totals().failed_records, 2);
        assert_eq!(store.len(), 2);
    }

    fn write_jsonl(path: &Path, count: usize) {
        let body: String = MemorySource::generated(count)
            .records()
            .iter()
            .map(|r| serde_json::to_string(r).unwrap() + "\n")
            .collect();
        std::fs::write(path, body).unwrap();
    }

    fn read_usernames(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str::<UserRecord>(l).unwrap().username)
            .collect()
    }

    /// Config file -> JSON-lines source -> threaded cluster -> file sinks
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_config_driven_file_migration() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("users.jsonl");
        let out = dir.path().join("out");
        write_jsonl(&source_path, 7);

        let toml = format!(
            r#"
[cluster]
size = 3
implementation = "threading"

[source]
path = "{}"
page_size = 2

[sink]
name = "users"
sink_type = "file"

[sink.params]
dir = "{}"
"#,
            source_path.display(),
            out.display()
        );
        let config = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();

        let source = JsonLinesSource::open(&config.source.path).await.unwrap();
        let report = migrate(
            source,
            config.source.page_size,
            StockSinkFactory::new(config.sink.clone()),
            config.cluster.size,
            config.cluster.implementation,
        )
        .await;

        assert_eq!(report.records_inserted(), 7);
        let file = |worker: WorkerId| out.join(format!("users-{worker}.jsonl"));
        assert_eq!(read_usernames(&file(WorkerId(0))), vec!["u1", "u2", "u7"]);
        assert_eq!(read_usernames(&file(WorkerId(1))), vec!["u3", "u4"]);
        assert_eq!(read_usernames(&file(WorkerId(2))), vec!["u5", "u6"]);
    }

    /// Strategy tags from config text go through the same validation
    #[test]
    fn test_unknown_tag_rejected_by_factory() {
        let result = cluster::create_from_tag(
            InsertTaskFactory::new(StockSinkFactory::new(memory_sink()), InsertMode::Bulk),
            2,
            "greenlets",
            ClusterOptions::default(),
        );
        assert!(result.is_err());
    }
}
