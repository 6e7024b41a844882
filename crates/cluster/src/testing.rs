//! Test doubles shared by the cluster unit tests.

use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use contracts::{BackendTask, BatchReceiver, ContractError, TaskReport, WorkerId, WorkerMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Batch(Vec<String>),
    Shutdown,
}

/// Everything every worker received, in arrival order, plus the OS thread
/// each batch was handled on.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal {
    events: Arc<Mutex<Vec<(WorkerId, Event)>>>,
    threads: Arc<Mutex<Vec<(WorkerId, ThreadId)>>>,
}

impl Journal {
    fn push(&self, worker: WorkerId, event: Event) {
        if matches!(event, Event::Batch(_)) {
            let thread = std::thread::current().id();
            self.threads.lock().unwrap().push((worker, thread));
        }
        self.events.lock().unwrap().push((worker, event));
    }

    pub(crate) fn threads(&self) -> Vec<(WorkerId, ThreadId)> {
        self.threads.lock().unwrap().clone()
    }

    pub(crate) fn events(&self, worker: WorkerId) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(w, _)| *w == worker)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub(crate) fn batches(&self, worker: WorkerId) -> Vec<Vec<String>> {
        self.events(worker)
            .into_iter()
            .filter_map(|e| match e {
                Event::Batch(names) => Some(names),
                Event::Shutdown => None,
            })
            .collect()
    }

    pub(crate) fn usernames(&self, worker: WorkerId) -> Vec<String> {
        self.batches(worker).into_iter().flatten().collect()
    }

    pub(crate) fn shutdowns(&self, worker: WorkerId) -> usize {
        self.events(worker)
            .iter()
            .filter(|e| **e == Event::Shutdown)
            .count()
    }
}

/// Records every message, and keeps listening after the sentinel until the
/// channel closes so a late batch would show up in the journal.
pub(crate) struct RecordingTask {
    worker: WorkerId,
    journal: Journal,
    strict: bool,
    panic_on_batch: Option<u64>,
}

impl RecordingTask {
    pub(crate) fn new(worker: WorkerId, journal: Journal) -> Self {
        Self {
            worker,
            journal,
            strict: false,
            panic_on_batch: None,
        }
    }

    /// Fail if the channel closes before the sentinel.
    pub(crate) fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub(crate) fn panic_on_batch(mut self, index: u64) -> Self {
        self.panic_on_batch = Some(index);
        self
    }
}

impl BackendTask for RecordingTask {
    async fn run<R>(self, mut rx: R) -> Result<TaskReport, ContractError>
    where
        R: BatchReceiver + 'static,
    {
        let mut report = TaskReport::default();
        let mut stopped = false;
        loop {
            let message = match rx.recv().await {
                Ok(message) => message,
                Err(e) if self.strict && !stopped => return Err(e),
                Err(_) => return Ok(report),
            };
            match message {
                WorkerMessage::Batch(batch) => {
                    if self.panic_on_batch == Some(report.batches_received) {
                        panic!("{} hit a poisoned batch", self.worker);
                    }
                    report.batches_received += 1;
                    report.records_inserted += batch.len() as u64;
                    let names = batch.into_records().into_iter().map(|r| r.username).collect();
                    self.journal.push(self.worker, Event::Batch(names));
                }
                WorkerMessage::Shutdown => {
                    stopped = true;
                    self.journal.push(self.worker, Event::Shutdown);
                }
            }
        }
    }
}

/// Batch of users named after `names`.
pub(crate) fn batch(names: &[&str]) -> contracts::Batch {
    contracts::Batch::new(
        names
            .iter()
            .map(|n| contracts::UserRecord::new(*n, format!("{n}@example.com"), 30))
            .collect(),
    )
}
