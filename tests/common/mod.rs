// Shared test helpers for integration tests
#![allow(dead_code)]

use matrix_harness::core::definition::{DeclaredProvider, Definition, FnBody};
use matrix_harness::core::error::TestError;
use matrix_harness::core::execution::RunEvent;
use matrix_harness::core::explorer::CombinatorialExplorer;
use matrix_harness::core::models::{FailureInfo, LogLevel, Metadata, TestResult};
use matrix_harness::core::snapshot::{NodeId, Snapshot};
use matrix_harness::core::stats::RunStatistics;
use matrix_harness::core::tree::TestItem;
use matrix_harness::reporting::log_writer::{ItemInfo, LogWriter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A log writer that records every call as a line of text.
#[derive(Clone, Default)]
pub struct RecordingLogWriter {
    pub entries: Arc<Mutex<Vec<String>>>,
}

impl RecordingLogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }
}

impl LogWriter for RecordingLogWriter {
    fn begin_suite(&mut self, name: &str) {
        self.push(format!("begin_suite:{}", name));
    }

    fn end_suite(&mut self, statistics: &RunStatistics) {
        self.push(format!("end_suite:{}", statistics.global.total()));
    }

    fn begin_module(&mut self, item: &ItemInfo<'_>) {
        self.push(format!("begin:{}", item.metadata.name));
    }

    fn begin_case(&mut self, item: &ItemInfo<'_>) {
        self.push(format!("begin:{}", item.metadata.name));
    }

    fn begin_variation(&mut self, item: &ItemInfo<'_>) {
        self.push(format!("begin:{}", item.metadata.name));
    }

    fn end_module(&mut self, item: &ItemInfo<'_>, result: TestResult, _failure: Option<&FailureInfo>) {
        self.push(format!("end:{}:{}", item.metadata.name, result));
    }

    fn end_case(&mut self, item: &ItemInfo<'_>, result: TestResult, _failure: Option<&FailureInfo>) {
        self.push(format!("end:{}:{}", item.metadata.name, result));
    }

    fn end_variation(
        &mut self,
        item: &ItemInfo<'_>,
        result: TestResult,
        failure: Option<&FailureInfo>,
    ) {
        let message = failure.map(|f| f.message.as_str()).unwrap_or("");
        self.push(format!("end:{}:{}:{}", item.metadata.name, result, message));
    }

    fn write_line(&mut self, level: LogLevel, text: &str) {
        self.push(format!("line:{:?}:{}", level, text));
    }
}

/// Builds the root item with the declared provider and the default explorer.
pub fn build_tree(module: Definition, seed: u64) -> Arc<TestItem> {
    TestItem::module(
        module,
        seed,
        Arc::new(DeclaredProvider),
        Arc::new(CombinatorialExplorer),
    )
}

/// Builds the root item and captures its snapshot.
pub fn tree_and_snapshot(module: Definition) -> (Arc<TestItem>, Arc<Snapshot>) {
    let root = build_tree(module, 0);
    let snapshot = Snapshot::capture(&root).expect("tree should realize");
    (root, Arc::new(snapshot))
}

pub fn module(name: &str) -> Definition {
    Definition::module(Metadata::new(1, name))
}

pub fn case(id: i64, name: &str) -> Definition {
    Definition::case(Metadata::new(id, name))
}

pub fn variation(id: i64, name: &str) -> Definition {
    Definition::variation(Metadata::new(id, name))
}

/// A body whose execute operation fails with `message`.
pub fn failing(message: &'static str) -> FnBody {
    FnBody::new().on_execute(move |_ctx| async move { Err(TestError::failed(message)) })
}

/// A body that counts how often each operation ran.
pub fn counting(counter: Arc<AtomicUsize>) -> FnBody {
    let (a, b, c) = (counter.clone(), counter.clone(), counter);
    FnBody::new()
        .on_init(move |_ctx| {
            a.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .on_execute(move |_ctx| {
            b.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .on_terminate(move |_ctx| {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
}

/// Node ids of every `TestItemCompleted` event, in order, with their results.
pub fn completions(events: &[RunEvent]) -> Vec<(NodeId, TestResult)> {
    events
        .iter()
        .filter_map(|event| match event {
            RunEvent::TestItemCompleted { node, result, .. } => Some((*node, *result)),
            _ => None,
        })
        .collect()
}

pub fn starts(events: &[RunEvent]) -> Vec<NodeId> {
    events
        .iter()
        .filter_map(|event| match event {
            RunEvent::TestItemStarting { node, .. } => Some(*node),
            _ => None,
        })
        .collect()
}

pub fn failure_of(events: &[RunEvent], id: NodeId) -> Option<FailureInfo> {
    events.iter().find_map(|event| match event {
        RunEvent::TestItemCompleted { node, failure, .. } if *node == id => failure.clone(),
        _ => None,
    })
}
