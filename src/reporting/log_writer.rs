//! # Log Writer Module / 日志写入器模块
//!
//! The engine reports item boundaries and free-text lines through the
//! [`LogWriter`] trait. Begin/end calls nest with the execution stack: a
//! child's begin and end are always contained within its parent's.
//!
//! 引擎通过 [`LogWriter`] trait 报告测试项边界和自由文本行。
//! begin/end 调用与执行栈嵌套一致：子项的 begin 和 end 总是包含在父项的 begin 和 end 之间。

use crate::core::models::{FailureInfo, ItemKind, LogLevel, Metadata, TestResult};
use crate::core::snapshot::NodeId;
use crate::core::stats::RunStatistics;

/// Identity of the item a log call refers to.
#[derive(Debug, Clone, Copy)]
pub struct ItemInfo<'a> {
    pub node: NodeId,
    pub kind: ItemKind,
    pub metadata: &'a Metadata,
    pub path: &'a str,
    /// Depth in the tree; the module is at depth 0.
    pub depth: usize,
}

/// Receives begin/end notifications and log lines from the engine.
///
/// Every method has an empty default so writers only implement what they use.
/// All calls happen on the engine task, never on the worker thread.
///
/// 接收引擎发出的 begin/end 通知和日志行。
/// 每个方法都有空的默认实现，写入器只需实现所需的方法。所有调用都发生在引擎任务上，而不是工作线程上。
pub trait LogWriter: Send {
    fn begin_suite(&mut self, _name: &str) {}

    fn end_suite(&mut self, _statistics: &RunStatistics) {}

    fn begin_module(&mut self, _item: &ItemInfo<'_>) {}

    fn begin_case(&mut self, _item: &ItemInfo<'_>) {}

    fn begin_variation(&mut self, _item: &ItemInfo<'_>) {}

    fn end_module(
        &mut self,
        _item: &ItemInfo<'_>,
        _result: TestResult,
        _failure: Option<&FailureInfo>,
    ) {
    }

    fn end_case(&mut self, _item: &ItemInfo<'_>, _result: TestResult, _failure: Option<&FailureInfo>) {
    }

    fn end_variation(
        &mut self,
        _item: &ItemInfo<'_>,
        _result: TestResult,
        _failure: Option<&FailureInfo>,
    ) {
    }

    fn write_line(&mut self, _level: LogLevel, _text: &str) {}
}

/// Dispatches to the begin method matching the item's kind.
pub fn begin_item(writer: &mut dyn LogWriter, item: &ItemInfo<'_>) {
    match item.kind {
        ItemKind::Module => writer.begin_module(item),
        ItemKind::Case => writer.begin_case(item),
        ItemKind::Variation => writer.begin_variation(item),
    }
}

/// Dispatches to the end method matching the item's kind.
pub fn end_item(
    writer: &mut dyn LogWriter,
    item: &ItemInfo<'_>,
    result: TestResult,
    failure: Option<&FailureInfo>,
) {
    match item.kind {
        ItemKind::Module => writer.end_module(item, result, failure),
        ItemKind::Case => writer.end_case(item, result, failure),
        ItemKind::Variation => writer.end_variation(item, result, failure),
    }
}

/// A writer that forwards every call to several writers in order.
#[derive(Default)]
pub struct CompositeLogWriter {
    writers: Vec<Box<dyn LogWriter>>,
}

impl CompositeLogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, writer: impl LogWriter + 'static) -> Self {
        self.writers.push(Box::new(writer));
        self
    }

    pub fn push(&mut self, writer: Box<dyn LogWriter>) {
        self.writers.push(writer);
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl LogWriter for CompositeLogWriter {
    fn begin_suite(&mut self, name: &str) {
        self.writers.iter_mut().for_each(|w| w.begin_suite(name));
    }

    fn end_suite(&mut self, statistics: &RunStatistics) {
        self.writers.iter_mut().for_each(|w| w.end_suite(statistics));
    }

    fn begin_module(&mut self, item: &ItemInfo<'_>) {
        self.writers.iter_mut().for_each(|w| w.begin_module(item));
    }

    fn begin_case(&mut self, item: &ItemInfo<'_>) {
        self.writers.iter_mut().for_each(|w| w.begin_case(item));
    }

    fn begin_variation(&mut self, item: &ItemInfo<'_>) {
        self.writers.iter_mut().for_each(|w| w.begin_variation(item));
    }

    fn end_module(&mut self, item: &ItemInfo<'_>, result: TestResult, failure: Option<&FailureInfo>) {
        self.writers
            .iter_mut()
            .for_each(|w| w.end_module(item, result, failure));
    }

    fn end_case(&mut self, item: &ItemInfo<'_>, result: TestResult, failure: Option<&FailureInfo>) {
        self.writers
            .iter_mut()
            .for_each(|w| w.end_case(item, result, failure));
    }

    fn end_variation(
        &mut self,
        item: &ItemInfo<'_>,
        result: TestResult,
        failure: Option<&FailureInfo>,
    ) {
        self.writers
            .iter_mut()
            .for_each(|w| w.end_variation(item, result, failure));
    }

    fn write_line(&mut self, level: LogLevel, text: &str) {
        self.writers.iter_mut().for_each(|w| w.write_line(level, text));
    }
}
