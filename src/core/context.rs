//! # Test Context Module / 测试上下文模块
//!
//! The handle a lifecycle body receives: its metadata, its parameters, the run
//! parameters and a logging side-channel back to the engine task.
//!
//! 生命周期函数接收到的句柄：元数据、参数、运行参数以及回到引擎任务的日志旁路通道。

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::definition::Param;
use crate::core::execution::LogSink;
use crate::core::models::{LogLevel, Metadata, ParamValue};

/// Run-wide parameters handed to `ExecutionEngine::run`.
pub type RunParameters = BTreeMap<String, String>;

#[derive(Clone)]
pub struct TestContext {
    metadata: Arc<Metadata>,
    path: Arc<str>,
    params: Arc<[Param]>,
    parameters: Arc<RunParameters>,
    sink: Option<LogSink>,
}

impl TestContext {
    pub(crate) fn new(
        metadata: Metadata,
        path: String,
        params: Vec<Param>,
        parameters: Arc<RunParameters>,
        sink: Option<LogSink>,
    ) -> Self {
        Self {
            metadata: Arc::new(metadata),
            path: path.into(),
            params: params.into(),
            parameters,
            sink,
        }
    }

    /// A context that is not attached to any run. Log lines are dropped.
    /// 不附属于任何运行的上下文。日志行将被丢弃。
    pub fn detached(metadata: Metadata, params: Vec<Param>) -> Self {
        let path = metadata.name.clone();
        Self::new(metadata, path, params, Arc::new(RunParameters::new()), None)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Slash-separated names from the module down to this item.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Positional parameter, in dimension declaration order.
    pub fn param(&self, index: usize) -> Option<&ParamValue> {
        self.params.get(index).map(|p| &p.value)
    }

    pub fn param_named(&self, name: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| &p.value)
    }

    pub fn parameters(&self) -> &RunParameters {
        &self.parameters
    }

    /// A run parameter passed to `ExecutionEngine::run`.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn log(&self, level: LogLevel, text: impl Into<String>) {
        if let Some(sink) = &self.sink {
            sink.write_line(level, text.into());
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.log(LogLevel::Info, text);
    }

    /// Logs a warning. During execution this raises a passing result to `Warning`.
    /// 记录警告。在执行阶段，这会把通过的结果提升为 `Warning`。
    pub fn warn(&self, text: impl Into<String>) {
        self.log(LogLevel::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.log(LogLevel::Error, text);
    }
}
