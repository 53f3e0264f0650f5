//! # Error Types Module / 错误类型模块
//!
//! Configuration errors are programmer errors in test definitions and surface
//! synchronously while the tree is built. Test errors are what lifecycle bodies
//! return and become result data inside the engine. Engine errors are defects.
//!
//! 配置错误是测试定义中的编程错误，在构建测试树时同步抛出。
//! 测试错误由生命周期函数返回，在引擎内部转换为结果数据。引擎错误表示缺陷。

use thiserror::Error;

/// Fatal configuration errors raised during tree construction.
/// 测试树构建期间抛出的致命配置错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("matrix of '{definition}' declares no values for open dimension '{dimension}'")]
    EmptyDimension {
        definition: String,
        dimension: String,
    },
    #[error("constraint parameter '{parameter}' of '{definition}' matches no dimension")]
    UnboundConstraint {
        definition: String,
        parameter: String,
    },
    #[error("dimension name '{name}' of '{definition}' is ambiguous after normalization")]
    AmbiguousDimension { definition: String, name: String },
    #[error("combination callback of '{definition}' vetoed a pairwise combination")]
    PairwiseVeto { definition: String },
    #[error("filter of '{item}' cannot change after its children were realized")]
    FilterFrozen { item: String },
    #[error("definition provider failed for '{item}': {message}")]
    Provider { item: String, message: String },
    #[error("invalid suite definition: {0}")]
    InvalidSuite(String),
    #[error("snapshot node {node} is malformed: {reason}")]
    InvalidSnapshot { node: usize, reason: String },
}

/// Error signalled by a lifecycle body.
/// 生命周期函数发出的错误信号。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestError {
    #[error("{0}")]
    Failed(String),
    #[error("skipped: {0}")]
    Skipped(String),
}

impl TestError {
    pub fn failed(message: impl Into<String>) -> Self {
        TestError::Failed(message.into())
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        TestError::Skipped(reason.into())
    }
}

impl From<anyhow::Error> for TestError {
    fn from(err: anyhow::Error) -> Self {
        TestError::Failed(format!("{:#}", err))
    }
}

impl From<std::io::Error> for TestError {
    fn from(err: std::io::Error) -> Self {
        TestError::Failed(err.to_string())
    }
}

/// Infrastructure defects of the engine itself.
/// 引擎自身的基础设施缺陷。
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("the execution engine must be started from within a tokio runtime")]
    NoRuntime,
    #[error("failed to start the worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
    #[error("the worker thread panicked")]
    WorkerPanicked,
    #[error("the engine task stopped unexpectedly: {0}")]
    DriverPanicked(String),
    #[error("test tree and snapshot are out of sync at '{path}'")]
    Desynchronized { path: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}
