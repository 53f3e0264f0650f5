//! # Core Module / 核心模块
//!
//! Data models, test definitions, matrix expansion, the lazily realized test
//! item tree, its snapshot projection, statistics, configuration and the
//! execution engine.
//!
//! 数据模型、测试定义、矩阵展开、延迟实现的测试项树及其快照投影、统计、配置和执行引擎。

pub mod clock;
pub mod config;
pub mod context;
pub mod definition;
pub mod error;
pub mod execution;
pub mod explorer;
pub mod matrix;
pub mod models;
pub mod snapshot;
pub mod stats;
pub mod tree;

// Re-exports
pub use context::TestContext;
pub use definition::{Definition, DefinitionProvider, FnBody, TestBody};
pub use error::{ConfigError, EngineError, TestError};
pub use execution::{ExecutionEngine, RunEvent, RunReport, Selection};
pub use models::TestResult;
pub use snapshot::{NodeId, Snapshot};
pub use tree::TestItem;
