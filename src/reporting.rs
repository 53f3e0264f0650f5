//! # Reporting Module / 报告模块
//!
//! The log-writer seam the engine reports through, a colored console writer and
//! the end-of-run summary.
//!
//! 引擎用于报告的日志写入器接口、彩色控制台写入器以及运行结束时的摘要。

pub mod console;
pub mod log_writer;

// Re-export common reporting functions
pub use console::{ConsoleLogWriter, print_summary};
pub use log_writer::{CompositeLogWriter, ItemInfo, LogWriter};
