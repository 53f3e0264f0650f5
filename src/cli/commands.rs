//! # CLI Commands Module / CLI 命令模块
//!
//! 此模块包含 `run` 和 `list` 子命令的实现。

pub mod list;
pub mod run;
