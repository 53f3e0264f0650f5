//! # Infrastructure Module / 基础设施模块
//!
//! The dedicated worker thread, shell-command lifecycle bodies, the TOML suite
//! provider and i18n support.
//!
//! 专用工作线程、Shell 命令生命周期函数、TOML 套件提供者以及国际化支持。

pub mod command;
pub mod suite;
pub(crate) mod worker;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
