//! # Matrix Harness Library / Matrix Harness 库
//!
//! A hierarchical test harness. Test suites are trees of modules, cases and
//! variations; variations may be generated from parameter matrices. The
//! execution engine drives the tree on a dedicated worker thread with
//! per-variation timeouts, abort and aggregated statistics.
//!
//! 分层测试框架。测试套件是由模块、用例和变体组成的树；变体可以由参数矩阵生成。
//! 执行引擎在专用工作线程上驱动测试树，支持按变体超时、中止以及聚合统计。
//!
//! ## Modules / 模块
//!
//! - `core` - Definitions, matrix expansion, the test item tree, snapshot and execution engine
//! - `infra` - Worker thread, shell-command bodies, suite provider and i18n
//! - `reporting` - Log writers and the console summary
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 定义、矩阵展开、测试项树、快照和执行引擎
//! - `infra` - 工作线程、Shell 命令函数、套件提供者和国际化
//! - `reporting` - 日志写入器和控制台摘要
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::execution;
pub use core::models;

/// Initializes the application's internationalization (i18n) based on the system locale.
///
/// This function detects the user's system locale and sets the appropriate
/// language for the application's user interface. It attempts to match the full
/// locale (e.g., "zh-CN"), then just the language code (e.g., "en"), and
/// finally falls back to the default language ("en").
pub fn init() {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    rust_i18n::set_locale(resolve_locale(&locale));
}

/// Maps a requested locale onto one the crate ships translations for.
/// 将请求的语言区域映射到本 crate 提供翻译的语言区域。
pub fn resolve_locale(requested: &str) -> &str {
    let available_locales = rust_i18n::available_locales!();
    if available_locales.contains(&requested) {
        return requested;
    }
    requested
        .split(['-', '_'])
        .next()
        .filter(|lang_code| available_locales.contains(lang_code))
        .unwrap_or("en")
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
