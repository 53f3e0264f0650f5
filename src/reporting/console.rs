//! # Console Reporting Module / 控制台报告模块
//!
//! This module prints run progress and the final summary to the console,
//! using colors and localized messages.
//!
//! 此模块在控制台打印运行进度和最终摘要，使用彩色输出和本地化消息。

use colored::*;

use crate::core::models::{FailureInfo, LogLevel, TestResult};
use crate::core::stats::{Counters, RunStatistics};
use crate::infra::t;
use crate::reporting::log_writer::{ItemInfo, LogWriter};

/// Localized, colored status label of a result.
/// 结果的本地化彩色状态标签。
pub fn status_label(result: TestResult, locale: &str) -> ColoredString {
    let label = t!(result.i18n_key(), locale = locale).to_string();
    match result {
        TestResult::InProgress => label.normal(),
        TestResult::Passed => label.green(),
        TestResult::Warning => label.yellow(),
        TestResult::Skipped => label.dimmed(),
        TestResult::Failed | TestResult::Timeout => label.red(),
        TestResult::Aborted => label.red().bold(),
    }
}

/// Prints every begin/end notification and log line as an indented tree.
/// 以缩进树的形式打印每个 begin/end 通知和日志行。
pub struct ConsoleLogWriter {
    locale: String,
    depth: usize,
    /// Suppress free-text lines below this level.
    min_level: LogLevel,
}

impl ConsoleLogWriter {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            depth: 0,
            min_level: LogLevel::Info,
        }
    }

    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    fn indent(&self) -> String {
        "  ".repeat(self.depth)
    }

    fn begin(&mut self, item: &ItemInfo<'_>, label: &str) {
        self.depth = item.depth;
        println!(
            "{}{} {}",
            self.indent(),
            label.cyan(),
            item.metadata.name.bold()
        );
        self.depth = item.depth + 1;
    }

    fn end(&mut self, item: &ItemInfo<'_>, result: TestResult, failure: Option<&FailureInfo>) {
        self.depth = item.depth;
        let indent = self.indent();
        println!(
            "{}{:<10} {}",
            indent,
            status_label(result, &self.locale),
            item.metadata.name
        );
        if let Some(failure) = failure {
            println!("{}  {}", indent, failure.message.red());
            for bug in &failure.bugs {
                println!(
                    "{}  {}",
                    indent,
                    t!("log.known_bug", locale = &self.locale, bug = bug.to_string()).yellow()
                );
            }
        }
    }
}

impl LogWriter for ConsoleLogWriter {
    fn begin_suite(&mut self, name: &str) {
        println!(
            "\n{}",
            t!("log.suite_begin", locale = &self.locale, name = name).bold()
        );
    }

    fn end_suite(&mut self, statistics: &RunStatistics) {
        println!(
            "{}",
            t!(
                "log.suite_end",
                locale = &self.locale,
                total = statistics.global.total()
            )
            .bold()
        );
    }

    fn begin_module(&mut self, item: &ItemInfo<'_>) {
        let label = t!("log.module", locale = &self.locale).to_string();
        self.begin(item, &label);
    }

    fn begin_case(&mut self, item: &ItemInfo<'_>) {
        let label = t!("log.case", locale = &self.locale).to_string();
        self.begin(item, &label);
    }

    fn begin_variation(&mut self, item: &ItemInfo<'_>) {
        self.depth = item.depth + 1;
    }

    fn end_module(&mut self, item: &ItemInfo<'_>, result: TestResult, failure: Option<&FailureInfo>) {
        self.end(item, result, failure);
    }

    fn end_case(&mut self, item: &ItemInfo<'_>, result: TestResult, failure: Option<&FailureInfo>) {
        self.end(item, result, failure);
    }

    fn end_variation(
        &mut self,
        item: &ItemInfo<'_>,
        result: TestResult,
        failure: Option<&FailureInfo>,
    ) {
        self.end(item, result, failure);
    }

    fn write_line(&mut self, level: LogLevel, text: &str) {
        if level < self.min_level {
            return;
        }
        let indent = self.indent();
        match level {
            LogLevel::Trace => println!("{}{}", indent, text.dimmed()),
            LogLevel::Info => println!("{}{}", indent, text),
            LogLevel::Warning => println!("{}{}", indent, text.yellow()),
            LogLevel::Error => println!("{}{}", indent, text.red()),
        }
    }
}

fn print_counters(label: &str, counters: &Counters) {
    println!(
        "  - {:<12} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6}",
        label,
        counters.total(),
        counters.passed.to_string().green(),
        counters.warned.to_string().yellow(),
        counters.skipped.to_string().dimmed(),
        counters.failed.to_string().red(),
        counters.timed_out.to_string().red(),
        counters.aborted.to_string().red(),
    );
}

/// Prints per-priority and global counters of a run.
///
/// 打印一次运行的按优先级统计和全局统计。
///
/// # Arguments / 参数
/// * `statistics` - Counters collected by the engine
///                  引擎收集的计数器
/// * `locale` - The language locale to use for messages
///              用于消息的语言区域设置
///
/// # Output Format / 输出格式
/// ```text
/// --- Test Summary ---
///   - Priority     |  Total | Passed | Warned | Skipped | Failed | Timeout | Aborted
///   - P1           |      4 |      3 |      0 |       0 |      1 |       0 |       0
///   - Total        |      4 |      3 |      0 |       0 |      1 |       0 |       0
/// ```
pub fn print_summary(statistics: &RunStatistics, locale: &str) {
    println!("\n{}", t!("summary.banner", locale = locale).bold());
    println!(
        "  - {:<12} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6}",
        t!("summary.priority", locale = locale),
        t!("summary.total", locale = locale),
        t!("status.passed", locale = locale),
        t!("status.warning", locale = locale),
        t!("status.skipped", locale = locale),
        t!("status.failed", locale = locale),
        t!("status.timeout", locale = locale),
        t!("status.aborted", locale = locale),
    );
    for (priority, counters) in &statistics.by_priority {
        print_counters(&format!("P{}", priority), counters);
    }
    print_counters(&t!("summary.total", locale = locale), &statistics.global);

    if statistics.has_failures() {
        println!(
            "\n{}",
            t!(
                "summary.failures",
                locale = locale,
                count = statistics.global.failures()
            )
            .red()
            .bold()
        );
    } else {
        println!("\n{}", t!("summary.all_passed", locale = locale).green().bold());
    }
}
