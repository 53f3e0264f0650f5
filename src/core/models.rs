//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures shared by the tree, the snapshot
//! and the execution engine: item metadata, results and their severity ordering,
//! bug annotations, parameter values and log levels.
//!
//! 此模块定义了测试树、快照和执行引擎共享的核心数据结构：
//! 测试项元数据、结果及其严重性排序、缺陷注解、参数值和日志级别。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default priority assigned to an item that does not declare one.
/// 未声明优先级的测试项的默认优先级。
pub const DEFAULT_PRIORITY: i32 = 2;

/// The three kinds of nodes in a test item tree.
/// 测试项树中的三种节点类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// The root suite of a run. / 一次运行的根套件。
    Module,
    /// A grouping container. / 分组容器。
    Case,
    /// An executable leaf. / 可执行的叶子节点。
    Variation,
}

impl ItemKind {
    pub fn is_container(self) -> bool {
        !matches!(self, ItemKind::Variation)
    }
}

/// Strategy used to expand a matrix into concrete combinations.
/// 将矩阵展开为具体组合时使用的策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationKind {
    /// Every pair of values across any two dimensions appears at least once.
    /// 任意两个维度的每一对取值至少出现一次。
    Pairwise,
    /// The full Cartesian product. / 完整的笛卡尔积。
    Exhaustive,
}

impl ExplorationKind {
    /// The coverage order handed to the explorer for `dimension_count` dimensions.
    pub fn order(self, dimension_count: usize) -> usize {
        match self {
            ExplorationKind::Pairwise => 2.min(dimension_count),
            ExplorationKind::Exhaustive => dimension_count,
        }
    }
}

/// Immutable description of a test item.
///
/// `skip_until` opens a skip window: before that instant the item is skipped,
/// after it the skip is stale and the item fails instead.
///
/// 测试项的不可变描述。
/// `skip_until` 定义了跳过窗口：在该时刻之前测试项被跳过，之后该跳过已过期，测试项将失败。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub skip_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub skip_reason: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl Metadata {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            owner: String::new(),
            priority: DEFAULT_PRIORITY,
            version: String::new(),
            skip_until: None,
            skip_reason: None,
            timeout_ms: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_skip(mut self, until: DateTime<Utc>, reason: impl Into<String>) -> Self {
        self.skip_until = Some(until);
        self.skip_reason = Some(reason.into());
        self
    }
}

/// Outcome of an item, ordered by ascending severity.
///
/// The derived `Ord` follows declaration order, so `max` always picks the
/// worse of two results.
///
/// 测试项的结果，按严重性升序排列。
/// 派生的 `Ord` 遵循声明顺序，因此 `max` 总是选择两个结果中更严重的那个。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TestResult {
    InProgress,
    Passed,
    Warning,
    Skipped,
    Failed,
    Timeout,
    Aborted,
}

impl TestResult {
    /// Whether this result is a final outcome.
    pub fn is_terminal(self) -> bool {
        self != TestResult::InProgress
    }

    /// Results that keep an item's pending descendants from running.
    /// 阻止测试项的待执行后代运行的结果。
    pub fn blocks_descendants(self) -> bool {
        self >= TestResult::Skipped
    }

    /// Results that count against the run.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            TestResult::Failed | TestResult::Timeout | TestResult::Aborted
        )
    }

    /// Key used to look up the localized status label.
    pub fn i18n_key(self) -> &'static str {
        match self {
            TestResult::InProgress => "status.in_progress",
            TestResult::Passed => "status.passed",
            TestResult::Warning => "status.warning",
            TestResult::Skipped => "status.skipped",
            TestResult::Failed => "status.failed",
            TestResult::Timeout => "status.timeout",
            TestResult::Aborted => "status.aborted",
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A bug reference carried down to the log when an item fails.
/// 当测试项失败时传递到日志中的缺陷引用。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bug {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

impl Bug {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
        }
    }
}

impl fmt::Display for Bug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.id, self.title)
        }
    }
}

/// A concrete parameter value of a variation.
/// 变体的具体参数值。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

/// Severity of a free-text log line.
/// 自由文本日志行的严重级别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Info,
    Warning,
    Error,
}

/// Failure detail recorded alongside a non-passing result.
/// 与未通过结果一同记录的失败详情。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub message: String,
    #[serde(default)]
    pub bugs: Vec<Bug>,
}

impl FailureInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            bugs: Vec::new(),
        }
    }
}

impl fmt::Display for FailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.bugs.is_empty() {
            let bugs: Vec<String> = self.bugs.iter().map(Bug::to_string).collect();
            write!(f, " [bugs: {}]", bugs.join(", "))?;
        }
        Ok(())
    }
}
