//! # Configuration Module / 配置模块
//!
//! Engine settings and the declarative TOML suite format read by the CLI.
//! A suite file holds an optional `[engine]` table and one `[module]` table
//! whose `cases` and `variations` nest freely.
//!
//! 引擎设置以及 CLI 读取的声明式 TOML 套件格式。
//! 套件文件包含一个可选的 `[engine]` 表和一个 `[module]` 表，其中的 `cases` 与 `variations` 可以自由嵌套。

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::core::error::ConfigError;
use crate::core::matrix::{Dimension, Domain};
use crate::core::models::{Bug, ExplorationKind, Metadata, ParamValue, DEFAULT_PRIORITY};

/// Settings of the execution engine.
/// 执行引擎的设置。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// The language for console messages (e.g., "en", "zh-CN").
    /// 控制台消息使用的语言（例如 "en", "zh-CN"）。
    pub language: String,
    /// Seed inherited by every matrix of the tree.
    /// 测试树中所有矩阵继承的种子。
    pub exploration_seed: u64,
    /// Timeout applied to variations whose metadata declares none.
    /// 应用于未在元数据中声明超时的变体的超时时间。
    pub default_timeout_ms: Option<u64>,
    /// Name given to the dedicated worker thread.
    /// 专用工作线程的名称。
    pub worker_thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            exploration_seed: 0,
            default_timeout_ms: None,
            worker_thread_name: "matrix-harness-worker".to_string(),
        }
    }
}

impl EngineConfig {
    /// The effective timeout of a variation, if any. Zero means none.
    pub fn timeout_for(&self, metadata: &Metadata) -> Option<Duration> {
        metadata
            .timeout_ms
            .or(self.default_timeout_ms)
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }
}

/// Loads an [`EngineConfig`] from a TOML file.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read engine config: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse engine config: {}", path.display()))
}

/// A declarative suite file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SuiteFile {
    #[serde(default)]
    pub engine: EngineConfig,
    pub module: ItemSpec,
}

/// One module, case or variation in a suite file.
/// 套件文件中的一个模块、用例或变体。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ItemSpec {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub skip_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub skip_reason: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub bugs: Vec<String>,
    /// Shell command run during initialization.
    #[serde(default)]
    pub init: Option<String>,
    /// Shell command run as the variation body.
    #[serde(default)]
    pub command: Option<String>,
    /// Shell command run during termination.
    #[serde(default)]
    pub terminate: Option<String>,
    #[serde(default)]
    pub exploration: Option<ExplorationKind>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub matrix: Option<MatrixSpec>,
    #[serde(default)]
    pub cases: Vec<ItemSpec>,
    #[serde(default)]
    pub variations: Vec<ItemSpec>,
}

impl ItemSpec {
    pub fn metadata(&self) -> Metadata {
        Metadata {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            owner: self.owner.clone(),
            priority: self.priority.unwrap_or(DEFAULT_PRIORITY),
            version: self.version.clone(),
            skip_until: self.skip_until,
            skip_reason: self.skip_reason.clone(),
            timeout_ms: self.timeout_ms,
        }
    }

    pub fn bug_refs(&self) -> Vec<Bug> {
        self.bugs.iter().map(Bug::new).collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatrixSpec {
    #[serde(default = "default_exploration")]
    pub kind: ExplorationKind,
    #[serde(default)]
    pub base_id: i64,
    pub dimensions: Vec<DimensionSpec>,
}

fn default_exploration() -> ExplorationKind {
    ExplorationKind::Pairwise
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionType {
    #[default]
    String,
    Int,
    Bool,
    Enum,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DimensionSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: DimensionType,
    #[serde(default)]
    pub values: Vec<ParamValue>,
    #[serde(default)]
    pub variants: Vec<String>,
}

impl DimensionSpec {
    /// Converts the declaration into a [`Dimension`], checking value types.
    pub fn to_dimension(&self) -> Result<Dimension, ConfigError> {
        let type_ok = |v: &ParamValue| match (self.ty, v) {
            (DimensionType::Int, ParamValue::Int(_)) => true,
            (DimensionType::Bool, ParamValue::Bool(_)) => true,
            (DimensionType::String, ParamValue::Str(_)) => true,
            (DimensionType::Enum, ParamValue::Str(s)) => self.variants.contains(s),
            _ => false,
        };
        if let Some(bad) = self.values.iter().find(|v| !type_ok(v)) {
            return Err(ConfigError::InvalidSuite(format!(
                "value '{}' does not fit dimension '{}' of type {:?}",
                bad, self.name, self.ty
            )));
        }
        let domain = match self.ty {
            DimensionType::Bool => Domain::Bool,
            DimensionType::Enum => Domain::Enum(self.variants.clone()),
            DimensionType::Int | DimensionType::String => Domain::Open,
        };
        Ok(Dimension {
            name: self.name.clone(),
            domain,
            values: self.values.clone(),
        })
    }
}

/// Loads and parses a suite file.
pub fn load_suite(path: &Path) -> Result<SuiteFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read suite file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse suite file: {}", path.display()))
}
