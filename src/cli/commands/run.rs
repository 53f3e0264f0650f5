//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command, which loads a TOML suite, drives
//! it through the execution engine and prints the summary.
//!
//! 此模块实现了 `run` 命令：加载 TOML 套件，通过执行引擎运行并打印摘要。

use anyhow::{Context, Result};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;

use crate::{
    core::{
        config::{self, SuiteFile},
        context::RunParameters,
        execution::{ExecutionEngine, RunControl, Selection},
        snapshot::Snapshot,
        tree::{ItemFilter, TestItem},
    },
    infra::{suite, t},
    reporting::console::{ConsoleLogWriter, print_summary},
};

/// Arguments of the `run` command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub suite: PathBuf,
    pub seed: Option<u64>,
    pub filter: Option<String>,
    pub timeout_ms: Option<u64>,
    pub params: Vec<String>,
    /// Language given with `--lang`; the suite's `[engine]` language otherwise.
    pub language: Option<String>,
}

/// Executes the run command with the provided arguments.
///
/// # Returns
/// An error when the suite cannot be loaded or when any selected variation
/// failed, timed out or was aborted.
pub async fn execute(options: RunOptions) -> Result<()> {
    let mut suite_file = load_suite(&options.suite)?;
    if let Some(seed) = options.seed {
        suite_file.engine.exploration_seed = seed;
    }
    if let Some(timeout_ms) = options.timeout_ms {
        suite_file.engine.default_timeout_ms = Some(timeout_ms);
    }
    let locale = crate::resolve_locale(
        options
            .language
            .as_deref()
            .unwrap_or(&suite_file.engine.language),
    )
    .to_string();
    rust_i18n::set_locale(&locale);

    println!(
        "{}",
        t!("loading_suite", locale = &locale, path = options.suite.display())
    );
    let parameters = parse_parameters(&options.params, &locale)?;

    let root = build_root(&suite_file, &options.suite)?;
    if let Some(filter) = &options.filter {
        root.set_filter(path_filter(filter))?;
    }
    let snapshot = Snapshot::capture(&root).with_context(|| t!("suite_invalid", locale = &locale))?;

    let selected = snapshot.variations().count();
    if selected == 0 {
        println!("{}", t!("no_variations", locale = &locale).green());
        return Ok(());
    }
    println!(
        "{}",
        t!("variations_selected", locale = &locale, count = selected).cyan()
    );

    let engine = ExecutionEngine::new(suite_file.engine.clone());
    let handle = engine.run(
        root,
        Arc::new(snapshot),
        Box::new(ConsoleLogWriter::new(locale.clone())),
        Selection::All,
        parameters,
    )?;
    setup_signal_handler(handle.control(), &locale);

    let report = handle.wait().await?;
    print_summary(&report.statistics, &locale);

    if report.statistics.has_failures() {
        anyhow::bail!(t!("run_failed", locale = &locale).to_string());
    }
    Ok(())
}

pub(crate) fn load_suite(path: &Path) -> Result<SuiteFile> {
    config::load_suite(path)
        .with_context(|| t!("suite_read_failed", locale = "en", path = path.display()))
}

/// Builds the root item; commands run relative to the suite file's directory.
pub(crate) fn build_root(suite_file: &SuiteFile, suite_path: &Path) -> Result<Arc<TestItem>> {
    let working_dir = suite_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty());
    let root = suite::build_tree(suite_file, working_dir)?;
    Ok(root)
}

/// Keeps items whose path contains `text`, ignoring case.
fn path_filter(text: &str) -> ItemFilter {
    let needle = text.to_lowercase();
    Arc::new(move |item: &TestItem| item.path().to_lowercase().contains(&needle))
}

fn parse_parameters(raw: &[String], locale: &str) -> Result<RunParameters> {
    let mut parameters = RunParameters::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!(t!("param_invalid", locale = locale, param = entry).to_string()))?;
        parameters.insert(key.trim().to_string(), value.to_string());
    }
    Ok(parameters)
}

/// Aborts the run on Ctrl-C.
fn setup_signal_handler(control: RunControl, locale: &str) {
    let locale = locale.to_string();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            println!("\n{}", t!("shutdown_signal", locale = &locale).yellow());
            control.request_abort();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_split_on_first_equals_sign() {
        let raw = vec!["host=db=primary".to_string(), "port=5432".to_string()];
        let parameters = parse_parameters(&raw, "en").unwrap();
        assert_eq!(parameters.get("host").map(String::as_str), Some("db=primary"));
        assert_eq!(parameters.get("port").map(String::as_str), Some("5432"));
    }

    #[test]
    fn parameter_without_equals_sign_is_rejected() {
        let raw = vec!["verbose".to_string()];
        assert!(parse_parameters(&raw, "en").is_err());
    }
}
