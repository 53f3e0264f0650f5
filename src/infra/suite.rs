//! # Suite Provider Module / 套件提供者模块
//!
//! Turns a parsed TOML suite into a [`Definition`] tree whose lifecycle bodies
//! are [`CommandBody`] instances, and builds the root [`TestItem`] from it.
//!
//! 将解析后的 TOML 套件转换为 [`Definition`] 树（生命周期函数为 [`CommandBody`]），
//! 并据此构建根 [`TestItem`]。

use std::path::Path;
use std::sync::Arc;

use crate::core::config::{ItemSpec, SuiteFile};
use crate::core::definition::{DeclaredProvider, Definition};
use crate::core::error::ConfigError;
use crate::core::explorer::CombinatorialExplorer;
use crate::core::matrix::Matrix;
use crate::core::models::ItemKind;
use crate::core::tree::TestItem;
use crate::infra::command::CommandBody;

/// Converts the `[module]` table of a suite into a definition tree.
///
/// # Arguments
/// * `spec` - The module table
/// * `working_dir` - Directory commands run in, usually the suite file's directory
///
/// # Errors
/// Returns [`ConfigError::InvalidSuite`] for variations with children, matrices
/// on containers, and dimension values that do not fit their declared type.
pub fn build_module(spec: &ItemSpec, working_dir: Option<&Path>) -> Result<Definition, ConfigError> {
    build(spec, ItemKind::Module, working_dir)
}

fn build(spec: &ItemSpec, kind: ItemKind, working_dir: Option<&Path>) -> Result<Definition, ConfigError> {
    if kind == ItemKind::Variation && (!spec.cases.is_empty() || !spec.variations.is_empty()) {
        return Err(ConfigError::InvalidSuite(format!(
            "variation '{}' cannot contain cases or variations",
            spec.name
        )));
    }
    if kind.is_container() && spec.matrix.is_some() {
        return Err(ConfigError::InvalidSuite(format!(
            "only variations may declare a matrix, found one on '{}'",
            spec.name
        )));
    }

    let metadata = spec.metadata();
    let mut definition = match kind {
        ItemKind::Module => Definition::module(metadata),
        ItemKind::Case => Definition::case(metadata),
        ItemKind::Variation => Definition::variation(metadata),
    };

    let mut body = CommandBody {
        init: spec.init.clone(),
        execute: spec.command.clone(),
        terminate: spec.terminate.clone(),
        working_dir: None,
    };
    if let Some(dir) = working_dir {
        body = body.with_working_dir(dir);
    }
    definition = definition.with_body(body);

    for bug in spec.bug_refs() {
        definition = definition.with_bug(bug);
    }
    for (name, value) in &spec.params {
        definition = definition.with_param(name.clone(), value.clone());
    }
    if let Some(kind) = spec.exploration {
        definition = definition.with_exploration(kind);
    }
    if let Some(matrix_spec) = &spec.matrix {
        let mut matrix = Matrix::new(matrix_spec.kind).with_base_id(matrix_spec.base_id);
        for dimension in &matrix_spec.dimensions {
            matrix = matrix.with_dimension(dimension.to_dimension()?);
        }
        definition = definition.with_matrix(matrix);
    }

    for case in &spec.cases {
        definition = definition.with_child(build(case, ItemKind::Case, working_dir)?);
    }
    for variation in &spec.variations {
        definition = definition.with_child(build(variation, ItemKind::Variation, working_dir)?);
    }
    Ok(definition)
}

/// Builds the root item of a loaded suite, wired to the declared children and
/// the default explorer.
pub fn build_tree(suite: &SuiteFile, working_dir: Option<&Path>) -> Result<Arc<TestItem>, ConfigError> {
    let module = build_module(&suite.module, working_dir)?;
    Ok(TestItem::module(
        module,
        suite.engine.exploration_seed,
        Arc::new(DeclaredProvider),
        Arc::new(CombinatorialExplorer),
    ))
}
