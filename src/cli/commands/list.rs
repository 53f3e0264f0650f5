//! # List Command Module / 列表命令模块
//!
//! 打印套件已实现的测试树（包括矩阵展开后的变体）。

use anyhow::{Context, Result};
use colored::*;
use std::path::Path;

use crate::cli::commands::run::{build_root, load_suite};
use crate::core::models::ItemKind;
use crate::core::snapshot::{NodeId, Snapshot};
use crate::infra::t;

pub fn execute(suite_path: &Path, locale: &str) -> Result<()> {
    let suite_file = load_suite(suite_path)?;
    let root = build_root(&suite_file, suite_path)?;
    let snapshot = Snapshot::capture(&root).with_context(|| t!("suite_invalid", locale = locale))?;
    print_node(&snapshot, snapshot.root(), 0);
    println!(
        "\n{}",
        t!("variations_selected", locale = locale, count = snapshot.variations().count()).cyan()
    );
    Ok(())
}

fn print_node(snapshot: &Snapshot, id: NodeId, depth: usize) {
    let node = &snapshot[id];
    let label = format!("[{}] {}", node.metadata.id, node.metadata.name);
    let label = match node.kind {
        ItemKind::Module => label.bold(),
        ItemKind::Case => label.cyan(),
        ItemKind::Variation => label.normal(),
    };
    println!("{}{}", "  ".repeat(depth), label);
    for &child in snapshot.children(id) {
        print_node(snapshot, child, depth + 1);
    }
}
