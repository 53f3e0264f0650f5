//! # Test Item Tree Unit Tests / 测试项树单元测试
//!
//! Lazy realization, memoization, filtering, ordering, bug inheritance and
//! matrix expansion as seen through the tree.
//!
//! 通过测试树检验延迟实现、记忆化、过滤、排序、缺陷继承以及矩阵展开。

mod common;

use common::*;
use matrix_harness::core::definition::{Definition, DefinitionProvider};
use matrix_harness::core::error::ConfigError;
use matrix_harness::core::explorer::CombinatorialExplorer;
use matrix_harness::core::matrix::{Constraint, Dimension, Matrix};
use matrix_harness::core::models::{Bug, ExplorationKind, ItemKind, Metadata, ParamValue};
use matrix_harness::core::tree::TestItem;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Declared children, counting how often the tree asks for them.
#[derive(Default)]
struct CountingProvider {
    requests: AtomicUsize,
    prepared: AtomicUsize,
}

impl DefinitionProvider for CountingProvider {
    fn child_definitions(&self, parent: &TestItem) -> Result<Vec<Definition>, ConfigError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(parent.definition().children.clone())
    }

    fn prepare(&self, _container: &TestItem) -> Result<(), ConfigError> {
        self.prepared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn names(items: &[Arc<TestItem>]) -> Vec<String> {
    items.iter().map(|i| i.name().to_string()).collect()
}

#[cfg(test)]
mod realization_tests {
    use super::*;

    #[test]
    fn test_children_are_computed_once() {
        let provider = Arc::new(CountingProvider::default());
        let root = TestItem::module(
            module("Suite").with_child(variation(1, "A")).with_child(variation(2, "B")),
            0,
            provider.clone(),
            Arc::new(CombinatorialExplorer),
        );

        assert!(!root.is_realized());
        let first = root.children().unwrap().as_ptr();
        let second = root.children().unwrap().as_ptr();

        assert!(root.is_realized());
        assert_eq!(first, second);
        assert_eq!(provider.requests.load(Ordering::SeqCst), 1);
        assert_eq!(provider.prepared.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_variations_have_no_children_and_skip_the_provider() {
        let provider = Arc::new(CountingProvider::default());
        let root = TestItem::module(
            module("Suite").with_child(variation(1, "Leaf")),
            0,
            provider.clone(),
            Arc::new(CombinatorialExplorer),
        );
        let leaf = root.children().unwrap()[0].clone();

        assert!(leaf.children().unwrap().is_empty());
        assert_eq!(provider.requests.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_children_sorted_by_id_then_description() {
        let root = build_tree(
            module("Suite")
                .with_child(variation(3, "C"))
                .with_child(Definition::variation(Metadata::new(1, "B").with_description("zeta")))
                .with_child(Definition::variation(Metadata::new(1, "A").with_description("alpha"))),
            0,
        );
        assert_eq!(names(root.children().unwrap()), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_parent_links_and_paths() {
        let root = build_tree(module("Suite").with_child(case(1, "Case").with_child(variation(1, "Leaf"))), 0);
        let case = root.children().unwrap()[0].clone();
        let leaf = case.children().unwrap()[0].clone();

        assert_eq!(leaf.kind(), ItemKind::Variation);
        assert_eq!(leaf.path(), "Suite/Case/Leaf");
        assert_eq!(leaf.parent().unwrap().name(), "Case");
        assert!(root.parent().is_none());
        let chain: Vec<String> = leaf.metadata_chain().into_iter().map(|m| m.name).collect();
        assert_eq!(chain, vec!["Suite", "Case", "Leaf"]);
    }

    #[test]
    fn test_bugs_accumulate_down_the_tree() {
        let root = build_tree(
            module("Suite").with_bug(Bug::new("M-1")).with_child(
                case(1, "Case")
                    .with_bug(Bug::new("C-1"))
                    .with_bug(Bug::new("M-1"))
                    .with_child(variation(1, "Leaf").with_bug(Bug::new("V-1"))),
            ),
            0,
        );
        let leaf = root.children().unwrap()[0].children().unwrap()[0].clone();
        let ids: Vec<&str> = leaf.bugs().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["M-1", "C-1", "V-1"]);
    }

    #[test]
    fn test_seed_and_exploration_kind_are_inherited() {
        let root = build_tree(
            module("Suite")
                .with_exploration(ExplorationKind::Exhaustive)
                .with_child(case(1, "Case").with_child(variation(1, "Leaf"))),
            42,
        );
        let leaf = root.children().unwrap()[0].children().unwrap()[0].clone();
        assert_eq!(leaf.exploration_seed(), 42);
        assert_eq!(leaf.exploration_kind(), Some(ExplorationKind::Exhaustive));
    }
}

#[cfg(test)]
mod filter_tests {
    use super::*;

    fn sample() -> Definition {
        module("Suite")
            .with_child(
                case(1, "Network")
                    .with_child(variation(1, "tcp"))
                    .with_child(variation(2, "udp")),
            )
            .with_child(case(2, "Storage").with_child(variation(1, "disk")))
    }

    #[test]
    fn test_filter_keeps_ancestors_of_matches() {
        let root = build_tree(sample(), 0);
        root.set_filter(Arc::new(|item: &TestItem| item.name() == "udp")).unwrap();

        let cases = root.children().unwrap();
        assert_eq!(names(cases), vec!["Network"]);
        assert_eq!(names(cases[0].children().unwrap()), vec!["udp"]);
    }

    #[test]
    fn test_filter_drops_empty_containers() {
        let root = build_tree(sample(), 0);
        root.set_filter(Arc::new(|item: &TestItem| item.name() == "nothing")).unwrap();
        assert!(root.children().unwrap().is_empty());
    }

    #[test]
    fn test_filter_cannot_change_after_realization() {
        let root = build_tree(sample(), 0);
        root.children().unwrap();
        let err = root
            .set_filter(Arc::new(|_item: &TestItem| true))
            .unwrap_err();
        assert!(matches!(err, ConfigError::FilterFrozen { .. }));
    }
}

#[cfg(test)]
mod matrix_expansion_tests {
    use super::*;

    fn matrix_tree(matrix: Matrix) -> Arc<TestItem> {
        build_tree(
            module("Suite").with_child(
                Definition::variation(Metadata::new(10, "Copy").with_description("file copy")).with_matrix(matrix),
            ),
            7,
        )
    }

    #[test]
    fn test_exhaustive_expansion_produces_full_product() {
        let root = matrix_tree(
            Matrix::exhaustive()
                .with_base_id(100)
                .with_dimension(Dimension::new("size", [1i64, 2]))
                .with_dimension(Dimension::boolean("sync")),
        );
        let children = root.children().unwrap();

        assert_eq!(children.len(), 4);
        let ids: Vec<i64> = children.iter().map(|c| c.metadata().id).collect();
        assert_eq!(ids, vec![100, 101, 102, 103]);
        assert!(children.iter().all(|c| c.is_variation()));
        assert!(children.iter().all(|c| c.definition().matrix.is_none()));
        assert_eq!(children[0].name(), "Copy - size=1 sync=false");
        assert_eq!(children[0].metadata().description, "file copy - size=1 sync=false");
        assert_eq!(children[0].definition().params[0].value, ParamValue::Int(1));
    }

    #[test]
    fn test_pairwise_covers_every_pair_with_fewer_vectors() {
        let values = ["a", "b", "c"];
        let root = matrix_tree(
            Matrix::pairwise()
                .with_dimension(Dimension::new("x", values))
                .with_dimension(Dimension::new("y", values))
                .with_dimension(Dimension::new("z", values)),
        );
        let children = root.children().unwrap();
        assert!(children.len() < 27);
        assert!(children.len() >= 9);

        let vectors: Vec<Vec<ParamValue>> = children
            .iter()
            .map(|c| c.definition().params.iter().map(|p| p.value.clone()).collect())
            .collect();
        for (i, j) in [(0, 1), (0, 2), (1, 2)] {
            let covered: HashSet<(ParamValue, ParamValue)> =
                vectors.iter().map(|v| (v[i].clone(), v[j].clone())).collect();
            assert_eq!(covered.len(), 9, "pair ({}, {}) not fully covered", i, j);
        }
    }

    #[test]
    fn test_expansion_is_deterministic_for_a_seed() {
        let build = || {
            matrix_tree(
                Matrix::pairwise()
                    .with_dimension(Dimension::new("a", [1i64, 2, 3]))
                    .with_dimension(Dimension::new("b", [1i64, 2, 3]))
                    .with_dimension(Dimension::new("c", [1i64, 2, 3])),
            )
        };
        let first = names(build().children().unwrap());
        let second = names(build().children().unwrap());
        assert_eq!(first, second);
    }

    #[test]
    fn test_constraints_exclude_combinations() {
        let root = matrix_tree(
            Matrix::exhaustive()
                .with_dimension(Dimension::new("Buffer-Size", [1i64, 2, 3]))
                .with_dimension(Dimension::boolean("compress"))
                .with_constraint(Constraint::new(["buffer_size", "COMPRESS"], |values| {
                    !(values[0] == &ParamValue::Int(1) && values[1] == &ParamValue::Bool(true))
                })),
        );
        let children = root.children().unwrap();
        assert_eq!(children.len(), 5);
        assert!(!names(children).contains(&"Copy - Buffer-Size=1 compress=true".to_string()));
    }

    #[test]
    fn test_unbound_constraint_is_a_configuration_error() {
        let root = matrix_tree(
            Matrix::exhaustive()
                .with_dimension(Dimension::new("size", [1i64]))
                .with_constraint(Constraint::new(["colour"], |_| true)),
        );
        assert!(matches!(
            root.children().unwrap_err(),
            ConfigError::UnboundConstraint { .. }
        ));
    }

    #[test]
    fn test_veto_is_fatal_only_under_pairwise() {
        let veto_odd = |definition: Definition, vector: &[ParamValue]| {
            if vector[0] == ParamValue::Int(1) { None } else { Some(definition) }
        };
        let exhaustive = matrix_tree(
            Matrix::exhaustive()
                .with_dimension(Dimension::new("n", [1i64, 2]))
                .with_combination(veto_odd),
        );
        assert_eq!(exhaustive.children().unwrap().len(), 1);

        let pairwise = matrix_tree(
            Matrix::pairwise()
                .with_dimension(Dimension::new("n", [1i64, 2]))
                .with_dimension(Dimension::new("m", [1i64, 2]))
                .with_dimension(Dimension::new("k", [1i64, 2]))
                .with_combination(veto_odd),
        );
        assert!(matches!(
            pairwise.children().unwrap_err(),
            ConfigError::PairwiseVeto { .. }
        ));
    }

    #[test]
    fn test_case_exploration_override_wins_over_matrix_kind() {
        let tree = module("Suite").with_child(
            case(1, "Case").with_exploration(ExplorationKind::Exhaustive).with_child(
                variation(1, "V").with_matrix(
                    Matrix::pairwise()
                        .with_dimension(Dimension::new("a", [1i64, 2, 3]))
                        .with_dimension(Dimension::new("b", [1i64, 2, 3]))
                        .with_dimension(Dimension::new("c", [1i64, 2, 3])),
                ),
            ),
        );
        let root = build_tree(tree, 0);
        let case = root.children().unwrap()[0].clone();
        assert_eq!(case.children().unwrap().len(), 27);
    }

    #[test]
    fn test_empty_open_dimension_is_a_configuration_error() {
        let root = matrix_tree(Matrix::exhaustive().with_dimension(Dimension::new("size", Vec::<i64>::new())));
        assert!(matches!(
            root.children().unwrap_err(),
            ConfigError::EmptyDimension { .. }
        ));
    }
}
