use criterion::{Criterion, criterion_group, criterion_main};
use matrix_harness::core::definition::{DeclaredProvider, Definition};
use matrix_harness::core::explorer::CombinatorialExplorer;
use matrix_harness::core::matrix::{Dimension, Matrix};
use matrix_harness::core::models::{ExplorationKind, Metadata};
use matrix_harness::core::snapshot::Snapshot;
use matrix_harness::core::tree::TestItem;
use std::hint::black_box;
use std::sync::Arc;

fn suite(kind: ExplorationKind) -> Definition {
    let values: Vec<i64> = (0..4).collect();
    let matrix = Matrix::new(kind)
        .with_dimension(Dimension::new("a", values.clone()))
        .with_dimension(Dimension::new("b", values.clone()))
        .with_dimension(Dimension::new("c", values.clone()))
        .with_dimension(Dimension::new("d", values))
        .with_dimension(Dimension::boolean("flag"));
    Definition::module(Metadata::new(1, "Bench")).with_child(
        Definition::case(Metadata::new(1, "Case"))
            .with_child(Definition::variation(Metadata::new(1, "V")).with_matrix(matrix)),
    )
}

fn realize(definition: Definition) -> usize {
    let root = TestItem::module(
        definition,
        17,
        Arc::new(DeclaredProvider),
        Arc::new(CombinatorialExplorer),
    );
    Snapshot::capture(&root).map(|s| s.len()).unwrap_or(0)
}

fn bench_expansion(c: &mut Criterion) {
    c.bench_function("expand_pairwise", |b| {
        b.iter(|| realize(black_box(suite(ExplorationKind::Pairwise))));
    });
    c.bench_function("expand_exhaustive", |b| {
        b.iter(|| realize(black_box(suite(ExplorationKind::Exhaustive))));
    });
}

criterion_group!(benches, bench_expansion);
criterion_main!(benches);
