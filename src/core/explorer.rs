//! # Matrix Explorer Module / 矩阵探索器模块
//!
//! The combination service consumed by matrix expansion. The tree only depends
//! on the [`MatrixExplorer`] trait; [`CombinatorialExplorer`] is the default
//! implementation shipped with the crate.
//!
//! 矩阵展开所使用的组合服务。测试树只依赖 [`MatrixExplorer`] trait；
//! [`CombinatorialExplorer`] 是本 crate 提供的默认实现。

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;

use crate::core::matrix::{CompiledConstraint, ExploredDimension};
use crate::core::models::ParamValue;

/// One concrete combination, positional in dimension declaration order.
pub type Vector = Vec<ParamValue>;

/// Generates value vectors for a set of dimensions.
///
/// `order` is the interaction strength to cover: 2 for pairwise, the number of
/// dimensions for exhaustive. Every returned vector must satisfy all
/// constraints.
pub trait MatrixExplorer: Send + Sync {
    fn explore(
        &self,
        dimensions: &[ExploredDimension],
        constraints: &[CompiledConstraint],
        order: usize,
        rng: &mut StdRng,
    ) -> Vec<Vector>;
}

/// Constrained Cartesian product at full order, a greedy t-wise cover below it.
///
/// Dimensions flagged `exhaustive` are fully crossed with the cover of the
/// remaining dimensions.
///
/// 带约束的笛卡尔积，对较低阶数使用贪心的 t 元组覆盖。
/// 标记为 `exhaustive` 的维度会与其余维度的覆盖结果完全交叉。
#[derive(Debug, Default, Clone, Copy)]
pub struct CombinatorialExplorer;

/// Candidate rows built per pick of the t-wise cover.
const CANDIDATES_PER_ROW: usize = 32;

impl MatrixExplorer for CombinatorialExplorer {
    fn explore(
        &self,
        dimensions: &[ExploredDimension],
        constraints: &[CompiledConstraint],
        order: usize,
        rng: &mut StdRng,
    ) -> Vec<Vector> {
        if dimensions.iter().any(|d| d.values.is_empty()) {
            return Vec::new();
        }
        let (open, closed): (Vec<usize>, Vec<usize>) =
            (0..dimensions.len()).partition(|&d| !dimensions[d].exhaustive);

        if order >= open.len() {
            let all: Vec<usize> = (0..dimensions.len()).collect();
            return product(dimensions, &all)
                .into_iter()
                .map(|indices| to_vector(dimensions, &indices))
                .filter(|vector| constraints.iter().all(|c| c.accepts(vector)))
                .collect();
        }

        let combos = combinations(&open, order.max(1));
        let mut vectors = Vec::new();
        for key in product(dimensions, &closed) {
            let mut base = vec![None; dimensions.len()];
            for (&d, &v) in closed.iter().zip(&key) {
                base[d] = Some(v);
            }
            if !closed.iter().all(|&d| admits(dimensions, constraints, &base, d)) {
                continue;
            }
            let cover = Cover::new(dimensions, constraints, &combos);
            vectors.extend(
                cover
                    .rows(&base, rng)
                    .iter()
                    .map(|indices| to_vector(dimensions, indices)),
            );
        }
        vectors
    }
}

fn to_vector(dimensions: &[ExploredDimension], indices: &[usize]) -> Vector {
    indices
        .iter()
        .zip(dimensions)
        .map(|(&i, dim)| dim.values[i].clone())
        .collect()
}

/// Index vectors over the dimensions in `dims`, last one varying fastest.
fn product(dimensions: &[ExploredDimension], dims: &[usize]) -> Vec<Vec<usize>> {
    if dims.iter().any(|&d| dimensions[d].values.is_empty()) {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut current = vec![0usize; dims.len()];
    loop {
        out.push(current.clone());
        let mut pos = dims.len();
        loop {
            if pos == 0 {
                return out;
            }
            pos -= 1;
            current[pos] += 1;
            if current[pos] < dimensions[dims[pos]].values.len() {
                break;
            }
            current[pos] = 0;
        }
    }
}

/// All `k`-element subsets of `items`, in lexicographic order.
fn combinations(items: &[usize], k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(k);
    fn walk(items: &[usize], k: usize, start: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        for i in start..items.len() {
            current.push(items[i]);
            walk(items, k, i + 1, current, out);
            current.pop();
        }
    }
    walk(items, k, 0, &mut current, &mut out);
    out
}

/// Checks the constraints that mention `dim` and whose dimensions are all
/// assigned in `partial`.
fn admits(
    dimensions: &[ExploredDimension],
    constraints: &[CompiledConstraint],
    partial: &[Option<usize>],
    dim: usize,
) -> bool {
    let mut vector: Option<Vector> = None;
    constraints
        .iter()
        .filter(|c| c.dimensions().contains(&dim))
        .filter(|c| c.dimensions().iter().all(|&d| partial[d].is_some()))
        .all(|c| {
            let vector = vector.get_or_insert_with(|| {
                partial
                    .iter()
                    .zip(dimensions)
                    .map(|(v, dim)| dim.values[v.unwrap_or(0)].clone())
                    .collect()
            });
            c.accepts(vector)
        })
}

type Tuple = (usize, Vec<usize>);

/// Greedy t-wise cover. Rows are grown one dimension at a time around an
/// uncovered tuple, so the full product is never enumerated. A tuple no
/// candidate row can carry under the constraints is dropped.
struct Cover<'a> {
    dimensions: &'a [ExploredDimension],
    constraints: &'a [CompiledConstraint],
    combos: &'a [Vec<usize>],
    /// Indices of the combos that include each dimension.
    touching: Vec<Vec<usize>>,
    uncovered: BTreeSet<Tuple>,
}

impl<'a> Cover<'a> {
    fn new(
        dimensions: &'a [ExploredDimension],
        constraints: &'a [CompiledConstraint],
        combos: &'a [Vec<usize>],
    ) -> Self {
        let touching = (0..dimensions.len())
            .map(|d| {
                combos
                    .iter()
                    .enumerate()
                    .filter(|(_, dims)| dims.contains(&d))
                    .map(|(c, _)| c)
                    .collect()
            })
            .collect();
        let uncovered = combos
            .iter()
            .enumerate()
            .flat_map(|(c, dims)| product(dimensions, dims).into_iter().map(move |values| (c, values)))
            .collect();
        Self {
            dimensions,
            constraints,
            combos,
            touching,
            uncovered,
        }
    }

    fn rows(mut self, base: &[Option<usize>], rng: &mut StdRng) -> Vec<Vec<usize>> {
        let mut rows = Vec::new();
        while let Some(target) = self.uncovered.first().cloned() {
            let mut best: Option<(Vec<usize>, usize)> = None;
            for _ in 0..CANDIDATES_PER_ROW {
                let Some(row) = self.grow(base, &target, rng) else {
                    continue;
                };
                let gain = self.gain(&row);
                if best.as_ref().is_none_or(|(_, g)| gain > *g) {
                    best = Some((row, gain));
                }
            }
            match best {
                Some((row, _)) => {
                    for (c, dims) in self.combos.iter().enumerate() {
                        self.uncovered.remove(&(c, dims.iter().map(|&d| row[d]).collect()));
                    }
                    rows.push(row);
                }
                None => {
                    self.uncovered.remove(&target);
                }
            }
        }
        rows
    }

    fn gain(&self, row: &[usize]) -> usize {
        self.combos
            .iter()
            .enumerate()
            .filter(|(c, dims)| {
                self.uncovered
                    .contains(&(*c, dims.iter().map(|&d| row[d]).collect()))
            })
            .count()
    }

    /// Builds one row containing `target`, filling the free dimensions in a
    /// random order with the value that covers the most new tuples.
    fn grow(&self, base: &[Option<usize>], target: &Tuple, rng: &mut StdRng) -> Option<Vec<usize>> {
        let mut partial = base.to_vec();
        let (combo, values) = target;
        for (&d, &v) in self.combos[*combo].iter().zip(values) {
            partial[d] = Some(v);
        }
        if !self.combos[*combo]
            .iter()
            .all(|&d| admits(self.dimensions, self.constraints, &partial, d))
        {
            return None;
        }

        let mut free: Vec<usize> = (0..partial.len()).filter(|&d| partial[d].is_none()).collect();
        free.shuffle(rng);
        for d in free {
            let mut choices: Vec<usize> = (0..self.dimensions[d].values.len()).collect();
            choices.shuffle(rng);
            let mut best: Option<(usize, usize)> = None;
            for v in choices {
                partial[d] = Some(v);
                if !admits(self.dimensions, self.constraints, &partial, d) {
                    continue;
                }
                let gain = self.newly_covered(&partial, d);
                if best.is_none_or(|(_, g)| gain > g) {
                    best = Some((v, gain));
                }
            }
            partial[d] = Some(best?.0);
        }
        partial.into_iter().collect()
    }

    /// Uncovered tuples that assigning `dim` completes.
    fn newly_covered(&self, partial: &[Option<usize>], dim: usize) -> usize {
        self.touching[dim]
            .iter()
            .filter_map(|&c| {
                let values: Option<Vec<usize>> = self.combos[c].iter().map(|&d| partial[d]).collect();
                values.map(|values| (c, values))
            })
            .filter(|tuple| self.uncovered.contains(tuple))
            .count()
    }
}
