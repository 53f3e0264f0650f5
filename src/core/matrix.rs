//! # Matrix Expansion Module / 矩阵展开模块
//!
//! A [`Matrix`] annotation turns one declared variation into many: the
//! dimensions are resolved, constraints are bound to dimensions by name, the
//! injected [`MatrixExplorer`] picks the value vectors, and one child
//! definition is synthesized per vector.
//!
//! [`Matrix`] 注解把一个声明的变体变成多个：解析维度，按名称把约束绑定到维度，
//! 由注入的 [`MatrixExplorer`] 选出取值向量，并为每个向量合成一个子定义。

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::definition::{Definition, Param};
use crate::core::error::ConfigError;
use crate::core::explorer::{MatrixExplorer, Vector};
use crate::core::models::{ExplorationKind, ParamValue};

/// Callback invoked with each synthesized child and its vector. Returning
/// `None` vetoes the combination, which is only legal under exhaustive
/// exploration.
///
/// 对每个合成的子定义及其向量调用的回调。返回 `None` 表示否决该组合，这只在穷举探索下合法。
pub type CombinationCallback =
    Arc<dyn Fn(Definition, &[ParamValue]) -> Option<Definition> + Send + Sync>;

type Predicate = Arc<dyn Fn(&[&ParamValue]) -> bool + Send + Sync>;

/// The value domain of a dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Domain {
    /// Values must be listed explicitly.
    Open,
    Bool,
    Enum(Vec<String>),
}

/// One named axis of a matrix.
/// 矩阵的一个具名维度。
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub domain: Domain,
    pub values: Vec<ParamValue>,
}

impl Dimension {
    pub fn new<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        Self {
            name: name.into(),
            domain: Domain::Open,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// A boolean dimension; without explicit values both states are explored.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: Domain::Bool,
            values: Vec::new(),
        }
    }

    /// An enum dimension; without explicit values every variant is explored.
    pub fn enumeration<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            domain: Domain::Enum(variants.into_iter().map(Into::into).collect()),
            values: Vec::new(),
        }
    }

    pub fn with_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParamValue>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// A predicate over a named subset of dimensions.
///
/// The predicate receives the bound values in the order the parameter names
/// were listed.
#[derive(Clone)]
pub struct Constraint {
    pub parameters: Vec<String>,
    predicate: Predicate,
}

impl Constraint {
    pub fn new<I, S, F>(parameters: I, predicate: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&[&ParamValue]) -> bool + Send + Sync + 'static,
    {
        Self {
            parameters: parameters.into_iter().map(Into::into).collect(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// A constraint whose parameter names were bound to dimension indices.
#[derive(Clone)]
pub struct CompiledConstraint {
    indices: Vec<usize>,
    predicate: Predicate,
}

impl CompiledConstraint {
    pub fn dimensions(&self) -> &[usize] {
        &self.indices
    }

    /// Evaluates the constraint against a full vector.
    pub fn accepts(&self, vector: &[ParamValue]) -> bool {
        let bound: Vec<&ParamValue> = self.indices.iter().map(|&i| &vector[i]).collect();
        (self.predicate)(&bound)
    }
}

impl fmt::Debug for CompiledConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledConstraint")
            .field("indices", &self.indices)
            .finish_non_exhaustive()
    }
}

/// A dimension as handed to the explorer.
///
/// `exhaustive` marks closed-domain dimensions that declared no values: the
/// explorer must cross every one of their values regardless of the order.
///
/// 交给探索器的维度。`exhaustive` 标记未声明取值的封闭域维度：无论覆盖阶数如何，
/// 探索器都必须遍历其每一个取值。
#[derive(Debug, Clone, PartialEq)]
pub struct ExploredDimension {
    pub name: String,
    pub values: Vec<ParamValue>,
    pub exhaustive: bool,
}

/// Declarative parameter matrix attached to a variation definition.
/// 附加在变体定义上的声明式参数矩阵。
#[derive(Clone)]
pub struct Matrix {
    pub kind: ExplorationKind,
    /// When positive, synthesized children get sequential ids from here.
    pub base_id: i64,
    pub dimensions: Vec<Dimension>,
    pub constraints: Vec<Constraint>,
    pub combination: Option<CombinationCallback>,
}

impl Matrix {
    pub fn new(kind: ExplorationKind) -> Self {
        Self {
            kind,
            base_id: 0,
            dimensions: Vec::new(),
            constraints: Vec::new(),
            combination: None,
        }
    }

    pub fn pairwise() -> Self {
        Self::new(ExplorationKind::Pairwise)
    }

    pub fn exhaustive() -> Self {
        Self::new(ExplorationKind::Exhaustive)
    }

    pub fn with_base_id(mut self, base_id: i64) -> Self {
        self.base_id = base_id;
        self
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_combination<F>(mut self, callback: F) -> Self
    where
        F: Fn(Definition, &[ParamValue]) -> Option<Definition> + Send + Sync + 'static,
    {
        self.combination = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("kind", &self.kind)
            .field("base_id", &self.base_id)
            .field("dimensions", &self.dimensions)
            .field("constraints", &self.constraints)
            .field("combination", &self.combination.is_some())
            .finish()
    }
}

/// Lowercases a name and strips every non-alphanumeric character.
/// 将名称转为小写并去除所有非字母数字字符。
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Resolves declared dimensions into explorable ones.
pub fn resolve_dimensions(
    definition: &str,
    dimensions: &[Dimension],
) -> Result<Vec<ExploredDimension>, ConfigError> {
    dimensions
        .iter()
        .map(|dim| {
            let (values, exhaustive) = match (&dim.domain, dim.values.is_empty()) {
                (_, false) => (dim.values.clone(), false),
                (Domain::Bool, true) => (vec![ParamValue::Bool(false), ParamValue::Bool(true)], true),
                (Domain::Enum(variants), true) if !variants.is_empty() => (
                    variants.iter().cloned().map(ParamValue::Str).collect(),
                    true,
                ),
                _ => {
                    return Err(ConfigError::EmptyDimension {
                        definition: definition.to_string(),
                        dimension: dim.name.clone(),
                    });
                }
            };
            Ok(ExploredDimension {
                name: dim.name.clone(),
                values,
                exhaustive,
            })
        })
        .collect()
}

/// Binds every constraint parameter to exactly one dimension.
pub fn compile_constraints(
    definition: &str,
    dimensions: &[Dimension],
    constraints: &[Constraint],
) -> Result<Vec<CompiledConstraint>, ConfigError> {
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (index, dim) in dimensions.iter().enumerate() {
        if by_name.insert(normalize_name(&dim.name), index).is_some() {
            return Err(ConfigError::AmbiguousDimension {
                definition: definition.to_string(),
                name: dim.name.clone(),
            });
        }
    }

    constraints
        .iter()
        .map(|constraint| {
            let indices = constraint
                .parameters
                .iter()
                .map(|param| {
                    by_name.get(&normalize_name(param)).copied().ok_or_else(|| {
                        ConfigError::UnboundConstraint {
                            definition: definition.to_string(),
                            parameter: param.clone(),
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CompiledConstraint {
                indices,
                predicate: constraint.predicate.clone(),
            })
        })
        .collect()
}

/// Expands a matrix-annotated definition into concrete child definitions.
///
/// # Arguments
/// * `definition` - The declared definition carrying the matrix
/// * `matrix` - The matrix annotation
/// * `kind` - The effective exploration kind (node override or the matrix's own)
/// * `seed` - Seed for the explorer's pseudo-random source
/// * `explorer` - The injected combination service
///
/// # Errors
/// Returns a [`ConfigError`] for malformed matrices, unbound or ambiguous
/// constraint bindings, and for a veto under pairwise exploration.
pub fn expand(
    definition: &Definition,
    matrix: &Matrix,
    kind: ExplorationKind,
    seed: u64,
    explorer: &dyn MatrixExplorer,
) -> Result<Vec<Definition>, ConfigError> {
    let name = definition.name();
    let dimensions = resolve_dimensions(name, &matrix.dimensions)?;
    let constraints = compile_constraints(name, &matrix.dimensions, &matrix.constraints)?;
    let order = kind.order(dimensions.len());
    let mut rng = StdRng::seed_from_u64(seed);

    let vectors = explorer.explore(&dimensions, &constraints, order, &mut rng);

    let mut children = Vec::with_capacity(vectors.len());
    for (index, vector) in vectors.into_iter().enumerate() {
        let child = synthesize(definition, matrix.base_id, &dimensions, index, &vector);
        let child = match &matrix.combination {
            Some(callback) => callback(child, &vector),
            None => Some(child),
        };
        match child {
            Some(child) => children.push(child),
            None if kind == ExplorationKind::Pairwise => {
                return Err(ConfigError::PairwiseVeto {
                    definition: name.to_string(),
                });
            }
            None => {}
        }
    }
    Ok(children)
}

fn synthesize(
    definition: &Definition,
    base_id: i64,
    dimensions: &[ExploredDimension],
    index: usize,
    vector: &Vector,
) -> Definition {
    let mut child = definition.clone();
    child.matrix = None;
    if base_id > 0 {
        child.metadata.id = base_id + index as i64;
    }

    let suffix = dimensions
        .iter()
        .zip(vector)
        .map(|(dim, value)| format!("{}={}", dim.name, value))
        .collect::<Vec<_>>()
        .join(" ");
    if !suffix.is_empty() {
        child.metadata.name = format!("{} - {}", child.metadata.name, suffix);
        child.metadata.description = if child.metadata.description.is_empty() {
            suffix
        } else {
            format!("{} - {}", child.metadata.description, suffix)
        };
    }

    child.params = dimensions
        .iter()
        .zip(vector)
        .map(|(dim, value)| Param::new(dim.name.clone(), value.clone()))
        .collect();
    child
}
