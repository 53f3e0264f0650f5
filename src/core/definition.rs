//! # Test Definition Module / 测试定义模块
//!
//! Declarative descriptions of test items and the seams through which they
//! enter the tree. A [`Definition`] carries metadata, static parameters, bug
//! annotations, an optional matrix and the lifecycle body. A
//! [`DefinitionProvider`] answers "what are the children of this node".
//!
//! 测试项的声明式描述以及它们进入测试树的接口。[`Definition`] 携带元数据、静态参数、
//! 缺陷注解、可选的矩阵和生命周期函数。[`DefinitionProvider`] 负责回答“该节点有哪些子节点”。

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::core::context::TestContext;
use crate::core::error::{ConfigError, TestError};
use crate::core::matrix::Matrix;
use crate::core::models::{Bug, ExplorationKind, ItemKind, Metadata, ParamValue};
use crate::core::tree::TestItem;

/// Future returned by every lifecycle operation.
pub type BodyFuture<'a> = BoxFuture<'a, Result<(), TestError>>;

/// The executable behavior behind a test item.
///
/// All three operations run on the engine's dedicated worker thread, one at a
/// time. A body that returns `Err(TestError::Skipped)` is recorded as skipped,
/// any other error or a panic is recorded as failed.
///
/// 测试项背后的可执行行为。
/// 三个操作都在引擎专用的工作线程上逐个运行。返回 `Err(TestError::Skipped)` 的函数会被记录为跳过，
/// 其他任何错误或 panic 都会被记录为失败。
pub trait TestBody: Send + Sync {
    fn init<'a>(&'a self, _ctx: &'a TestContext) -> BodyFuture<'a> {
        future::ready(Ok(())).boxed()
    }

    fn execute<'a>(&'a self, _ctx: &'a TestContext) -> BodyFuture<'a> {
        future::ready(Ok(())).boxed()
    }

    fn terminate<'a>(&'a self, _ctx: &'a TestContext) -> BodyFuture<'a> {
        future::ready(Ok(())).boxed()
    }
}

/// A body whose three operations all succeed immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBody;

impl TestBody for NoopBody {}

type Hook = Arc<dyn Fn(TestContext) -> BoxFuture<'static, Result<(), TestError>> + Send + Sync>;

/// A body assembled from closures. Missing hooks succeed immediately.
///
/// ```ignore
/// let body = FnBody::new().on_execute(|ctx| async move {
///     ctx.info("hello");
///     Ok(())
/// });
/// ```
#[derive(Default, Clone)]
pub struct FnBody {
    init: Option<Hook>,
    execute: Option<Hook>,
    terminate: Option<Hook>,
}

fn hook<F, Fut>(f: F) -> Hook
where
    F: Fn(TestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TestError>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

fn call(hook: &Option<Hook>, ctx: &TestContext) -> BodyFuture<'static> {
    match hook {
        Some(h) => h(ctx.clone()),
        None => future::ready(Ok(())).boxed(),
    }
}

impl FnBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_init<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestError>> + Send + 'static,
    {
        self.init = Some(hook(f));
        self
    }

    pub fn on_execute<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestError>> + Send + 'static,
    {
        self.execute = Some(hook(f));
        self
    }

    pub fn on_terminate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestError>> + Send + 'static,
    {
        self.terminate = Some(hook(f));
        self
    }
}

impl TestBody for FnBody {
    fn init<'a>(&'a self, ctx: &'a TestContext) -> BodyFuture<'a> {
        call(&self.init, ctx)
    }

    fn execute<'a>(&'a self, ctx: &'a TestContext) -> BodyFuture<'a> {
        call(&self.execute, ctx)
    }

    fn terminate<'a>(&'a self, ctx: &'a TestContext) -> BodyFuture<'a> {
        call(&self.terminate, ctx)
    }
}

/// A named parameter value of a variation.
/// 变体的具名参数值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: ParamValue,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Declarative description of one test item.
///
/// Containers list their nested definitions in `children`; the default
/// [`DeclaredProvider`] simply hands those back to the tree.
///
/// 单个测试项的声明式描述。
/// 容器在 `children` 中列出其嵌套定义；默认的 [`DeclaredProvider`] 只是将它们交还给测试树。
#[derive(Clone)]
pub struct Definition {
    pub kind: ItemKind,
    pub metadata: Metadata,
    pub params: Vec<Param>,
    pub bugs: Vec<Bug>,
    pub matrix: Option<Matrix>,
    /// Overrides the exploration kind inherited from the parent.
    pub exploration: Option<ExplorationKind>,
    pub children: Vec<Definition>,
    pub body: Arc<dyn TestBody>,
}

impl Definition {
    fn of_kind(kind: ItemKind, metadata: Metadata) -> Self {
        Self {
            kind,
            metadata,
            params: Vec::new(),
            bugs: Vec::new(),
            matrix: None,
            exploration: None,
            children: Vec::new(),
            body: Arc::new(NoopBody),
        }
    }

    pub fn module(metadata: Metadata) -> Self {
        Self::of_kind(ItemKind::Module, metadata)
    }

    pub fn case(metadata: Metadata) -> Self {
        Self::of_kind(ItemKind::Case, metadata)
    }

    pub fn variation(metadata: Metadata) -> Self {
        Self::of_kind(ItemKind::Variation, metadata)
    }

    pub fn with_body(mut self, body: impl TestBody + 'static) -> Self {
        self.body = Arc::new(body);
        self
    }

    pub fn with_child(mut self, child: Definition) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.push(Param::new(name, value));
        self
    }

    pub fn with_bug(mut self, bug: Bug) -> Self {
        self.bugs.push(bug);
        self
    }

    pub fn with_matrix(mut self, matrix: Matrix) -> Self {
        self.matrix = Some(matrix);
        self
    }

    pub fn with_exploration(mut self, kind: ExplorationKind) -> Self {
        self.exploration = Some(kind);
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("kind", &self.kind)
            .field("metadata", &self.metadata)
            .field("params", &self.params)
            .field("bugs", &self.bugs)
            .field("matrix", &self.matrix)
            .field("exploration", &self.exploration)
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

/// Source of child definitions for a container node.
///
/// `prepare` is the dependency/workspace setup hook: it runs once per module or
/// case, right before that node's children are generated.
///
/// 容器节点子定义的来源。
/// `prepare` 是依赖/工作区准备钩子：对每个模块或用例执行一次，就在生成其子节点之前。
pub trait DefinitionProvider: Send + Sync {
    fn child_definitions(&self, parent: &TestItem) -> Result<Vec<Definition>, ConfigError>;

    fn matrix_annotation(&self, definition: &Definition) -> Option<Matrix> {
        definition.matrix.clone()
    }

    fn prepare(&self, _container: &TestItem) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Provider that returns the children declared on each definition.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeclaredProvider;

impl DefinitionProvider for DeclaredProvider {
    fn child_definitions(&self, parent: &TestItem) -> Result<Vec<Definition>, ConfigError> {
        Ok(parent.definition().children.clone())
    }
}
