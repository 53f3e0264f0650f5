//! # Test Item Tree Module / 测试项树模块
//!
//! A [`TestItem`] is a node of the module → case → variation hierarchy. Each
//! container computes its children on first access: it asks the
//! [`DefinitionProvider`] for declared definitions, expands matrix annotations,
//! merges bug annotations, applies the inherited filter and caches the sorted
//! result for good.
//!
//! [`TestItem`] 是 模块 → 用例 → 变体 层级结构中的节点。每个容器在首次访问时计算其子节点：
//! 向 [`DefinitionProvider`] 请求声明的定义，展开矩阵注解，合并缺陷注解，
//! 应用继承的过滤器，并永久缓存排序后的结果。

use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::core::context::TestContext;
use crate::core::definition::{BodyFuture, Definition, DefinitionProvider};
use crate::core::error::ConfigError;
use crate::core::explorer::MatrixExplorer;
use crate::core::matrix;
use crate::core::models::{Bug, ExplorationKind, ItemKind, Metadata};

/// Predicate deciding which items survive. A container also survives when any
/// of its descendants does.
/// 决定哪些测试项保留下来的谓词。只要容器的任一后代保留，该容器也会保留。
pub type ItemFilter = Arc<dyn Fn(&TestItem) -> bool + Send + Sync>;

/// The three lifecycle operations of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Execute,
    Terminate,
}

/// Collaborators shared by every node of one tree.
struct Services {
    provider: Arc<dyn DefinitionProvider>,
    explorer: Arc<dyn MatrixExplorer>,
}

pub struct TestItem {
    definition: Definition,
    parent: Weak<TestItem>,
    this: Weak<TestItem>,
    bugs: Vec<Bug>,
    exploration_seed: u64,
    exploration_kind: Option<ExplorationKind>,
    services: Arc<Services>,
    filter: Mutex<Option<ItemFilter>>,
    children: OnceCell<Vec<Arc<TestItem>>>,
}

impl TestItem {
    /// Creates the root module of a tree.
    ///
    /// # Arguments
    /// * `definition` - The module definition; its kind is forced to `Module`
    /// * `exploration_seed` - Seed inherited by every matrix below this module
    /// * `provider` - Source of child definitions
    /// * `explorer` - Combination service used for matrix expansion
    pub fn module(
        mut definition: Definition,
        exploration_seed: u64,
        provider: Arc<dyn DefinitionProvider>,
        explorer: Arc<dyn MatrixExplorer>,
    ) -> Arc<TestItem> {
        definition.kind = ItemKind::Module;
        let bugs = definition.bugs.clone();
        let exploration_kind = definition.exploration;
        let services = Arc::new(Services { provider, explorer });
        Arc::new_cyclic(|this| TestItem {
            definition,
            parent: Weak::new(),
            this: this.clone(),
            bugs,
            exploration_seed,
            exploration_kind,
            services,
            filter: Mutex::new(None),
            children: OnceCell::new(),
        })
    }

    fn child(&self, definition: Definition, filter: Option<ItemFilter>) -> Arc<TestItem> {
        let mut bugs = self.bugs.clone();
        for bug in &definition.bugs {
            if !bugs.contains(bug) {
                bugs.push(bug.clone());
            }
        }
        let exploration_kind = definition.exploration.or(self.exploration_kind);
        Arc::new_cyclic(|this| TestItem {
            definition,
            parent: self.this.clone(),
            this: this.clone(),
            bugs,
            exploration_seed: self.exploration_seed,
            exploration_kind,
            services: self.services.clone(),
            filter: Mutex::new(filter),
            children: OnceCell::new(),
        })
    }

    pub fn kind(&self) -> ItemKind {
        self.definition.kind
    }

    pub fn is_variation(&self) -> bool {
        self.kind() == ItemKind::Variation
    }

    pub fn metadata(&self) -> &Metadata {
        &self.definition.metadata
    }

    pub fn name(&self) -> &str {
        &self.definition.metadata.name
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    /// Bugs declared on this item merged with those inherited from ancestors.
    pub fn bugs(&self) -> &[Bug] {
        &self.bugs
    }

    pub fn exploration_seed(&self) -> u64 {
        self.exploration_seed
    }

    pub fn exploration_kind(&self) -> Option<ExplorationKind> {
        self.exploration_kind
    }

    pub fn parent(&self) -> Option<Arc<TestItem>> {
        self.parent.upgrade()
    }

    /// Metadata from the root module down to this item.
    pub fn metadata_chain(&self) -> Vec<Metadata> {
        let mut chain = vec![self.metadata().clone()];
        let mut cursor = self.parent();
        while let Some(item) = cursor {
            chain.push(item.metadata().clone());
            cursor = item.parent();
        }
        chain.reverse();
        chain
    }

    /// Slash-separated names from the root module down to this item.
    pub fn path(&self) -> String {
        self.metadata_chain()
            .iter()
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Installs the filter predicate inherited by every descendant.
    ///
    /// # Errors
    /// Returns [`ConfigError::FilterFrozen`] once the children were realized.
    pub fn set_filter(&self, filter: ItemFilter) -> Result<(), ConfigError> {
        let mut slot = self.filter.lock().unwrap_or_else(PoisonError::into_inner);
        if self.children.get().is_some() {
            return Err(ConfigError::FilterFrozen {
                item: self.name().to_string(),
            });
        }
        *slot = Some(filter);
        Ok(())
    }

    /// The filtered children, ordered by `(id, description)`.
    ///
    /// Computed on first access and cached; later calls return the same list.
    ///
    /// # Errors
    /// Propagates configuration errors from the provider and matrix expansion.
    pub fn children(&self) -> Result<&[Arc<TestItem>], ConfigError> {
        self.children
            .get_or_try_init(|| self.realize_children())
            .map(Vec::as_slice)
    }

    /// Whether the children were already realized.
    pub fn is_realized(&self) -> bool {
        self.children.get().is_some()
    }

    fn realize_children(&self) -> Result<Vec<Arc<TestItem>>, ConfigError> {
        if self.is_variation() {
            return Ok(Vec::new());
        }
        // Hold the filter lock so the filter cannot change while children are built.
        let filter_guard = self.filter.lock().unwrap_or_else(PoisonError::into_inner);
        let filter = filter_guard.clone();

        let services = &self.services;
        services.provider.prepare(self)?;

        let mut children = Vec::new();
        for definition in services.provider.child_definitions(self)? {
            let concrete = match services.provider.matrix_annotation(&definition) {
                Some(matrix) => {
                    let kind = definition
                        .exploration
                        .or(self.exploration_kind)
                        .unwrap_or(matrix.kind);
                    matrix::expand(
                        &definition,
                        &matrix,
                        kind,
                        self.exploration_seed,
                        services.explorer.as_ref(),
                    )?
                }
                None => vec![definition],
            };
            for definition in concrete {
                let child = self.child(definition, filter.clone());
                if child.survives(filter.as_ref())? {
                    children.push(child);
                }
            }
        }
        drop(filter_guard);

        children.sort_by(|a, b| {
            let (ma, mb) = (a.metadata(), b.metadata());
            ma.id.cmp(&mb.id).then_with(|| ma.description.cmp(&mb.description))
        });
        Ok(children)
    }

    fn survives(&self, filter: Option<&ItemFilter>) -> Result<bool, ConfigError> {
        match filter {
            None => Ok(true),
            Some(f) if f(self) => Ok(true),
            Some(_) => Ok(!self.children()?.is_empty()),
        }
    }

    /// Realizes the whole subtree.
    ///
    /// # Errors
    /// Returns the first configuration error met while expanding.
    pub fn realize_all(&self) -> Result<(), ConfigError> {
        for child in self.children()? {
            child.realize_all()?;
        }
        Ok(())
    }

    /// Invokes one lifecycle operation of this item's body.
    pub fn invoke<'a>(&'a self, phase: Phase, ctx: &'a TestContext) -> BodyFuture<'a> {
        let body = self.definition.body.as_ref();
        match phase {
            Phase::Init => body.init(ctx),
            Phase::Execute => body.execute(ctx),
            Phase::Terminate => body.terminate(ctx),
        }
    }
}

impl fmt::Debug for TestItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestItem")
            .field("kind", &self.kind())
            .field("metadata", self.metadata())
            .field("bugs", &self.bugs)
            .field("exploration_seed", &self.exploration_seed)
            .field("exploration_kind", &self.exploration_kind)
            .field("realized", &self.is_realized())
            .finish_non_exhaustive()
    }
}
